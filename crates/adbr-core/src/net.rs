//! Local address discovery

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Host recorded in the exposure snapshot when no address is found
pub const SNAPSHOT_HOST_PLACEHOLDER: &str = "localhost";

/// Host printed in connection instructions when no address is found
pub const INSTRUCTIONS_HOST_PLACEHOLDER: &str = "YOUR_IP_ADDRESS";

/// Best-guess non-loopback IPv4 address of this machine.
///
/// Connecting a UDP socket only selects a route; no packet is sent. The
/// source address the kernel picks is the address peers would see.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;

    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Local IPv4 address as a string, or `placeholder` when none is found
pub fn local_ipv4_or(placeholder: &str) -> String {
    local_ipv4()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| placeholder.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ipv4_is_never_loopback() {
        if let Some(ip) = local_ipv4() {
            assert!(!ip.is_loopback());
        }
    }

    #[test]
    fn test_placeholder_or_address() {
        let host = local_ipv4_or(SNAPSHOT_HOST_PLACEHOLDER);
        assert!(host == SNAPSHOT_HOST_PLACEHOLDER || host.parse::<Ipv4Addr>().is_ok());
    }
}
