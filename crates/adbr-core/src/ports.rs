//! Port allocation
//!
//! Ports are handed out by a linear scan: the smallest port at or above the
//! base that is not already taken. Released ports are reused first, so the
//! numbering stays dense as devices come and go.

use std::collections::HashSet;

/// Return the smallest port `>= base` not present in `used`.
///
/// Returns `None` only when every port from `base` to 65535 is taken.
pub fn allocate(used: &HashSet<u16>, base: u16) -> Option<u16> {
    allocate_where(base, |port| !used.contains(&port))
}

/// Return the smallest port `>= base` accepted by `is_free`.
pub fn allocate_where(base: u16, mut is_free: impl FnMut(u16) -> bool) -> Option<u16> {
    (base..=u16::MAX).find(|&port| is_free(port))
}

/// Whether a TCP listener can currently be bound on `127.0.0.1:port`
pub fn is_loopback_port_free(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}
