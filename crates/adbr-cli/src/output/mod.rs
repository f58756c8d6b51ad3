//! Output formatting utilities for the CLI
//!
//! Tables for exposed devices and tunnels, plus colored one-line status
//! messages. Errors and warnings go to stderr so that `list --json` keeps a
//! clean stdout.

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use tabled::{settings::Style, Table, Tabled};

use adbr_client::TunnelOutcome;
use adbr_core::types::{ExposedDevice, Tunnel};

/// Format the exposure snapshot as a table
pub fn format_exposed(devices: &[ExposedDevice]) -> String {
    if devices.is_empty() {
        return "No devices currently exposed.".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "SERIAL")]
        serial: String,
        #[tabled(rename = "MODEL")]
        model: String,
        #[tabled(rename = "ENDPOINT")]
        endpoint: String,
        #[tabled(rename = "STATE")]
        state: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            serial: d.serial.clone(),
            model: d.model.clone(),
            endpoint: format!("{}:{}", d.host, d.port),
            state: d.state.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Ready-to-copy connect line for one exposed device
pub fn connect_hint(device: &ExposedDevice) -> String {
    format!(
        "{} ({}): adb connect {}:{}",
        device.model, device.serial, device.host, device.port
    )
}

/// Format tunnels as a table
pub fn format_tunnels(tunnels: &[Tunnel]) -> String {
    if tunnels.is_empty() {
        return "No active tunnels".to_string();
    }

    #[derive(Tabled)]
    struct TunnelRow {
        #[tabled(rename = "SERIAL")]
        serial: String,
        #[tabled(rename = "HOST")]
        host: String,
        #[tabled(rename = "LOCAL")]
        local: String,
        #[tabled(rename = "REMOTE PORT")]
        remote_port: u16,
        #[tabled(rename = "PID")]
        pid: String,
    }

    let rows: Vec<TunnelRow> = tunnels
        .iter()
        .map(|t| TunnelRow {
            serial: t.serial.clone(),
            host: t.host.clone(),
            local: t.bridge_address(),
            remote_port: t.remote_port,
            pid: t.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print what a tunnel reconciliation changed
pub fn print_outcome(outcome: &TunnelOutcome) {
    for tunnel in &outcome.torn_down {
        print_info(&format!("Disconnected {} ({})", tunnel.serial, tunnel.bridge_address()));
    }
    for tunnel in &outcome.created {
        print_success(&format!("Connected {} on {}", tunnel.serial, tunnel.bridge_address()));
    }
    for failure in &outcome.failed {
        print_error(&format!("Failed to connect {}: {}", failure.serial, failure.error));
    }
    if outcome.is_unchanged() {
        print_info("Nothing to change");
    }
}

fn print_prefixed(out: &mut impl Write, color: Color, prefix: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(prefix),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_prefixed(&mut std::io::stdout(), Color::Green, "✓ ", msg);
}

/// Print an error message to stderr in red with an X prefix
pub fn print_error(msg: &str) {
    print_prefixed(&mut std::io::stderr(), Color::Red, "✗ ", msg);
}

/// Print a warning message to stderr in yellow
pub fn print_warning(msg: &str) {
    print_prefixed(&mut std::io::stderr(), Color::Yellow, "⚠ ", msg);
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    print_prefixed(&mut std::io::stdout(), Color::Cyan, "ℹ ", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> ExposedDevice {
        ExposedDevice {
            serial: "ABC123".to_string(),
            model: "Pixel_6".to_string(),
            port: 15000,
            host: "192.168.1.5".to_string(),
            state: "available".to_string(),
        }
    }

    #[test]
    fn test_format_exposed() {
        let table = format_exposed(&[device()]);
        assert!(table.contains("SERIAL"));
        assert!(table.contains("ABC123"));
        assert!(table.contains("192.168.1.5:15000"));

        assert_eq!(format_exposed(&[]), "No devices currently exposed.");
    }

    #[test]
    fn test_connect_hint() {
        assert_eq!(
            connect_hint(&device()),
            "Pixel_6 (ABC123): adb connect 192.168.1.5:15000"
        );
    }

    #[test]
    fn test_format_tunnels_without_pid() {
        let tunnel = Tunnel {
            serial: "ABC123".to_string(),
            local_port: 15000,
            remote_port: 15000,
            host: "me@gw".to_string(),
            pid: None,
        };
        let table = format_tunnels(&[tunnel]);
        assert!(table.contains("localhost:15000"));
        assert!(table.contains(" - "));
    }
}
