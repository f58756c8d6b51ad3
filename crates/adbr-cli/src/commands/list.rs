//! List command: show what this machine currently exposes

use anyhow::Result;

use adbr_core::config::GatewayConfig;
use adbr_core::snapshot::{JsonSnapshot, SnapshotStore};
use adbr_core::types::ExposedDevice;

use crate::output::{connect_hint, format_exposed, print_warning};

/// Print the exposure snapshot as a table, or as JSON for remote discovery
pub async fn list_command(config: &GatewayConfig, json: bool) -> Result<()> {
    let devices = JsonSnapshot::<ExposedDevice>::new(&config.snapshot_path)
        .load()
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        print_warning("No devices currently exposed.");
        return Ok(());
    }

    println!("{}", format_exposed(&devices));
    println!();
    for device in &devices {
        println!("  {}", connect_hint(device));
    }
    Ok(())
}
