//! Connect command: pick remote devices and tunnel to them

use std::sync::Arc;

use anyhow::{Context, Result};

use adbr_client::{RemoteDiscovery, SshShell, TunnelReconciler, TunnelSettings};
use adbr_core::adb::AdbClient;
use adbr_core::config::ClientConfig;
use adbr_core::error::RemoteError;
use adbr_core::snapshot::{JsonSnapshot, SnapshotStore};
use adbr_core::traits::SystemProcesses;
use adbr_core::types::{ExposedDevice, Tunnel};

use crate::output::{
    format_tunnels, print_error, print_info, print_outcome, print_success, print_warning,
};
use crate::select::{multi_select, SelectItem};

/// Sync tunnels to `host` with an interactive device selection
pub async fn connect_command(config: &ClientConfig, host: &str) -> Result<()> {
    let shell = Arc::new(SshShell::new(&config.ssh_path));

    print_info(&format!("Fetching devices from {}...", host));
    let discovery = RemoteDiscovery::from_config(shell.clone(), config);
    let found = match discovery.fetch(host).await {
        Ok(found) => found,
        Err(RemoteError::Discovery { host, cli, file }) => {
            print_error(&format!("Failed to fetch devices from {}.", host));
            eprintln!("  list command:  {}", cli);
            eprintln!("  snapshot file: {}", file);
            return Ok(());
        }
        Err(e) => return Err(e).context("Device discovery failed"),
    };
    tracing::debug!("Got {} device(s) via {}", found.devices.len(), found.source);

    if found.devices.is_empty() {
        print_warning("No devices found on remote host.");
        return Ok(());
    }

    let store = JsonSnapshot::<Tunnel>::new(&config.tunnel_snapshot_path);
    let active = store.load().await;
    let items = selection_items(&found.devices, &active, host);

    let prompt = move || multi_select("Select devices to connect:", &items);
    let picked = tokio::task::spawn_blocking(prompt)
        .await
        .context("Selection prompt panicked")?
        .context("Selection prompt failed")?;
    let Some(picked) = picked else {
        println!("Operation cancelled.");
        return Ok(());
    };
    let desired: Vec<String> = picked
        .into_iter()
        .filter_map(|i| found.devices.get(i))
        .map(|d| d.serial.clone())
        .collect();

    // Another `connect` waits here until we have saved
    let _lock = store
        .lock()
        .await
        .context("Failed to lock the tunnel snapshot")?;

    let reconciler = TunnelReconciler::new(
        shell,
        Arc::new(AdbClient::new(&config.adb_path)),
        Arc::new(SystemProcesses),
        TunnelSettings::from(config),
    );
    let outcome = reconciler
        .sync(&store, host, &found.devices, &desired)
        .await
        .with_context(|| format!("Failed to save {:?}", store.path()))?;

    print_outcome(&outcome);
    println!();
    println!("{}", format_tunnels(&outcome.tunnels));
    println!();
    print_success("Synchronization complete!");
    println!("Run `adb devices` to verify.");
    Ok(())
}

/// Checklist rows for `devices`, pre-checked where a tunnel to `host` exists
fn selection_items(devices: &[ExposedDevice], active: &[Tunnel], host: &str) -> Vec<SelectItem> {
    devices
        .iter()
        .map(|d| {
            let connected = active.iter().any(|t| t.matches(&d.serial, host));
            SelectItem {
                label: format!("{} ({}) [{}]", d.model, d.serial, d.port),
                hint: if connected { "Connected" } else { "Available" }.to_string(),
                checked: connected,
            }
        })
        .collect()
}
