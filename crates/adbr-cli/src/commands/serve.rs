//! Serve command: run the gateway daemon in the foreground

use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use tokio_util::sync::CancellationToken;

use adbr_core::adb::AdbClient;
use adbr_core::config::GatewayConfig;
use adbr_core::net::{local_ipv4_or, INSTRUCTIONS_HOST_PLACEHOLDER};
use adbr_core::process::PidFileGuard;
use adbr_core::snapshot::JsonSnapshot;
use adbr_core::types::ExposedDevice;
use adbr_gateway::{GatewayDaemon, ReconcilerSettings, Scheduler, SessionReconciler};

use crate::output::{print_success, print_warning};

/// Expose attached devices until interrupted
pub async fn serve_command(config: GatewayConfig, reset_forwards: bool) -> Result<()> {
    let pid_guard = PidFileGuard::acquire(config.pid_file.clone(), std::process::id())
        .context("Cannot start the gateway")?;
    tracing::debug!("Holding PID file {:?}", pid_guard.path());

    print_banner();

    let reconciler = SessionReconciler::new(
        Arc::new(AdbClient::new(&config.adb_path)),
        Arc::new(JsonSnapshot::<ExposedDevice>::new(&config.snapshot_path)),
        ReconcilerSettings::from(&config),
    );
    let settings = reconciler.settings();
    tracing::info!(
        "Exposing devices on {} from port {} (device port {})",
        settings.bind_address,
        settings.base_port,
        settings.device_port
    );

    if reset_forwards {
        match reconciler.reset_forwards().await {
            Ok(()) => tracing::info!("Removed all existing port forwards"),
            Err(e) => print_warning(&format!("Failed to remove existing forwards: {}", e)),
        }
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let daemon = GatewayDaemon::new(reconciler, Scheduler::interval(config.poll_interval));
    daemon
        .run(cancel)
        .await
        .with_context(|| format!("Failed to update {:?}", config.snapshot_path))?;

    print_success("Gateway stopped");
    Ok(())
}

fn print_banner() {
    let user = whoami::username();
    let ip = local_ipv4_or(INSTRUCTIONS_HOST_PLACEHOLDER);
    let rule = "---------------------------------------------".dark_grey();

    println!("{}", "ADB Gateway Started!".bold().blue());
    println!("{}", rule);
    println!("To connect to this machine from another one, run:");
    println!("{}", format!("  adb-remote connect {}@{}", user, ip).cyan().bold());
    println!("{}", rule);
    println!("{}", "(Note: From outside your home network you may need your".dark_grey());
    println!("{}", " public IP or a VPN, with port 22 forwarded.)".dark_grey());
    println!();
}

/// Cancel `cancel` on Ctrl+C, or on SIGTERM where available
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }
                tracing::info!("Received Ctrl+C, stopping...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping...");
            }
        }

        cancel.cancel();
    });
}
