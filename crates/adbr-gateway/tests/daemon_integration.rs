//! Gateway daemon integration tests
//!
//! Drives the daemon loop with a manual scheduler against an in-process
//! bridge and a real snapshot file.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use adbr_core::error::BridgeError;
use adbr_core::snapshot::JsonSnapshot;
use adbr_core::traits::{BridgeControl, DeviceEnumerator};
use adbr_core::types::{ConnectivityState, Device, DeviceSerial, ExposedDevice};
use adbr_gateway::session::ReconcilerSettings;
use adbr_gateway::{GatewayDaemon, Scheduler, SessionReconciler};

/// Each test gets its own block of public ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

fn get_test_port() -> u16 {
    let offset = PORT_COUNTER.fetch_add(1, Ordering::SeqCst) * 20;
    43000 + offset
}

#[derive(Default)]
struct Bridge {
    devices: Mutex<Vec<Device>>,
    forwards: Mutex<Vec<u16>>,
}

#[async_trait]
impl DeviceEnumerator for Bridge {
    async fn devices(&self) -> Result<Vec<Device>, BridgeError> {
        Ok(self.devices.lock().unwrap().clone())
    }
}

#[async_trait]
impl BridgeControl for Bridge {
    async fn enable_network_mode(&self, _: &DeviceSerial, _: u16) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn forward(&self, _: &DeviceSerial, local_port: u16, _: u16) -> Result<(), BridgeError> {
        self.forwards.lock().unwrap().push(local_port);
        Ok(())
    }

    async fn remove_forward(&self, local_port: u16) -> Result<(), BridgeError> {
        self.forwards.lock().unwrap().retain(|p| *p != local_port);
        Ok(())
    }

    async fn remove_all_forwards(&self) -> Result<(), BridgeError> {
        self.forwards.lock().unwrap().clear();
        Ok(())
    }
}

fn read_snapshot(path: &std::path::Path) -> Vec<ExposedDevice> {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_daemon_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exposed.json");
    std::fs::write(
        &path,
        r#"[{"serial":"STALE","model":"Old","port":15000,"host":"localhost","state":"available"}]"#,
    )
    .unwrap();

    let base = get_test_port();
    let bridge = Arc::new(Bridge::default());
    let reconciler = SessionReconciler::new(
        bridge.clone(),
        Arc::new(JsonSnapshot::<ExposedDevice>::new(&path)),
        ReconcilerSettings {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: base,
            device_port: 5555,
            advertised_host: Some("10.1.2.3".to_string()),
        },
    );
    let (scheduler, trigger) = Scheduler::manual();
    let cancel = CancellationToken::new();
    let daemon = tokio::spawn(GatewayDaemon::new(reconciler, scheduler).run(cancel.clone()));

    // Stale state from a previous run is discarded
    let report = trigger.run_pass().await.unwrap();
    assert!(report.is_quiet());
    assert!(read_snapshot(&path).is_empty());

    bridge
        .devices
        .lock()
        .unwrap()
        .push(Device::new("ABC123", ConnectivityState::Online).with_model("Pixel_6"));

    let report = trigger.run_pass().await.unwrap();
    assert_eq!(report.added, vec![(DeviceSerial::new("ABC123"), base)]);
    assert_eq!(
        read_snapshot(&path),
        vec![ExposedDevice {
            serial: "ABC123".into(),
            model: "Pixel_6".into(),
            port: base,
            host: "10.1.2.3".into(),
            state: "available".into(),
        }]
    );
    assert_eq!(*bridge.forwards.lock().unwrap(), vec![base]);

    cancel.cancel();
    timeout(Duration::from_secs(5), daemon)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(read_snapshot(&path).is_empty());
    assert!(bridge.forwards.lock().unwrap().is_empty());
    assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, base)).await.is_err());
}

#[tokio::test]
async fn test_exposed_port_reaches_loopback_service() {
    let dir = TempDir::new().unwrap();
    let base = get_test_port();

    // The public port and the loopback target share a number, so the test
    // proxies from a second loopback address onto the "forward" on 127.0.0.1.
    let forward = match TcpListener::bind((Ipv4Addr::LOCALHOST, base)).await {
        Ok(listener) => listener,
        Err(_) => return,
    };
    let public = Ipv4Addr::new(127, 0, 0, 2);
    if std::net::TcpListener::bind((public, 0)).is_err() {
        // No 127.0.0.0/8 aliasing on this host
        return;
    }

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = forward.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    let bridge = Arc::new(Bridge::default());
    bridge
        .devices
        .lock()
        .unwrap()
        .push(Device::new("A", ConnectivityState::Online));

    let reconciler = SessionReconciler::new(
        bridge.clone(),
        Arc::new(JsonSnapshot::<ExposedDevice>::new(dir.path().join("exposed.json"))),
        ReconcilerSettings {
            bind_address: IpAddr::V4(public),
            base_port: base,
            device_port: 5555,
            advertised_host: None,
        },
    );
    let (scheduler, trigger) = Scheduler::manual();
    let cancel = CancellationToken::new();
    let daemon = tokio::spawn(GatewayDaemon::new(reconciler, scheduler).run(cancel.clone()));

    let report = trigger.run_pass().await.unwrap();
    assert!(report.is_quiet());

    let mut client = TcpStream::connect((public, base)).await.unwrap();
    client.write_all(b"host:version").await.unwrap();
    let mut buf = [0u8; 12];
    timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"host:version");

    cancel.cancel();
    daemon.await.unwrap().unwrap();
}
