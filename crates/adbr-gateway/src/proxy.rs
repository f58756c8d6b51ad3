//! Byte-level TCP proxy
//!
//! A `StreamProxy` owns one public listener. Every accepted connection is
//! paired with a fresh connection to a fixed loopback target and the two are
//! spliced until either side closes. The proxy knows nothing about the
//! protocol it carries.
//!
//! ```text
//! Idle --start()--> Listening --stop()--> Stopped
//! ```
//!
//! Spliced connections run on their own tasks. Stopping the proxy closes the
//! listener only; connections already in flight keep running until one of
//! their ends closes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause after a failed `accept` before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Proxy lifecycle errors
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The public listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called on a proxy that already left `Idle`
    #[error("Proxy on {0} was already started")]
    AlreadyStarted(SocketAddr),
}

/// Lifecycle state of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Idle,
    Listening,
    Stopped,
}

/// Public listener spliced onto a fixed loopback target
#[derive(Debug)]
pub struct StreamProxy {
    listen_addr: SocketAddr,
    target: SocketAddr,
    state: ProxyState,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl StreamProxy {
    /// Create a proxy listening on `listen_addr` and forwarding to `target`
    pub fn new(listen_addr: SocketAddr, target: SocketAddr) -> Self {
        Self {
            listen_addr,
            target,
            state: ProxyState::Idle,
            local_addr: None,
            cancel: CancellationToken::new(),
            accept_task: None,
        }
    }

    /// Listen on `bind:port` and forward to `127.0.0.1:port`
    pub fn paired(bind: IpAddr, port: u16) -> Self {
        Self::new(
            SocketAddr::new(bind, port),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
        )
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Address actually bound, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the public listener and start accepting connections
    pub async fn start(&mut self) -> Result<SocketAddr, ProxyError> {
        if self.state != ProxyState::Idle {
            return Err(ProxyError::AlreadyStarted(self.listen_addr));
        }

        let bind_err = |source| ProxyError::Bind {
            addr: self.listen_addr,
            source,
        };
        let listener = TcpListener::bind(self.listen_addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::debug!("[proxy] listening on {} -> {}", local_addr, self.target);

        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            self.target,
            self.cancel.clone(),
        )));
        self.local_addr = Some(local_addr);
        self.state = ProxyState::Listening;
        Ok(local_addr)
    }

    /// Close the listener. Idempotent.
    ///
    /// Returns once the listening socket has been released. Connections
    /// already spliced are left running.
    pub async fn stop(&mut self) {
        if self.state != ProxyState::Listening {
            return;
        }

        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(
                    "[proxy] accept task for {} ended abnormally: {}",
                    self.listen_addr,
                    e
                );
            }
        }

        tracing::debug!("[proxy] stopped listening on {:?}", self.local_addr);
        self.state = ProxyState::Stopped;
    }
}

impl Drop for StreamProxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(listener: TcpListener, target: SocketAddr, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            result = listener.accept() => match result {
                Ok((inbound, peer)) => {
                    tracing::debug!("[proxy] connection from {} -> {}", peer, target);
                    tokio::spawn(splice(inbound, peer, target));
                }
                Err(e) => {
                    tracing::warn!(
                        "[proxy] accept failed on {:?}: {}",
                        listener.local_addr().ok(),
                        e
                    );
                    // Errors like EMFILE persist; back off instead of spinning
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Pair `inbound` with a new connection to `target` and copy both ways.
///
/// The first direction to finish (EOF or error) ends the pair and both
/// sockets are closed.
async fn splice(inbound: TcpStream, peer: SocketAddr, target: SocketAddr) {
    let outbound = match TcpStream::connect(target).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!("[proxy] target {} unreachable for {}: {}", target, peer, e);
            return;
        }
    };

    let _ = inbound.set_nodelay(true);
    let _ = outbound.set_nodelay(true);

    let (mut in_read, mut in_write) = inbound.into_split();
    let (mut out_read, mut out_write) = outbound.into_split();

    tokio::select! {
        result = tokio::io::copy(&mut in_read, &mut out_write) => match result {
            Ok(bytes) => tracing::debug!("[proxy] {} closed after sending {} bytes", peer, bytes),
            Err(e) => tracing::debug!("[proxy] {} -> {} failed: {}", peer, target, e),
        },
        result = tokio::io::copy(&mut out_read, &mut in_write) => match result {
            Ok(bytes) => tracing::debug!("[proxy] {} closed after sending {} bytes", target, bytes),
            Err(e) => tracing::debug!("[proxy] {} -> {} failed: {}", target, peer, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    /// Echo server on an ephemeral loopback port
    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind(loopback()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut r, mut w) = stream.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
            }
        });
        addr
    }

    async fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
        stream.write_all(payload).await.unwrap();
        let mut buf = vec![0u8; payload.len()];
        timeout(WAIT, stream.read_exact(&mut buf)).await.unwrap().unwrap();
        buf
    }

    #[tokio::test]
    async fn test_bytes_pass_unmodified_both_ways() {
        let target = echo_server().await;
        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Listening);

        let mut client = TcpStream::connect(addr).await.unwrap();
        let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        assert_eq!(round_trip(&mut client, &payload).await, payload);

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_client_close_closes_target_side() {
        let listener = TcpListener::bind(loopback()).await.unwrap();
        let target = listener.local_addr().unwrap();
        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut service, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        service.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(client);
        let n = timeout(WAIT, service.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_target_close_closes_client_side() {
        let listener = TcpListener::bind(loopback()).await.unwrap();
        let target = listener.local_addr().unwrap();
        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (service, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        drop(service);

        let mut buf = [0u8; 1];
        let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_closes_inbound() {
        let closed = TcpListener::bind(loopback()).await.unwrap();
        let target = closed.local_addr().unwrap();
        drop(closed);

        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0);

        // A failed pairing does not take the listener down
        let mut again = TcpStream::connect(addr).await.unwrap();
        let n = timeout(WAIT, again.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(proxy.state(), ProxyState::Listening);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let taken = TcpListener::bind(loopback()).await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut proxy = StreamProxy::new(addr, addr);
        let err = proxy.start().await.unwrap_err();
        assert!(matches!(err, ProxyError::Bind { .. }));
        assert_eq!(proxy.state(), ProxyState::Idle);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_releases_port() {
        let target = echo_server().await;

        let mut idle = StreamProxy::new(loopback(), target);
        idle.stop().await;
        assert_eq!(idle.state(), ProxyState::Idle);

        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();
        proxy.stop().await;
        proxy.stop().await;
        assert_eq!(proxy.state(), ProxyState::Stopped);

        assert!(TcpStream::connect(addr).await.is_err());
        assert!(matches!(proxy.start().await, Err(ProxyError::AlreadyStarted(_))));
    }

    #[tokio::test]
    async fn test_stop_leaves_inflight_connections_running() {
        let target = echo_server().await;
        let mut proxy = StreamProxy::new(loopback(), target);
        let addr = proxy.start().await.unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        assert_eq!(round_trip(&mut client, b"before").await, b"before");

        timeout(WAIT, proxy.stop()).await.unwrap();
        assert_eq!(round_trip(&mut client, b"after").await, b"after");
    }

    #[test]
    fn test_accept_retry_delay_is_reasonable() {
        // Long enough not to spin, short enough to recover promptly
        assert!(ACCEPT_RETRY_DELAY >= Duration::from_millis(10));
        assert!(ACCEPT_RETRY_DELAY <= Duration::from_secs(1));
    }

    #[test]
    fn test_paired_targets_same_loopback_port() {
        let proxy = StreamProxy::paired(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 15000);
        assert_eq!(proxy.target(), SocketAddr::from(([127, 0, 0, 1], 15000)));
        assert_eq!(proxy.state(), ProxyState::Idle);
    }
}
