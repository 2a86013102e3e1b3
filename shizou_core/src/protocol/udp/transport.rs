//! Datagram transport used by the UDP session
//!
//! The trait lets tests script server replies; production uses a tokio
//! `UdpSocket` connected to the AniDB host.

use async_trait::async_trait;
use log::{debug, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::OnceCell;

use crate::Result;
use crate::error::IoError;

/// Receive buffer size; compressed replies never exceed the MTU
const RECV_BUFFER_SIZE: usize = 2048;

/// Send and receive whole datagrams
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Wait for the next datagram; `None` when `timeout` elapses first
    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// Tokio socket bound on first use
pub struct UdpSocketTransport {
    host: String,
    port: u16,
    local_port: u16,
    socket: OnceCell<UdpSocket>,
}

impl UdpSocketTransport {
    pub fn new(host: impl Into<String>, port: u16, local_port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local_port,
            socket: OnceCell::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn socket(&self) -> Result<&UdpSocket> {
        self.socket
            .get_or_try_init(|| async {
                let endpoint = self.endpoint();
                debug!("Resolving AniDB UDP server {endpoint}");
                let server: SocketAddr = lookup_host(&endpoint)
                    .await
                    .map_err(|e| {
                        warn!("Failed to resolve server address '{endpoint}': {e}");
                        IoError::network(&endpoint, Some(e))
                    })?
                    .find(SocketAddr::is_ipv4)
                    .ok_or_else(|| IoError::network(&endpoint, None))?;

                let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.local_port));
                let socket = UdpSocket::bind(bind)
                    .await
                    .map_err(|e| IoError::network(&endpoint, Some(e)))?;
                socket
                    .connect(server)
                    .await
                    .map_err(|e| IoError::network(&endpoint, Some(e)))?;
                debug!("UDP socket bound to {bind}, connected to {server}");
                Ok::<_, crate::Error>(socket)
            })
            .await
    }
}

#[async_trait]
impl DatagramTransport for UdpSocketTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let socket = self.socket().await?;
        let sent = socket
            .send(payload)
            .await
            .map_err(|e| IoError::network(self.endpoint(), Some(e)))?;
        if sent != payload.len() {
            warn!("Partial send: {sent} of {} bytes", payload.len());
        }
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let socket = self.socket().await?;
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
        match tokio::time::timeout(timeout, socket.recv(&mut buffer)).await {
            Ok(Ok(size)) => {
                buffer.truncate(size);
                Ok(Some(buffer))
            }
            Ok(Err(e)) => Err(IoError::network(self.endpoint(), Some(e)).into()),
            Err(_) => Ok(None),
        }
    }
}
