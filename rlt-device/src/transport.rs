use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::process::Command;

use crate::error::DeviceError;

/// Datagram transport owned by one session.
///
/// The session has a transport instead of being one so the protocol state
/// machine can run against a scripted implementation in tests.
#[async_trait]
pub trait Transport: Send {
    /// Network-level reachability check, performed before any protocol
    /// exchange. A `false` result means the peer cannot be reached at all.
    async fn probe(&mut self) -> bool;

    async fn send(&mut self, payload: &[u8]) -> Result<(), DeviceError>;

    /// Waits for one datagram. Elapsing the deadline is reported as
    /// `DeviceError::Timeout`, distinct from transport failures.
    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, DeviceError>;

    /// Sizes the OS receive queue for a burst of capture frames.
    fn set_recv_buffer(&mut self, bytes: usize) -> Result<(), DeviceError>;

    fn peer(&self) -> String;
}

/// UDP transport to one embedded device on the fixed control port.
pub struct UdpTransport {
    socket: UdpSocket,
    host: IpAddr,
}

impl UdpTransport {
    pub async fn connect(host: IpAddr) -> Result<Self, DeviceError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect((host, rlt_proto::DEVICE_PORT)).await?;

        Ok(Self { socket, host })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn probe(&mut self) -> bool {
        // UDP gives no connectivity signal of its own, so probe the host the
        // same way the bench operators do.
        let output = Command::new("ping")
            .args(["-c", "1", "-W", "2"])
            .arg(self.host.to_string())
            .output()
            .await;

        match output {
            Ok(out) => out.status.success(),
            Err(e) => {
                log::warn!("ping unavailable ({e}), assuming {} reachable", self.host);
                true
            }
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), DeviceError> {
        self.socket.send(payload).await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, DeviceError> {
        match tokio::time::timeout(deadline, self.socket.recv(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DeviceError::Timeout(deadline)),
        }
    }

    fn set_recv_buffer(&mut self, bytes: usize) -> Result<(), DeviceError> {
        socket2::SockRef::from(&self.socket).set_recv_buffer_size(bytes)?;
        Ok(())
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.host, rlt_proto::DEVICE_PORT)
    }
}
