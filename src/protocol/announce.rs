//! Periodic broadcast that lets pixel streaming clients find the board.

use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

const PROTOCOL_VERSION: u32 = 1;

pub fn payload(interface: std::net::IpAddr, port: u16, width: usize, height: usize) -> String {
    format!("pixelvloed:{PROTOCOL_VERSION}.00 {interface}:{port} {width}*{height}")
}

pub struct Announcer {
    pub socket: UdpSocket,
    pub target: SocketAddr,
    pub payload: String,
    pub interval: Duration,
}

impl Announcer {
    /// A socket allowed to send to the broadcast address.
    pub async fn bind(announce_port: u16) -> std::io::Result<UdpSocket> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        tracing::debug!(announce_port, "Bound announcement socket");
        Ok(socket)
    }

    pub fn broadcast_target(announce_port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::BROADCAST, announce_port))
    }

    pub async fn run(self, token: CancellationToken) {
        tracing::info!(payload = %self.payload, target = %self.target, "Announcing");
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(error) = self.socket.send_to(self.payload.as_bytes(), self.target).await {
                        tracing::warn!(?error, "Failed to send announcement");
                    }
                }
            }
        }

        tracing::debug!("Announcer stopped");
    }
}
