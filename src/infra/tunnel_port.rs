// SPDX-License-Identifier: Apache-2.0
//! tunnel_port
//!
//! Layer: Infrastructure
//! Purpose:
//! - Point-to-point UDP tunnel endpoint behind the RouterPort contract.
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::domain::route::RouteSet;
use crate::ports::router_port::{LocalRoutes, RouterPort, TxPort};

/// A router port backed by a UDP socket with one fixed remote endpoint.
/// Identity is the remote endpoint address: two tunnel ports to the same
/// peer denote the same attachment, whatever their routes or sockets.
pub struct TunnelPort {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    routes: LocalRoutes,
}

impl TunnelPort {
    pub fn new(socket: Arc<UdpSocket>, remote: SocketAddr, initial_routes: RouteSet) -> Self {
        Self {
            socket,
            remote,
            routes: LocalRoutes::new(initial_routes),
        }
    }

}

impl RouterPort for TunnelPort {
    fn local_routes(&self) -> &RouteSet {
        self.routes.get()
    }

    fn set_local_routes(&mut self, routes: RouteSet) {
        self.routes.replace(routes);
    }

    fn identity_eq(&self, other: &dyn RouterPort) -> bool {
        other
            .as_any()
            .downcast_ref::<TunnelPort>()
            .is_some_and(|o| o.remote == self.remote)
    }

    fn fmt_label(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tunnel:{}", self.remote)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl TxPort for TunnelPort {
    /// One datagram per write. Does not block beyond the socket send;
    /// delivery is best effort, as UDP is.
    async fn write(&self, data: &[u8]) -> Result<()> {
        let sent = self
            .socket
            .send_to(data, self.remote)
            .await
            .with_context(|| format!("tunnel send to {} failed", self.remote))?;
        if sent != data.len() {
            bail!("short tunnel write: {sent} of {} bytes", data.len());
        }
        Ok(())
    }

    fn as_router_port(&self) -> &dyn RouterPort {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::route::parse_route_list;

    async fn loopback_socket() -> Arc<UdpSocket> {
        Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap())
    }

    fn routes(items: &[&str]) -> RouteSet {
        let owned: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        parse_route_list(&owned).unwrap()
    }

    #[tokio::test]
    async fn write_delivers_one_datagram() {
        let receiver = loopback_socket().await;
        let remote = receiver.local_addr().unwrap();
        let port = TunnelPort::new(loopback_socket().await, remote, routes(&["10.0.0.0/24"]));

        port.write(b"hello tunnel").await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello tunnel");
    }

    #[tokio::test]
    async fn write_accepts_empty_payload() {
        let receiver = loopback_socket().await;
        let remote = receiver.local_addr().unwrap();
        let port = TunnelPort::new(loopback_socket().await, remote, RouteSet::new());

        port.write(&[]).await.unwrap();

        let mut buf = [0u8; 8];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 0);
    }

    #[tokio::test]
    async fn failed_write_leaves_routes_intact() {
        // Port 0 is never a valid destination; send_to must fail.
        let bad_remote: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let port = TunnelPort::new(loopback_socket().await, bad_remote, routes(&["10.0.0.0/24"]));

        assert!(port.write(b"doomed").await.is_err());
        assert_eq!(port.local_routes(), &routes(&["10.0.0.0/24"]));
    }

    #[tokio::test]
    async fn identity_is_the_remote_endpoint() {
        let remote: SocketAddr = "127.0.0.1:4500".parse().unwrap();
        let other: SocketAddr = "127.0.0.1:4501".parse().unwrap();

        let a = TunnelPort::new(loopback_socket().await, remote, routes(&["10.0.0.0/24"]));
        let b = TunnelPort::new(loopback_socket().await, remote, routes(&["192.168.0.0/16"]));
        let c = TunnelPort::new(loopback_socket().await, other, routes(&["10.0.0.0/24"]));

        let (a, b, c): (&dyn RouterPort, &dyn RouterPort, &dyn RouterPort) = (&a, &b, &c);
        assert!(a == b, "same peer, different routes and sockets");
        assert!(a != c, "different peer");
        assert_eq!(a.to_string(), "tunnel:127.0.0.1:4500");
    }
}
