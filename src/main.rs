// SPDX-License-Identifier: Apache-2.0
//! main
//!
//! Layer: Composition Root
//! Purpose:
//! - Wire ports into a RouterService and pump the tunnel socket.
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::RouterService;
use crate::domain::route::{parse_route_list, RouteSet};
use crate::infra::switch_port::SwitchFabric;
use crate::infra::tap_port::{self, TapPort};
use crate::infra::tunnel_port::TunnelPort;
use crate::ports::router_port::TxPort;

mod app;
mod domain;
mod infra;
mod ports;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// UDP bind address for the tunnel socket
    #[arg(long, default_value = "0.0.0.0:4500")]
    bind: String,

    /// Remote tunnel endpoint, e.g. 203.0.113.7:4500
    #[arg(long)]
    peer: Option<String>,

    /// Route reachable through the tunnel peer (CIDR, repeatable)
    #[arg(long = "peer-route")]
    peer_routes: Vec<String>,

    /// Name of the local tap device port
    #[arg(long, default_value = "tap0")]
    tap: String,

    /// Route reachable through the tap device (CIDR, repeatable)
    #[arg(long = "tap-route")]
    tap_routes: Vec<String>,

    /// Also attach an in-memory switch leg and log frames crossing it
    /// (useful when there is no second transport to talk to).
    #[arg(long)]
    loopback: bool,

    /// Route reachable through the loopback switch leg (CIDR, repeatable)
    #[arg(long = "loopback-route")]
    loopback_routes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bind: SocketAddr = args.bind.parse().context("bad --bind address")?;

    let socket = Arc::new(
        UdpSocket::bind(bind)
            .await
            .with_context(|| format!("udp bind failed on {bind}"))?,
    );
    info!(bind=%bind, "packet_router_daemon starting");

    let mut router = RouterService::new();

    if let Some(peer) = &args.peer {
        let remote: SocketAddr = peer.parse().context("bad --peer address")?;
        let peer_routes = parse_route_list(&args.peer_routes)?;
        router.register(Box::new(TunnelPort::new(
            socket.clone(),
            remote,
            peer_routes,
        )))?;
    }

    let (tap_tx, tap_rx) = mpsc::unbounded_channel();
    let tap_routes = parse_route_list(&args.tap_routes)?;
    router.register(Box::new(TapPort::new(args.tap.clone(), tap_tx, tap_routes)))?;
    tap_port::start_stub_drain(args.tap.clone(), tap_rx);

    if args.loopback {
        let fabric = SwitchFabric::new("loop0");
        let loopback_routes = parse_route_list(&args.loopback_routes)?;
        router.register(Box::new(fabric.port(0, loopback_routes)))?;

        let mut frames = fabric.subscribe();
        tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(frame) => {
                        info!(leg=%frame.leg, len=%frame.data.len(), "loopback switch frame")
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(dropped)) => {
                        warn!(dropped=%dropped, "loopback observer lagged; dropped frames");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Startup self-test: an empty frame out the leg, addressed by a
        // probe port with the same identity.
        let probe = fabric.port(0, RouteSet::new());
        router.send(probe.as_router_port(), &[]).await?;
        info!("loopback self-test frame sent");
    }

    info!(ports=%router.len(), "router ready");
    let router = Arc::new(router);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
        res = run_rx_loop(socket, router.clone()) => {
            if let Err(e) = res {
                warn!(error=%e, "tunnel rx loop ended");
            }
        }
    }

    Ok(())
}

/// Receive datagrams on the tunnel socket and forward each as a raw IP
/// packet toward its destination.
async fn run_rx_loop(socket: Arc<UdpSocket>, router: Arc<RouterService>) -> Result<()> {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, from) = socket
            .recv_from(&mut buf)
            .await
            .context("tunnel socket recv")?;
        let packet = &buf[..len];

        match domain::packet::destination(packet) {
            Some(dest) => {
                debug!(from=%from, dest=%dest, len=%len, "tunnel rx");
                router.forward(dest, packet).await;
            }
            None => {
                warn!(from=%from, len=%len, "dropping non-ip datagram");
            }
        }
    }
}
