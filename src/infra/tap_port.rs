// SPDX-License-Identifier: Apache-2.0
//! tap_port
//!
//! Layer: Infrastructure
//! Purpose:
//! - Virtual tap-device-backed router port, fed through a channel.
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

use std::any::Any;
use std::fmt;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::route::RouteSet;
use crate::ports::router_port::{LocalRoutes, RouterPort, TxPort};

/// A router port standing for a local tap device. Outbound packets are
/// handed to whatever task owns the actual device fd via a channel, so
/// `write` never blocks. Identity is the device name.
pub struct TapPort {
    name: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    routes: LocalRoutes,
}

impl TapPort {
    pub fn new(name: String, tx: mpsc::UnboundedSender<Vec<u8>>, initial_routes: RouteSet) -> Self {
        Self {
            name,
            tx,
            routes: LocalRoutes::new(initial_routes),
        }
    }

}

impl RouterPort for TapPort {
    fn local_routes(&self) -> &RouteSet {
        self.routes.get()
    }

    fn set_local_routes(&mut self, routes: RouteSet) {
        self.routes.replace(routes);
    }

    fn identity_eq(&self, other: &dyn RouterPort) -> bool {
        other
            .as_any()
            .downcast_ref::<TapPort>()
            .is_some_and(|o| o.name == self.name)
    }

    fn fmt_label(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tap:{}", self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl TxPort for TapPort {
    /// Copies the payload and queues it for the device task. Fails only
    /// when the device task is gone.
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| anyhow!("tap device task gone: {}", self.name))
    }

    fn as_router_port(&self) -> &dyn RouterPort {
        self
    }
}

/// Stub drain standing in for a real tap fd writer: logs and discards.
/// Replace with an actual tun/tap binding when running on a device host.
pub fn start_stub_drain(name: String, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            debug!(dev=%name, len=%packet.len(), "tap stub drain: discarding packet");
        }
        debug!(dev=%name, "tap stub drain stopped");
    });
}
