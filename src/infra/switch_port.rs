// SPDX-License-Identifier: Apache-2.0
//! switch_port
//!
//! Layer: Infrastructure
//! Purpose:
//! - In-memory switch fabric with multiple legs behind the RouterPort contract.
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

use std::any::Any;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::route::RouteSet;
use crate::ports::router_port::{LocalRoutes, RouterPort, TxPort};

/// Capacity chosen for dev; slow subscribers lag and drop frames.
const FABRIC_CAPACITY: usize = 1024;

/// A frame crossing the fabric, tagged with the leg it left through.
#[derive(Debug, Clone)]
pub struct SwitchFrame {
    pub leg: u32,
    pub data: Vec<u8>,
}

/// In-memory fan-out shared by all legs of one switch.
#[derive(Clone)]
pub struct SwitchFabric {
    id: String,
    tx: broadcast::Sender<SwitchFrame>,
}

impl SwitchFabric {
    pub fn new(id: &str) -> Self {
        let (tx, _) = broadcast::channel(FABRIC_CAPACITY);
        Self {
            id: id.to_string(),
            tx,
        }
    }

    /// Attach a new leg with its initial routes.
    pub fn port(&self, leg: u32, initial_routes: RouteSet) -> SwitchPort {
        SwitchPort {
            fabric_id: self.id.clone(),
            leg,
            tx: self.tx.clone(),
            routes: LocalRoutes::new(initial_routes),
        }
    }

    /// Observe every frame crossing the fabric.
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchFrame> {
        self.tx.subscribe()
    }
}

/// One leg of an in-memory switch fabric. Identity is (fabric id, leg
/// number); routes play no part in it.
pub struct SwitchPort {
    fabric_id: String,
    leg: u32,
    tx: broadcast::Sender<SwitchFrame>,
    routes: LocalRoutes,
}

impl RouterPort for SwitchPort {
    fn local_routes(&self) -> &RouteSet {
        self.routes.get()
    }

    fn set_local_routes(&mut self, routes: RouteSet) {
        self.routes.replace(routes);
    }

    fn identity_eq(&self, other: &dyn RouterPort) -> bool {
        other
            .as_any()
            .downcast_ref::<SwitchPort>()
            .is_some_and(|o| o.fabric_id == self.fabric_id && o.leg == self.leg)
    }

    fn fmt_label(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "switch:{}/{}", self.fabric_id, self.leg)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl TxPort for SwitchPort {
    /// Publishes onto the fabric. An empty fabric (no subscribers) is not
    /// an error: the frame simply goes nowhere.
    async fn write(&self, data: &[u8]) -> Result<()> {
        let _ = self.tx.send(SwitchFrame {
            leg: self.leg,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn as_router_port(&self) -> &dyn RouterPort {
        self
    }
}
