use std::any::Any;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::route::RouteSet;

/// RouterPort = the attachment point a routing engine holds, queries for
/// reachability, and compares during reconfiguration. Transport-agnostic:
/// the router never learns which concrete transport sits behind it.
///
/// Not internally synchronized. The owner serializes access; `&mut self`
/// on the mutator makes that discipline compile-time here.
pub trait RouterPort: Send + Sync {
    /// The routes currently advertised as reachable through this port.
    /// Always reflects the most recent `set_local_routes` call.
    fn local_routes(&self) -> &RouteSet;

    /// Replace the advertised routes wholesale. The old set is discarded;
    /// no merging, no dedup, no conflict checking at this level.
    fn set_local_routes(&mut self, routes: RouteSet);

    /// Whether `other` denotes the same underlying transport endpoint.
    ///
    /// Total, never fails. Must be reflexive, symmetric and transitive,
    /// must return `false` whenever `other` is a different concrete type,
    /// and must ignore `local_routes` entirely. Implementations downcast
    /// through [`RouterPort::as_any`], which gives the cross-subtype
    /// `false` for free.
    fn identity_eq(&self, other: &dyn RouterPort) -> bool;

    /// Write the port's identity label (never its routes) for logs and
    /// diagnostics. Stable across calls while the port is unchanged.
    fn fmt_label(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Downcast hook for `identity_eq`.
    fn as_any(&self) -> &dyn Any;
}

/// TxPort = the narrower tier that can actually transmit. Only the owning
/// router is handed this view; everything else sees `&dyn RouterPort`.
#[async_trait]
pub trait TxPort: RouterPort {
    /// Request transmission of `data` out this port.
    ///
    /// The span is borrowed for the duration of the call only; the borrow
    /// checker keeps its contents stable until `write` returns. Whether
    /// the call blocks, and what delivery means, is transport-specific.
    /// Zero-length payloads are valid. A failed write must leave
    /// `local_routes` untouched.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// View this port through the public tier, for identity comparisons.
    fn as_router_port(&self) -> &dyn RouterPort;
}

/// Routes storage every concrete port embeds. This is the only state the
/// abstraction itself carries.
#[derive(Debug, Clone, Default)]
pub struct LocalRoutes {
    routes: RouteSet,
}

impl LocalRoutes {
    pub fn new(initial: RouteSet) -> Self {
        Self { routes: initial }
    }

    pub fn get(&self) -> &RouteSet {
        &self.routes
    }

    pub fn replace(&mut self, routes: RouteSet) {
        self.routes = routes;
    }
}

impl PartialEq for dyn RouterPort + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.identity_eq(other)
    }
}

impl fmt::Display for dyn RouterPort + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_label(f)
    }
}

impl fmt::Display for dyn TxPort + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_label(f)
    }
}
