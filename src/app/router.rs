use std::net::IpAddr;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::domain::route::RouteSet;
use crate::ports::router_port::{RouterPort, TxPort};

/// RouterService = the owning side of the port contract.
///
/// Holds every attached port exclusively, deduplicates them by identity,
/// picks the egress port by longest matching prefix, and is the only code
/// in the daemon that touches the `TxPort` tier. Single-owner: callers
/// that share it across tasks must wrap it themselves.
pub struct RouterService {
    ports: Vec<Box<dyn TxPort>>,
}

impl Default for RouterService {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterService {
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Attach a port. Refused when an equal port (same identity, routes
    /// ignored) is already attached.
    pub fn register(&mut self, port: Box<dyn TxPort>) -> Result<()> {
        if self
            .ports
            .iter()
            .any(|existing| existing.as_router_port() == port.as_router_port())
        {
            bail!("port already registered: {}", port.as_router_port());
        }
        info!(port=%port.as_router_port(), routes=port.local_routes().len(), "port registered");
        self.ports.push(port);
        Ok(())
    }

    /// Detach whichever port equals `target`. Returns false when none did.
    pub fn deregister(&mut self, target: &dyn RouterPort) -> bool {
        let before = self.ports.len();
        self.ports.retain(|p| p.as_router_port() != target);
        let removed = before != self.ports.len();
        if removed {
            info!(port=%target, "port deregistered");
        }
        removed
    }

    /// Replace the routes of the port equal to `target`, wholesale.
    pub fn set_port_routes(&mut self, target: &dyn RouterPort, routes: RouteSet) -> bool {
        match self
            .ports
            .iter_mut()
            .find(|p| p.as_router_port() == target)
        {
            Some(port) => {
                info!(port=%target, routes=routes.len(), "port routes replaced");
                port.set_local_routes(routes);
                true
            }
            None => false,
        }
    }

    /// Read the routes of the port equal to `target`.
    pub fn port_routes(&self, target: &dyn RouterPort) -> Option<&RouteSet> {
        self.ports
            .iter()
            .find(|p| p.as_router_port() == target)
            .map(|p| p.local_routes())
    }

    /// Pick the port advertising the most specific prefix containing
    /// `dest`, or None when nothing matches.
    pub fn lookup(&self, dest: IpAddr) -> Option<&dyn TxPort> {
        let mut best: Option<(u8, &dyn TxPort)> = None;
        for port in &self.ports {
            for route in port.local_routes() {
                if route.contains(dest) {
                    let better = best.is_none_or(|(plen, _)| route.prefix_len() > plen);
                    if better {
                        best = Some((route.prefix_len(), port.as_ref()));
                    }
                }
            }
        }
        best.map(|(_, port)| port)
    }

    /// Transmit `data` out the port equal to `target`.
    pub async fn send(&self, target: &dyn RouterPort, data: &[u8]) -> Result<()> {
        let port = self
            .ports
            .iter()
            .find(|p| p.as_router_port() == target)
            .with_context(|| format!("no such port: {target}"))?;
        port.write(data)
            .await
            .with_context(|| format!("write failed on {}", port.as_router_port()))
    }

    /// Route `data` toward `dest`. Unroutable packets and failed writes
    /// are dropped and logged; neither poisons the registry.
    pub async fn forward(&self, dest: IpAddr, data: &[u8]) {
        let Some(port) = self.lookup(dest) else {
            debug!(dest=%dest, len=%data.len(), "no route; dropping packet");
            return;
        };
        if let Err(e) = port.write(data).await {
            warn!(port=%port.as_router_port(), dest=%dest, error=%e, "write failed; dropping packet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::route::parse_route_list;
    use crate::infra::switch_port::SwitchFabric;
    use crate::infra::tap_port::TapPort;
    use tokio::sync::mpsc;

    fn routes(items: &[&str]) -> RouteSet {
        let owned: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        parse_route_list(&owned).unwrap()
    }

    fn tap(name: &str, routes: RouteSet) -> (TapPort, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TapPort::new(name.to_string(), tx, routes), rx)
    }

    #[tokio::test]
    async fn refuses_duplicate_identity() {
        let mut router = RouterService::new();
        let (a, _rx_a) = tap("tap0", routes(&["10.0.0.0/24"]));
        let (b, _rx_b) = tap("tap0", routes(&["192.168.0.0/16"]));

        router.register(Box::new(a)).unwrap();
        assert!(router.register(Box::new(b)).is_err());
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn lookup_prefers_longest_prefix() {
        let mut router = RouterService::new();
        let (wide, _rx) = tap("tap-wide", routes(&["10.0.0.0/8"]));
        router.register(Box::new(wide)).unwrap();

        let fabric = SwitchFabric::new("fab0");
        router
            .register(Box::new(fabric.port(0, routes(&["10.0.1.0/24"]))))
            .unwrap();

        let hit = router.lookup("10.0.1.5".parse().unwrap()).unwrap();
        assert_eq!(hit.as_router_port().to_string(), "switch:fab0/0");

        let hit = router.lookup("10.9.9.9".parse().unwrap()).unwrap();
        assert_eq!(hit.as_router_port().to_string(), "tap:tap-wide");

        assert!(router.lookup("192.168.1.1".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn forward_writes_through_matching_port() {
        let mut router = RouterService::new();
        let (port, mut rx) = tap("tap0", routes(&["10.0.0.0/24"]));
        router.register(Box::new(port)).unwrap();

        router.forward("10.0.0.9".parse().unwrap(), b"payload").await;
        assert_eq!(rx.recv().await.unwrap(), b"payload");

        // No route: dropped quietly, nothing queued.
        router.forward("172.16.0.1".parse().unwrap(), b"lost").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_targets_by_identity() {
        let mut router = RouterService::new();
        let (port, mut rx) = tap("tap0", routes(&["10.0.0.0/24"]));
        router.register(Box::new(port)).unwrap();

        // A probe port with the same name is the same identity.
        let (probe, _probe_rx) = tap("tap0", RouteSet::new());
        router.send(probe.as_router_port(), b"direct").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"direct");

        let (stranger, _rx2) = tap("tap9", RouteSet::new());
        assert!(router.send(stranger.as_router_port(), b"x").await.is_err());
    }

    #[tokio::test]
    async fn owner_replaces_routes_wholesale() {
        let mut router = RouterService::new();
        let (port, _rx) = tap("tap0", routes(&["10.0.0.0/24"]));
        router.register(Box::new(port)).unwrap();

        let (probe, _probe_rx) = tap("tap0", RouteSet::new());
        let replaced =
            router.set_port_routes(probe.as_router_port(), routes(&["192.168.1.0/24"]));
        assert!(replaced);
        assert_eq!(
            router.port_routes(probe.as_router_port()).unwrap(),
            &routes(&["192.168.1.0/24"])
        );

        // Old routes are gone: the wide /24 no longer matches.
        assert!(router.lookup("10.0.0.9".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn failed_write_does_not_poison_registry_or_routes() {
        let mut router = RouterService::new();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx); // device task gone: every write fails
        let broken = TapPort::new("tap0".to_string(), tx, routes(&["10.0.0.0/24"]));
        router.register(Box::new(broken)).unwrap();

        router.forward("10.0.0.9".parse().unwrap(), b"doomed").await;

        let (probe, _probe_rx) = tap("tap0", RouteSet::new());
        assert_eq!(
            router.port_routes(probe.as_router_port()).unwrap(),
            &routes(&["10.0.0.0/24"])
        );
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn deregister_removes_by_identity() {
        let mut router = RouterService::new();
        let (port, _rx) = tap("tap0", routes(&["10.0.0.0/24"]));
        router.register(Box::new(port)).unwrap();

        let (probe, _probe_rx) = tap("tap0", RouteSet::new());
        assert!(router.deregister(probe.as_router_port()));
        assert!(router.is_empty());
        assert!(!router.deregister(probe.as_router_port()));
    }
}
