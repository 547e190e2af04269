use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use ipnetwork::IpNetwork;

/// A reachable network prefix, e.g. `10.0.0.0/24` or `fd00::/64`.
///
/// Thin wrapper over [`IpNetwork`] so the rest of the daemon never depends
/// on the parsing crate directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route(IpNetwork);

/// The set of routes advertised through a port. Plain value semantics:
/// clones are independent, membership and enumeration are all we need.
pub type RouteSet = HashSet<Route>;

impl Route {
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.0.contains(addr)
    }

    /// Prefix length in bits; longer means more specific.
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix()
    }
}

impl From<IpNetwork> for Route {
    fn from(net: IpNetwork) -> Self {
        Self(net)
    }
}

impl FromStr for Route {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let net: IpNetwork = s
            .parse()
            .with_context(|| format!("invalid route {s:?} (expected CIDR like 10.0.0.0/24)"))?;
        Ok(Self(net))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parse a list of CLI-provided CIDR strings into a route set.
pub fn parse_route_list(items: &[String]) -> Result<RouteSet> {
    items.iter().map(|s| s.parse::<Route>()).collect()
}
