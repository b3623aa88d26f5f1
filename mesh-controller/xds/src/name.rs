use serde::Serialize;
use std::fmt;

/// Catch-all cluster that silently drops traffic to unresolved routes.
pub const BLACK_HOLE_CLUSTER: &str = "BlackHoleCluster";

/// Catch-all cluster forwarding to the original destination.
pub const PASSTHROUGH_CLUSTER: &str = "PassthroughCluster";

pub const INBOUND_PASSTHROUGH_CLUSTER_IPV4: &str = "InboundPassthroughClusterIpv4";
pub const INBOUND_PASSTHROUGH_CLUSTER_IPV6: &str = "InboundPassthroughClusterIpv6";

/// Loopback-local source addresses bound by the inbound passthrough
/// clusters so node-local delivery preserves the original destination.
pub const INBOUND_PASSTHROUGH_BIND_IPV4: &str = "127.0.0.6";
pub const INBOUND_PASSTHROUGH_BIND_IPV6: &str = "::6";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TrafficDirection {
    Outbound,
    Inbound,
}

impl TrafficDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        }
    }
}

impl fmt::Display for TrafficDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<direction>|<port>|<subsetName>|<hostname>`
pub fn build_subset_key(
    direction: TrafficDirection,
    subset: &str,
    hostname: &str,
    port: u16,
) -> String {
    format!("{direction}|{port}|{subset}|{hostname}")
}

/// `<direction>_.<port>_.<subsetName>_.<hostname>`, the DNS-SRV-shaped form
/// used for SNI-DNAT gateways.
pub fn build_dns_srv_subset_key(
    direction: TrafficDirection,
    subset: &str,
    hostname: &str,
    port: u16,
) -> String {
    format!("{direction}_.{port}_.{subset}_.{hostname}")
}
