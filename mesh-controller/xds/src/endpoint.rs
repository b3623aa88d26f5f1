use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Address {
    Socket(SocketAddress),
    Pipe { path: String },
}

/// Source-address binding applied to upstream connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BindConfig {
    pub source_address: SocketAddress,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Locality {
    pub region: String,
    pub zone: String,
    pub sub_zone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LbEndpoint {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_weight: Option<u32>,
    /// Endpoint labels the data plane may match on (uid, network,
    /// mTLS readiness).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Endpoints grouped by locality; the group weight is the sum of member
/// weights, later normalized to a shared denominator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocalityLbEndpoints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<Locality>,
    pub lb_endpoints: Vec<LbEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_weight: Option<u32>,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterLoadAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<LocalityLbEndpoints>,
}
