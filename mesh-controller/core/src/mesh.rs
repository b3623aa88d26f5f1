use super::traffic_policy::TcpKeepalive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Mesh-wide configuration consulted while building clusters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub connect_timeout: Duration,
    /// Promote absent TLS intent to mesh-mutual when safe.
    pub enable_auto_mtls: bool,
    /// Unix socket of the secret-discovery service; empty disables SDS.
    pub sds_uds_path: String,
    pub tcp_keepalive: Option<TcpKeepalive>,
    pub dns_refresh_rate: Duration,
    /// Alt-stat name patterns; empty disables the substitution.
    pub outbound_cluster_stat_name: String,
    pub inbound_cluster_stat_name: String,
    pub locality_lb_setting: Option<LocalityLbSetting>,
    pub features: Features,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            enable_auto_mtls: false,
            sds_uds_path: String::new(),
            tcp_keepalive: None,
            dns_refresh_rate: Duration::from_secs(5),
            outbound_cluster_stat_name: String::new(),
            inbound_cluster_stat_name: String::new(),
            locality_lb_setting: None,
            features: Features::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub enable_redis_filter: bool,
    pub respect_dns_ttl: bool,
    /// How long the data plane waits for the first endpoint fetch on a
    /// dynamic cluster.
    pub initial_fetch_timeout: Duration,
    pub inbound_protocol_sniffing: bool,
    pub outbound_protocol_sniffing: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            enable_redis_filter: false,
            respect_dns_ttl: true,
            initial_fetch_timeout: Duration::from_secs(0),
            inbound_protocol_sniffing: false,
            outbound_protocol_sniffing: false,
        }
    }
}

/// Locality-aware load-balancing policy applied across emitted clusters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityLbSetting {
    pub distribute: Vec<LocalityDistribute>,
    pub failover: Vec<LocalityFailover>,
}

/// Weight table applied when the proxy locality matches `from`. Patterns are
/// slash-delimited with `*` wildcards; omitted segments match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityDistribute {
    pub from: String,
    pub to: BTreeMap<String, u32>,
}

/// Region-to-region failover preference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityFailover {
    pub from: String,
    pub to: String,
}
