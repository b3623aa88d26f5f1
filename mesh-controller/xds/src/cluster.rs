use super::endpoint::{BindConfig, ClusterLoadAssignment};
use super::tls::{TransportSocketMatch, UpstreamTlsContext};
use serde::Serialize;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryType {
    Eds,
    StrictDns,
    #[default]
    Static,
    OriginalDst,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbPolicy {
    #[default]
    RoundRobin,
    LeastRequest,
    Random,
    RingHash,
    Maglev,
    /// The discovery type supplies its own balancer (original-destination).
    ClusterProvided,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolSelection {
    #[default]
    UseConfiguredProtocol,
    /// Speak whatever protocol the downstream connection used.
    UseDownstreamProtocol,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsLookupFamily {
    Auto,
    V4Only,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakers {
    pub thresholds: Vec<Thresholds>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OutlierDetection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_gateway_failure: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcing_consecutive_gateway_failure: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcing_consecutive_5xx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_ejection_time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ejection_percent: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommonLbConfig {
    /// Explicit healthy-panic floor; 0 disables the data-plane default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_panic_threshold: Option<f64>,
    pub locality_weighted_lb_config: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LbConfig {
    RingHashLbConfig { minimum_ring_size: u64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Http2ProtocolOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_streams: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HttpProtocolOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<Duration>,
}

/// Unset probe fields are omitted so OS defaults apply; the empty record
/// still forces SO_KEEPALIVE on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TcpKeepalive {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_probes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_interval: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamConnectionOptions {
    pub tcp_keepalive: TcpKeepalive,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSourceSpecifier {
    /// Fetch over the aggregated discovery stream.
    #[default]
    Ads,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConfigSource {
    pub specifier: ConfigSourceSpecifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_fetch_timeout: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdsClusterConfig {
    pub service_name: String,
    pub eds_config: ConfigSource,
}

/// Source-resource lineage attached to generated clusters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Lineage {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub resource_version: String,
}

/// A named upstream target consumed by the data plane.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Cluster {
    pub name: String,
    #[serde(rename = "type")]
    pub discovery_type: DiscoveryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eds_cluster_config: Option<EdsClusterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_assignment: Option<ClusterLoadAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
    pub lb_policy: LbPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb_config: Option<LbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_lb_config: Option<CommonLbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breakers: Option<CircuitBreakers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier_detection: Option<OutlierDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests_per_connection: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_http_protocol_options: Option<HttpProtocolOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2_protocol_options: Option<Http2ProtocolOptions>,
    pub protocol_selection: ProtocolSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_connection_options: Option<UpstreamConnectionOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_context: Option<UpstreamTlsContext>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transport_socket_matches: Vec<TransportSocketMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_bind_config: Option<BindConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_lookup_family: Option<DnsLookupFamily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_refresh_rate: Option<Duration>,
    pub respect_dns_ttl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_stat_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Lineage>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, discovery_type: DiscoveryType) -> Self {
        Self {
            name: name.into(),
            discovery_type,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_clusters_omit_unset_fields() {
        let cluster = Cluster::new("outbound|80||a.example.com", DiscoveryType::Eds);
        let value = serde_json::to_value(&cluster).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["name"], "outbound|80||a.example.com");
        assert_eq!(obj["type"], "EDS");
        assert!(!obj.contains_key("tls_context"));
        assert!(!obj.contains_key("transport_socket_matches"));
        assert!(!obj.contains_key("load_assignment"));
    }
}
