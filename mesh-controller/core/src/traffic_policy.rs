use super::service::{Hostname, Labels};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source identity of a configuration resource; emitted as cluster lineage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMeta {
    pub name: String,
    pub namespace: String,
    pub resource_version: String,
}

/// A destination rule together with the identity of the resource that
/// declared it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationRuleConfig {
    pub meta: ConfigMeta,
    pub rule: DestinationRule,
}

/// Service-scoped traffic-policy container: a root policy plus named
/// subsets. At most one per service hostname.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationRule {
    pub host: Hostname,
    pub traffic_policy: Option<TrafficPolicy>,
    pub subsets: Vec<Subset>,
}

/// A label-defined slice of a service's endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subset {
    pub name: String,
    pub labels: Labels,
    pub traffic_policy: Option<TrafficPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficPolicy {
    pub connection_pool: Option<ConnectionPool>,
    pub outlier_detection: Option<OutlierDetection>,
    pub load_balancer: Option<LoadBalancerSettings>,
    pub tls: Option<TlsSettings>,
    /// Scanned in declared order; the first entry matching the target port
    /// replaces all four facets wholesale.
    pub port_level_settings: Vec<PortTrafficPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortTrafficPolicy {
    pub port: Option<u16>,
    pub connection_pool: Option<ConnectionPool>,
    pub outlier_detection: Option<OutlierDetection>,
    pub load_balancer: Option<LoadBalancerSettings>,
    pub tls: Option<TlsSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPool {
    pub tcp: Option<TcpSettings>,
    pub http: Option<HttpSettings>,
}

/// Zero-valued numeric fields mean "unset"; the source representation
/// cannot distinguish the two.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpSettings {
    pub max_connections: u32,
    pub connect_timeout: Option<Duration>,
    pub tcp_keepalive: Option<TcpKeepalive>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpKeepalive {
    pub probes: u32,
    pub time: Option<Duration>,
    pub interval: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub http1_max_pending_requests: u32,
    pub http2_max_requests: u32,
    pub max_requests_per_connection: u32,
    pub max_retries: u32,
    pub idle_timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierDetection {
    pub consecutive_errors: u32,
    pub interval: Option<Duration>,
    pub base_ejection_time: Option<Duration>,
    pub max_ejection_percent: u32,
    /// Healthy-panic floor; 0 disables the data plane's 50% default.
    pub min_health_percent: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LoadBalancerSettings {
    Simple(SimpleLb),
    ConsistentHash(ConsistentHashLb),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleLb {
    #[default]
    RoundRobin,
    LeastConn,
    Random,
    Passthrough,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistentHashLb {
    /// 0 means unset; the data-plane default of 1024 applies.
    pub minimum_ring_size: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    #[default]
    Disable,
    Simple,
    Mutual,
    /// Mutual TLS with mesh-managed certificates and identities.
    MeshMutual,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    pub mode: TlsMode,
    pub client_certificate: String,
    pub private_key: String,
    pub ca_certificates: String,
    pub subject_alt_names: Vec<String>,
    pub sni: String,
}
