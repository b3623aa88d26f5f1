use crate::duration::ConfigDuration;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One document of the declarative configuration stream, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum Document {
    Service(ServiceDoc),
    ServiceEntry(ServiceEntryDoc),
    VirtualService(VirtualServiceDoc),
    DestinationRule(DestinationRuleDoc),
    Sidecar(SidecarDoc),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_version: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDoc {
    pub metadata: Metadata,
    pub spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub hostname: String,
    #[serde(default)]
    pub resolution: ResolutionSpec,
    #[serde(default)]
    pub mesh_external: bool,
    #[serde(default)]
    pub registry: RegistrySpec,
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
    #[serde(default)]
    pub service_accounts: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum ResolutionSpec {
    #[default]
    ClientSide,
    Dns,
    Passthrough,
    DnsRoundRobin,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum RegistrySpec {
    Kubernetes,
    #[default]
    External,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub number: u16,
    pub name: String,
    /// Explicit protocol; otherwise derived from the port-name prefix.
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub address: String,
    /// Service-port name to workload target port; a missing entry targets
    /// the service port number itself.
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub tls_ready: bool,
}

#[derive(Debug, Deserialize)]
pub struct ServiceEntryDoc {
    pub metadata: Metadata,
    pub spec: ServiceEntrySpec,
}

/// Declares hosts living outside the registry, mesh-external by default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntrySpec {
    pub hosts: Vec<String>,
    pub ports: Vec<PortSpec>,
    #[serde(default = "default_entry_resolution")]
    pub resolution: ResolutionSpec,
    #[serde(default)]
    pub location: LocationSpec,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
    #[serde(default)]
    pub service_accounts: Vec<String>,
}

fn default_entry_resolution() -> ResolutionSpec {
    ResolutionSpec::Dns
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum LocationSpec {
    #[default]
    MeshExternal,
    MeshInternal,
}

#[derive(Debug, Deserialize)]
pub struct VirtualServiceDoc {
    pub metadata: Metadata,
    pub spec: VirtualServiceSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    pub hosts: Vec<String>,
    #[serde(default)]
    pub http: Vec<RouteSpec>,
    #[serde(default)]
    pub tcp: Vec<RouteSpec>,
}

#[derive(Debug, Deserialize)]
pub struct RouteSpec {
    #[serde(default)]
    pub route: Vec<RouteDestinationSpec>,
}

#[derive(Debug, Deserialize)]
pub struct RouteDestinationSpec {
    pub destination: DestinationSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSpec {
    pub host: String,
    #[serde(default)]
    pub subset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DestinationRuleDoc {
    pub metadata: Metadata,
    pub spec: DestinationRuleSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRuleSpec {
    pub host: String,
    #[serde(default)]
    pub traffic_policy: Option<TrafficPolicySpec>,
    #[serde(default)]
    pub subsets: Vec<SubsetSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetSpec {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub traffic_policy: Option<TrafficPolicySpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPolicySpec {
    #[serde(default)]
    pub connection_pool: Option<ConnectionPoolSpec>,
    #[serde(default)]
    pub outlier_detection: Option<OutlierDetectionSpec>,
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSpec>,
    #[serde(default)]
    pub tls: Option<TlsSpec>,
    #[serde(default)]
    pub port_level_settings: Vec<PortTrafficPolicySpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortTrafficPolicySpec {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub connection_pool: Option<ConnectionPoolSpec>,
    #[serde(default)]
    pub outlier_detection: Option<OutlierDetectionSpec>,
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSpec>,
    #[serde(default)]
    pub tls: Option<TlsSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoolSpec {
    #[serde(default)]
    pub tcp: Option<TcpSettingsSpec>,
    #[serde(default)]
    pub http: Option<HttpSettingsSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpSettingsSpec {
    #[serde(default)]
    pub max_connections: u32,
    #[serde(default)]
    pub connect_timeout: Option<ConfigDuration>,
    #[serde(default)]
    pub tcp_keepalive: Option<TcpKeepaliveSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpKeepaliveSpec {
    #[serde(default)]
    pub probes: u32,
    #[serde(default)]
    pub time: Option<ConfigDuration>,
    #[serde(default)]
    pub interval: Option<ConfigDuration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSettingsSpec {
    #[serde(default)]
    pub http1_max_pending_requests: u32,
    #[serde(default)]
    pub http2_max_requests: u32,
    #[serde(default)]
    pub max_requests_per_connection: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub idle_timeout: Option<ConfigDuration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierDetectionSpec {
    #[serde(default)]
    pub consecutive_errors: u32,
    #[serde(default)]
    pub interval: Option<ConfigDuration>,
    #[serde(default)]
    pub base_ejection_time: Option<ConfigDuration>,
    #[serde(default)]
    pub max_ejection_percent: u32,
    #[serde(default)]
    pub min_health_percent: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadBalancerSpec {
    Simple(SimpleLbSpec),
    ConsistentHash(ConsistentHashSpec),
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimpleLbSpec {
    RoundRobin,
    LeastConn,
    Random,
    Passthrough,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistentHashSpec {
    #[serde(default)]
    pub minimum_ring_size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    pub mode: TlsModeSpec,
    #[serde(default)]
    pub client_certificate: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub ca_certificates: String,
    #[serde(default)]
    pub subject_alt_names: Vec<String>,
    #[serde(default)]
    pub sni: String,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsModeSpec {
    #[default]
    Disable,
    Simple,
    Mutual,
    MeshMutual,
}

#[derive(Debug, Deserialize)]
pub struct SidecarDoc {
    pub metadata: Metadata,
    pub spec: SidecarSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    /// Hostnames visible to proxies using this scope; omitted leaves the
    /// view unrestricted.
    #[serde(default)]
    pub services: Option<Vec<String>>,
    #[serde(default)]
    pub ingress: Vec<IngressListenerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressListenerSpec {
    pub port: PortSpec,
    pub default_endpoint: String,
}
