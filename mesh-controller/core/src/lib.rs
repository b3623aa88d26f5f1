#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod context;
mod mesh;
mod proxy;
mod registry;
mod service;
mod traffic_policy;

pub use self::context::{Environment, EventKind, PushContext, PushEvent, ServiceDiscovery};
pub use self::mesh::{
    Features, LocalityDistribute, LocalityFailover, LocalityLbSetting, MeshConfig,
};
pub use self::proxy::{
    IngressListener, InterceptionMode, Locality, Proxy, ProxyMetadata, ProxyType, RouterMode,
    SidecarScope,
};
pub use self::registry::MemRegistry;
pub use self::service::{
    AddressFamily, Hostname, Labels, NetworkEndpoint, Port, Protocol, Resolution, Service,
    ServiceAttributes, ServiceInstance, ServiceRegistry, UNNAMED_NETWORK,
};
pub use self::traffic_policy::{
    ConfigMeta, ConnectionPool, ConsistentHashLb, DestinationRule, DestinationRuleConfig,
    HttpSettings, LoadBalancerSettings, OutlierDetection, PortTrafficPolicy, SimpleLb, Subset,
    TcpKeepalive, TcpSettings, TlsMode, TlsSettings, TrafficPolicy,
};
