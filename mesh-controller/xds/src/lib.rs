#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Wire-level upstream configuration served to data-plane proxies. The
//! shapes here are an external contract: the data plane validates them, and
//! cluster names must be produced byte-identically.

mod cluster;
mod endpoint;
mod name;
mod tls;

pub use self::cluster::{
    CircuitBreakers, Cluster, CommonLbConfig, ConfigSource, ConfigSourceSpecifier, DiscoveryType,
    DnsLookupFamily, EdsClusterConfig, Http2ProtocolOptions, HttpProtocolOptions, LbConfig,
    LbPolicy, Lineage, OutlierDetection, ProtocolSelection, TcpKeepalive, Thresholds,
    UpstreamConnectionOptions,
};
pub use self::endpoint::{
    Address, BindConfig, ClusterLoadAssignment, LbEndpoint, Locality, LocalityLbEndpoints,
    SocketAddress,
};
pub use self::name::{
    build_dns_srv_subset_key, build_subset_key, TrafficDirection, BLACK_HOLE_CLUSTER,
    INBOUND_PASSTHROUGH_BIND_IPV4, INBOUND_PASSTHROUGH_BIND_IPV6,
    INBOUND_PASSTHROUGH_CLUSTER_IPV4, INBOUND_PASSTHROUGH_CLUSTER_IPV6, PASSTHROUGH_CLUSTER,
};
pub use self::tls::{
    CertificateValidationContext, CommonTlsContext, DataSource, SdsSecretConfig, TlsCertificate,
    TransportSocket, TransportSocketMatch, UpstreamTlsContext, ValidationContextType,
    ALPN_H2_ONLY, ALPN_IN_MESH, ALPN_IN_MESH_H2, MTLS_READY_LABEL, RAW_BUFFER_SOCKET_NAME,
    SDS_DEFAULT_RESOURCE_NAME, SDS_ROOT_RESOURCE_NAME, TLS_SOCKET_NAME,
};
