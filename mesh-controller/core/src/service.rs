use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The network endpoints live on when they don't declare one. A proxy's
/// network view must contain it explicitly for such endpoints to be visible.
pub const UNNAMED_NETWORK: &str = "";

/// Endpoint and subset selection labels. Ordered so that anything derived
/// from label iteration is stable across builds.
pub type Labels = BTreeMap<String, String>;

/// Fully qualified service hostname, unique within a mesh.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Hostname(pub String);

impl Hostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Hostname {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a service's endpoints are discovered and balanced.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The data plane is handed endpoints over the endpoint discovery stream.
    #[default]
    ClientSide,
    /// Endpoints are resolved by DNS and shipped inline.
    Dns,
    /// Connections are forwarded to the address the client dialed.
    Passthrough,
    /// DNS-resolved, balanced by the resolver rather than the client.
    DnsRoundRobin,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Http,
    Https,
    Http2,
    Grpc,
    Tcp,
    Tls,
    Udp,
    Redis,
    Mongo,
    Mysql,
    /// Unknown application protocol; subject to sniffing when enabled.
    #[default]
    Unsupported,
}

impl Protocol {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "https" => Self::Https,
            "http2" => Self::Http2,
            "grpc" | "grpc-web" => Self::Grpc,
            "tcp" => Self::Tcp,
            "tls" => Self::Tls,
            "udp" => Self::Udp,
            "redis" => Self::Redis,
            "mongo" => Self::Mongo,
            "mysql" => Self::Mysql,
            _ => Self::Unsupported,
        }
    }

    pub fn is_http2(self) -> bool {
        matches!(self, Self::Http2 | Self::Grpc)
    }

    pub fn is_unsupported(self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub name: String,
    pub protocol: Protocol,
}

impl Port {
    pub fn new(number: u16, name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            number,
            name: name.into(),
            protocol,
        }
    }
}

/// Which registry a service originated from. Short stat names are derived
/// differently for Kubernetes services.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRegistry {
    Kubernetes,
    #[default]
    External,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAttributes {
    pub name: String,
    pub namespace: String,
    pub registry: ServiceRegistry,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub hostname: Hostname,
    pub ports: Vec<Port>,
    pub resolution: Resolution,
    pub mesh_external: bool,
    pub attributes: ServiceAttributes,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    #[default]
    Tcp,
    Unix,
}

/// A single workload endpoint behind a service port.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub family: AddressFamily,
    pub address: String,
    /// Target port on the workload; may differ from the service port.
    pub port: u16,
    /// The service port this endpoint serves.
    pub service_port: Port,
    pub network: String,
    /// Slash-delimited `region/zone/subzone`; empty when unknown.
    pub locality: String,
    pub lb_weight: u32,
    pub uid: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceInstance {
    pub service: Arc<Service>,
    pub endpoint: NetworkEndpoint,
    pub labels: Labels,
    pub service_account: String,
    /// Whether the workload is ready to terminate mesh-mutual TLS.
    pub mtls_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parsing_is_case_insensitive() {
        assert_eq!(Protocol::parse("HTTP"), Protocol::Http);
        assert_eq!(Protocol::parse("gRPC"), Protocol::Grpc);
        assert_eq!(Protocol::parse("made-up"), Protocol::Unsupported);
    }

    #[test]
    fn http2_protocols() {
        assert!(Protocol::Http2.is_http2());
        assert!(Protocol::Grpc.is_http2());
        assert!(!Protocol::Http.is_http2());
        assert!(!Protocol::Tcp.is_http2());
    }
}
