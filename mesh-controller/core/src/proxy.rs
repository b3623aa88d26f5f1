use super::service::{Hostname, Port, UNNAMED_NETWORK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyType {
    #[default]
    Sidecar,
    /// An edge gateway routing traffic into or out of the mesh.
    Router,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterMode {
    #[default]
    Standard,
    /// The gateway forwards TLS by SNI without terminating it.
    SniDnat,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterceptionMode {
    #[default]
    Redirect,
    Tproxy,
    None,
}

/// Hierarchical placement of a proxy or endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub region: String,
    pub zone: String,
    pub sub_zone: String,
}

impl Locality {
    /// Parses a slash-delimited `region/zone/subzone` string; missing
    /// segments are left empty.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.splitn(3, '/');
        Self {
            region: parts.next().unwrap_or_default().to_string(),
            zone: parts.next().unwrap_or_default().to_string(),
            sub_zone: parts.next().unwrap_or_default().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty() && self.zone.is_empty() && self.sub_zone.is_empty()
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.zone, self.sub_zone)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyMetadata {
    /// Overrides for the fixed client key-material paths.
    pub tls_client_cert_chain: Option<String>,
    pub tls_client_key: Option<String>,
    pub tls_client_root_cert: Option<String>,
    pub router_mode: RouterMode,
    /// Data-plane version hint; informational.
    pub version: Option<String>,
}

/// A user-declared ingress listener in a sidecar scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressListener {
    pub port: Port,
    /// `host:port`, `:port`, or a `unix://` socket path.
    pub default_endpoint: String,
}

/// Proxy-local filter limiting which services and ingress listeners apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarScope {
    pub name: String,
    pub namespace: String,
    /// Hostnames visible to the proxy; `None` leaves the view unrestricted.
    pub services: Option<Vec<Hostname>>,
    pub ingress: Vec<IngressListener>,
}

impl SidecarScope {
    pub fn has_ingress_listeners(&self) -> bool {
        !self.ingress.is_empty()
    }
}

/// Identity of a data-plane instance requesting configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub id: String,
    pub proxy_type: ProxyType,
    pub ip_addresses: Vec<IpAddr>,
    pub locality: Locality,
    pub interception_mode: InterceptionMode,
    pub sidecar_scope: Option<SidecarScope>,
    pub metadata: ProxyMetadata,
    /// Names of networks whose endpoints this proxy may see.
    pub network_view: BTreeSet<String>,
}

impl Default for Proxy {
    fn default() -> Self {
        Self {
            id: String::new(),
            proxy_type: ProxyType::default(),
            ip_addresses: Vec::new(),
            locality: Locality::default(),
            interception_mode: InterceptionMode::default(),
            sidecar_scope: None,
            metadata: ProxyMetadata::default(),
            network_view: Self::default_network_view(),
        }
    }
}

impl Proxy {
    /// The default view contains only the unnamed network.
    pub fn default_network_view() -> BTreeSet<String> {
        BTreeSet::from([UNNAMED_NETWORK.to_string()])
    }

    pub fn router_mode(&self) -> RouterMode {
        self.metadata.router_mode
    }

    pub fn supports_ipv4(&self) -> bool {
        self.ip_addresses.iter().any(|ip| ip.is_ipv4())
    }

    pub fn supports_ipv6(&self) -> bool {
        self.ip_addresses.iter().any(|ip| ip.is_ipv6())
    }

    /// Loopback address for this proxy's preferred IP family.
    pub fn local_host(&self) -> &'static str {
        if self.supports_ipv4() || self.ip_addresses.is_empty() {
            "127.0.0.1"
        } else {
            "::1"
        }
    }
}

impl FromStr for ProxyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sidecar" => Ok(Self::Sidecar),
            "router" => Ok(Self::Router),
            s => Err(format!("invalid proxy type: {s}")),
        }
    }
}

impl FromStr for RouterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "sni-dnat" => Ok(Self::SniDnat),
            s => Err(format!("invalid router mode: {s}")),
        }
    }
}

impl FromStr for InterceptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redirect" => Ok(Self::Redirect),
            "tproxy" => Ok(Self::Tproxy),
            "none" => Ok(Self::None),
            s => Err(format!("invalid interception mode: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locality_parses_partial_strings() {
        let l = Locality::parse("us-east/zone-1");
        assert_eq!(l.region, "us-east");
        assert_eq!(l.zone, "zone-1");
        assert_eq!(l.sub_zone, "");
        assert!(Locality::parse("").is_empty());
    }

    #[test]
    fn local_host_follows_ip_family() {
        let mut proxy = Proxy {
            ip_addresses: vec!["10.0.0.1".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(proxy.local_host(), "127.0.0.1");

        proxy.ip_addresses = vec!["2001:db8::2".parse().unwrap()];
        assert_eq!(proxy.local_host(), "::1");
    }
}
