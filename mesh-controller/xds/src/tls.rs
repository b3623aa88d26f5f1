use serde::Serialize;
use std::collections::BTreeMap;

/// SDS resource names for the workload certificate and the trust root.
pub const SDS_DEFAULT_RESOURCE_NAME: &str = "default";
pub const SDS_ROOT_RESOURCE_NAME: &str = "ROOTCA";

pub const TLS_SOCKET_NAME: &str = "tls";
pub const RAW_BUFFER_SOCKET_NAME: &str = "raw_buffer";

/// Endpoint metadata label marking readiness for mesh-mutual TLS; matched
/// by auto-negotiated transport-socket lists.
pub const MTLS_READY_LABEL: &str = "tlsReady";

pub const ALPN_H2_ONLY: &[&str] = &["h2"];
pub const ALPN_IN_MESH: &[&str] = &["mesh"];
pub const ALPN_IN_MESH_H2: &[&str] = &["mesh", "h2"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Filename(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CertificateValidationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_ca: Option<DataSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verify_subject_alt_name: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TlsCertificate {
    pub certificate_chain: DataSource,
    pub private_key: DataSource,
}

/// Reference to a secret fetched over the secret-discovery socket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SdsSecretConfig {
    pub name: String,
    pub sds_uds_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationContextType {
    ValidationContext(CertificateValidationContext),
    CombinedValidationContext {
        default_validation_context: CertificateValidationContext,
        validation_context_sds_secret_config: SdsSecretConfig,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommonTlsContext {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls_certificates: Vec<TlsCertificate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls_certificate_sds_secret_configs: Vec<SdsSecretConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_context_type: Option<ValidationContextType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn_protocols: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamTlsContext {
    pub common_tls_context: CommonTlsContext,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sni: String,
}

/// A concrete transport socket. The TLS configuration is packaged as an
/// opaque typed config the way the data plane consumes it; packaging can
/// fail and the cluster then falls open to plaintext.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransportSocket {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typed_config: Option<serde_json::Value>,
}

/// One entry of a cluster's ordered transport-socket match list, keyed on
/// endpoint metadata labels. An empty match is a catch-all.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransportSocketMatch {
    pub name: String,
    #[serde(rename = "match")]
    pub match_labels: BTreeMap<String, String>,
    pub transport_socket: TransportSocket,
}
