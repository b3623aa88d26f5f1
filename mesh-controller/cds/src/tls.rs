use mesh_controller_core::{Environment, Proxy, TlsMode, TlsSettings};
use mesh_controller_xds as xds;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Fixed fallback paths for workload key material; proxy metadata may
/// override each of them.
const DEFAULT_ROOT_CERT: &str = "/etc/certs/root-cert.pem";
const DEFAULT_CERT_CHAIN: &str = "/etc/certs/cert-chain.pem";
const DEFAULT_KEY: &str = "/etc/certs/key.pem";

/// Whether the TLS context came from user configuration or was synthesized
/// by auto-mTLS. Only auto-detected contexts are packaged as per-endpoint
/// transport-socket matches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum TlsContextOrigin {
    UserSupplied,
    AutoDetected,
}

/// Fills key and certificate material for mesh-mutual intents. An absent
/// intent is promoted to mesh-mutual when auto-mTLS is enabled and the
/// service lives inside the mesh.
pub(crate) fn resolve_upstream_tls<'a>(
    tls: Option<&'a TlsSettings>,
    service_accounts: &[String],
    sni: &str,
    proxy: &Proxy,
    auto_mtls_enabled: bool,
    mesh_external: bool,
) -> (Option<Cow<'a, TlsSettings>>, TlsContextOrigin) {
    let mut origin = TlsContextOrigin::UserSupplied;
    let tls = match tls {
        Some(tls) => Cow::Borrowed(tls),
        None => {
            if mesh_external || !auto_mtls_enabled {
                return (None, origin);
            }
            origin = TlsContextOrigin::AutoDetected;
            Cow::Owned(TlsSettings {
                mode: TlsMode::MeshMutual,
                ..Default::default()
            })
        }
    };

    if tls.mode == TlsMode::MeshMutual {
        // A user-specified SNI wins; it matters when routing via gateways.
        let sni = if tls.sni.is_empty() {
            sni.to_string()
        } else {
            tls.sni.clone()
        };
        let subject_alt_names = if tls.subject_alt_names.is_empty() {
            service_accounts.to_vec()
        } else {
            tls.subject_alt_names.clone()
        };
        return (
            Some(Cow::Owned(build_mesh_mutual_tls(
                subject_alt_names,
                sni,
                proxy,
            ))),
            origin,
        );
    }

    (Some(tls), origin)
}

fn build_mesh_mutual_tls(subject_alt_names: Vec<String>, sni: String, proxy: &Proxy) -> TlsSettings {
    TlsSettings {
        mode: TlsMode::MeshMutual,
        ca_certificates: path_or_default(&proxy.metadata.tls_client_root_cert, DEFAULT_ROOT_CERT),
        client_certificate: path_or_default(
            &proxy.metadata.tls_client_cert_chain,
            DEFAULT_CERT_CHAIN,
        ),
        private_key: path_or_default(&proxy.metadata.tls_client_key, DEFAULT_KEY),
        subject_alt_names,
        sni,
    }
}

fn path_or_default(path: &Option<String>, default: &str) -> String {
    path.as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Materializes the resolved TLS intent onto the cluster. Each application
/// is wholesale: it owns both the TLS context and the transport-socket
/// match list, so a later application (a subset policy) lands on the final
/// state.
pub(crate) fn apply_upstream_tls(
    env: &Environment,
    cluster: &mut xds::Cluster,
    tls: Option<&TlsSettings>,
    origin: TlsContextOrigin,
    proxy: &Proxy,
) {
    let Some(tls) = tls else { return };

    let mut trusted_ca = None;
    if !tls.ca_certificates.is_empty() {
        trusted_ca = Some(xds::DataSource::Filename(path_or_default(
            &proxy.metadata.tls_client_root_cert,
            &tls.ca_certificates,
        )));
    }
    let validation = xds::CertificateValidationContext {
        trusted_ca,
        verify_subject_alt_name: tls.subject_alt_names.clone(),
    };

    match tls.mode {
        TlsMode::Disable => {
            cluster.tls_context = None;
            cluster.transport_socket_matches.clear();
        }
        TlsMode::Simple => {
            let mut common = xds::CommonTlsContext {
                validation_context_type: Some(xds::ValidationContextType::ValidationContext(
                    validation,
                )),
                ..Default::default()
            };
            if cluster.http2_protocol_options.is_some() {
                common.alpn_protocols = alpn(xds::ALPN_H2_ONLY);
            }
            cluster.tls_context = Some(xds::UpstreamTlsContext {
                common_tls_context: common,
                sni: tls.sni.clone(),
            });
            cluster.transport_socket_matches.clear();
        }
        TlsMode::Mutual | TlsMode::MeshMutual => {
            if tls.client_certificate.is_empty() || tls.private_key.is_empty() {
                tracing::error!(
                    cluster = %cluster.name,
                    "failed to apply TLS setting: client certificate and private key must not be empty",
                );
                return;
            }

            let mut common = xds::CommonTlsContext::default();
            if env.mesh.sds_uds_path.is_empty() || tls.mode == TlsMode::Mutual {
                // File-mounted secrets: inline the certificate, key, and
                // validation context as file references.
                common.validation_context_type =
                    Some(xds::ValidationContextType::ValidationContext(validation));
                common.tls_certificates = vec![xds::TlsCertificate {
                    certificate_chain: xds::DataSource::Filename(path_or_default(
                        &proxy.metadata.tls_client_cert_chain,
                        &tls.client_certificate,
                    )),
                    private_key: xds::DataSource::Filename(path_or_default(
                        &proxy.metadata.tls_client_key,
                        &tls.private_key,
                    )),
                }];
            } else {
                common.tls_certificate_sds_secret_configs.push(xds::SdsSecretConfig {
                    name: xds::SDS_DEFAULT_RESOURCE_NAME.to_string(),
                    sds_uds_path: env.mesh.sds_uds_path.clone(),
                });
                common.validation_context_type =
                    Some(xds::ValidationContextType::CombinedValidationContext {
                        default_validation_context: xds::CertificateValidationContext {
                            trusted_ca: None,
                            verify_subject_alt_name: tls.subject_alt_names.clone(),
                        },
                        validation_context_sds_secret_config: xds::SdsSecretConfig {
                            name: xds::SDS_ROOT_RESOURCE_NAME.to_string(),
                            sds_uds_path: env.mesh.sds_uds_path.clone(),
                        },
                    });
            }

            let mut sni = tls.sni.clone();
            if sni.is_empty() && tls.mode == TlsMode::MeshMutual {
                sni = cluster.name.clone();
            }

            if cluster.http2_protocol_options.is_some() {
                common.alpn_protocols = if tls.mode == TlsMode::MeshMutual {
                    alpn(xds::ALPN_IN_MESH_H2)
                } else {
                    alpn(xds::ALPN_H2_ONLY)
                };
            } else if tls.mode == TlsMode::MeshMutual {
                common.alpn_protocols = alpn(xds::ALPN_IN_MESH);
            }

            cluster.tls_context = Some(xds::UpstreamTlsContext {
                common_tls_context: common,
                sni,
            });
            cluster.transport_socket_matches.clear();
        }
    }

    // An auto-negotiated context is not attached directly: it becomes the
    // first entry of a match list keyed on endpoint mTLS readiness, with a
    // plaintext catch-all behind it, so the data plane can choose per
    // endpoint.
    if tls.mode == TlsMode::MeshMutual && origin == TlsContextOrigin::AutoDetected {
        let Some(context) = cluster.tls_context.take() else {
            return;
        };
        let typed_config = match serde_json::to_value(&context) {
            Ok(value) => value,
            Err(error) => {
                // Fail open to plaintext rather than dropping the cluster.
                tracing::error!(
                    cluster = %cluster.name,
                    %error,
                    "failed to package TLS context into a transport socket match",
                );
                return;
            }
        };
        cluster.transport_socket_matches = vec![
            xds::TransportSocketMatch {
                name: "mtls".to_string(),
                match_labels: BTreeMap::from([(
                    xds::MTLS_READY_LABEL.to_string(),
                    "true".to_string(),
                )]),
                transport_socket: xds::TransportSocket {
                    name: xds::TLS_SOCKET_NAME.to_string(),
                    typed_config: Some(typed_config),
                },
            },
            plaintext_transport_socket_match(),
        ];
    }
}

fn plaintext_transport_socket_match() -> xds::TransportSocketMatch {
    xds::TransportSocketMatch {
        name: "plaintext".to_string(),
        match_labels: BTreeMap::new(),
        transport_socket: xds::TransportSocket {
            name: xds::RAW_BUFFER_SOCKET_NAME.to_string(),
            typed_config: None,
        },
    }
}

fn alpn(protocols: &[&str]) -> Vec<String> {
    protocols.iter().map(|p| p.to_string()).collect()
}
