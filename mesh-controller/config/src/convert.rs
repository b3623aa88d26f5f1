use crate::docs::{
    ConnectionPoolSpec, Document, EndpointSpec, LoadBalancerSpec, LocationSpec, Metadata,
    OutlierDetectionSpec, PortSpec, RegistrySpec, ResolutionSpec, SimpleLbSpec, TlsModeSpec,
    TlsSpec, TrafficPolicySpec,
};
use ahash::AHashMap as HashMap;
use mesh_controller_core::{
    ConfigMeta, ConnectionPool, ConsistentHashLb, DestinationRule, DestinationRuleConfig,
    Hostname, HttpSettings, IngressListener, LoadBalancerSettings, MemRegistry, NetworkEndpoint,
    OutlierDetection, Port, PortTrafficPolicy, Protocol, PushContext, Resolution, Service,
    ServiceAttributes, ServiceInstance, ServiceRegistry, SidecarScope, SimpleLb, Subset,
    TcpKeepalive, TcpSettings, TlsMode, TlsSettings, TrafficPolicy,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("virtual service {virtual_service} routes to unknown host {host}")]
    UnknownRouteDestination {
        virtual_service: String,
        host: String,
    },

    #[error("duplicate destination rule for host {host}")]
    DuplicateDestinationRule { host: String },
}

/// Everything a configuration stream yields: the endpoint registry, the
/// per-push service tables, and the declared sidecar scopes.
#[derive(Debug)]
pub struct ConfigSet {
    pub registry: MemRegistry,
    pub services: Vec<Arc<Service>>,
    pub destination_rules: HashMap<Hostname, Arc<DestinationRuleConfig>>,
    pub service_accounts: HashMap<(Hostname, u16), Vec<String>>,
    pub sidecar_scopes: Vec<SidecarScope>,
}

impl ConfigSet {
    pub fn push_context(&self) -> PushContext {
        PushContext::new(
            self.services.clone(),
            self.destination_rules.clone(),
            self.service_accounts.clone(),
        )
    }

    pub fn sidecar_scope(&self, name: &str, namespace: &str) -> Option<&SidecarScope> {
        self.sidecar_scopes
            .iter()
            .find(|s| s.name == name && s.namespace == namespace)
    }
}

/// Parses a multi-document YAML stream and validates cross-references.
pub fn load(input: &str) -> Result<ConfigSet, ConfigError> {
    let mut documents = Vec::new();
    for deserializer in serde_yaml::Deserializer::from_str(input) {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if value.is_null() {
            continue;
        }
        documents.push(serde_yaml::from_value::<Document>(value)?);
    }

    let mut registry = MemRegistry::new();
    let mut services = Vec::new();
    let mut service_accounts = HashMap::default();
    let mut destination_rules: HashMap<Hostname, Arc<DestinationRuleConfig>> = HashMap::default();
    let mut sidecar_scopes = Vec::new();

    for document in &documents {
        match document {
            Document::Service(doc) => {
                let service = Arc::new(Service {
                    hostname: doc.spec.hostname.as_str().into(),
                    ports: doc.spec.ports.iter().map(convert_port).collect(),
                    resolution: convert_resolution(doc.spec.resolution),
                    mesh_external: doc.spec.mesh_external,
                    attributes: ServiceAttributes {
                        name: doc.metadata.name.clone(),
                        namespace: doc.metadata.namespace.clone(),
                        registry: match doc.spec.registry {
                            RegistrySpec::Kubernetes => ServiceRegistry::Kubernetes,
                            RegistrySpec::External => ServiceRegistry::External,
                        },
                    },
                });
                register_instances(&mut registry, &service, &doc.spec.endpoints);
                record_accounts(&mut service_accounts, &service, &doc.spec.service_accounts);
                services.push(service);
            }
            Document::ServiceEntry(doc) => {
                for host in &doc.spec.hosts {
                    let service = Arc::new(Service {
                        hostname: host.as_str().into(),
                        ports: doc.spec.ports.iter().map(convert_port).collect(),
                        resolution: convert_resolution(doc.spec.resolution),
                        mesh_external: doc.spec.location == LocationSpec::MeshExternal,
                        attributes: ServiceAttributes {
                            name: doc.metadata.name.clone(),
                            namespace: doc.metadata.namespace.clone(),
                            registry: ServiceRegistry::External,
                        },
                    });
                    register_instances(&mut registry, &service, &doc.spec.endpoints);
                    record_accounts(&mut service_accounts, &service, &doc.spec.service_accounts);
                    services.push(service);
                }
            }
            Document::DestinationRule(doc) => {
                let host = Hostname::from(doc.spec.host.as_str());
                if destination_rules.contains_key(&host) {
                    return Err(ConfigError::DuplicateDestinationRule {
                        host: doc.spec.host.clone(),
                    });
                }
                destination_rules.insert(
                    host.clone(),
                    Arc::new(DestinationRuleConfig {
                        meta: convert_meta(&doc.metadata),
                        rule: DestinationRule {
                            host,
                            traffic_policy: doc
                                .spec
                                .traffic_policy
                                .as_ref()
                                .map(convert_traffic_policy),
                            subsets: doc
                                .spec
                                .subsets
                                .iter()
                                .map(|s| Subset {
                                    name: s.name.clone(),
                                    labels: s.labels.clone(),
                                    traffic_policy: s
                                        .traffic_policy
                                        .as_ref()
                                        .map(convert_traffic_policy),
                                })
                                .collect(),
                        },
                    }),
                );
            }
            Document::Sidecar(doc) => {
                sidecar_scopes.push(SidecarScope {
                    name: doc.metadata.name.clone(),
                    namespace: doc.metadata.namespace.clone(),
                    services: doc
                        .spec
                        .services
                        .as_ref()
                        .map(|hosts| hosts.iter().map(|h| h.as_str().into()).collect()),
                    ingress: doc
                        .spec
                        .ingress
                        .iter()
                        .map(|l| IngressListener {
                            port: convert_port(&l.port),
                            default_endpoint: l.default_endpoint.clone(),
                        })
                        .collect(),
                });
            }
            Document::VirtualService(_) => {}
        }
    }

    // Route destinations must point at a declared service or service-entry
    // host; both are accepted in fully qualified DNS form.
    let known_hosts: BTreeSet<&str> = services
        .iter()
        .map(|s| s.hostname.as_str())
        .collect();
    for document in &documents {
        if let Document::VirtualService(doc) = document {
            for route in doc.spec.http.iter().chain(doc.spec.tcp.iter()) {
                for destination in &route.route {
                    if !known_hosts.contains(destination.destination.host.as_str()) {
                        return Err(ConfigError::UnknownRouteDestination {
                            virtual_service: doc.metadata.name.clone(),
                            host: destination.destination.host.clone(),
                        });
                    }
                }
            }
        }
    }

    tracing::debug!(
        services = services.len(),
        destination_rules = destination_rules.len(),
        sidecar_scopes = sidecar_scopes.len(),
        "loaded configuration stream",
    );

    Ok(ConfigSet {
        registry,
        services,
        destination_rules,
        service_accounts,
        sidecar_scopes,
    })
}

fn convert_meta(metadata: &Metadata) -> ConfigMeta {
    ConfigMeta {
        name: metadata.name.clone(),
        namespace: metadata.namespace.clone(),
        resource_version: metadata.resource_version.clone(),
    }
}

fn convert_port(spec: &PortSpec) -> Port {
    let protocol = match &spec.protocol {
        Some(protocol) => Protocol::parse(protocol),
        // Derive from the port-name prefix: `http-web` speaks HTTP.
        None => Protocol::parse(spec.name.split('-').next().unwrap_or_default()),
    };
    Port::new(spec.number, spec.name.clone(), protocol)
}

fn convert_resolution(spec: ResolutionSpec) -> Resolution {
    match spec {
        ResolutionSpec::ClientSide => Resolution::ClientSide,
        ResolutionSpec::Dns => Resolution::Dns,
        ResolutionSpec::Passthrough => Resolution::Passthrough,
        ResolutionSpec::DnsRoundRobin => Resolution::DnsRoundRobin,
    }
}

fn register_instances(
    registry: &mut MemRegistry,
    service: &Arc<Service>,
    endpoints: &[EndpointSpec],
) {
    for endpoint in endpoints {
        for port in &service.ports {
            let target_port = endpoint
                .ports
                .get(&port.name)
                .copied()
                .unwrap_or(port.number);
            registry.add_instance(ServiceInstance {
                service: service.clone(),
                endpoint: NetworkEndpoint {
                    address: endpoint.address.clone(),
                    port: target_port,
                    service_port: port.clone(),
                    network: endpoint.network.clone(),
                    locality: endpoint.locality.clone(),
                    lb_weight: endpoint.weight,
                    uid: endpoint.uid.clone(),
                    ..Default::default()
                },
                labels: endpoint.labels.clone(),
                service_account: endpoint.service_account.clone(),
                mtls_ready: endpoint.tls_ready,
            });
        }
    }
}

fn record_accounts(
    accounts: &mut HashMap<(Hostname, u16), Vec<String>>,
    service: &Arc<Service>,
    service_accounts: &[String],
) {
    if service_accounts.is_empty() {
        return;
    }
    for port in &service.ports {
        accounts.insert(
            (service.hostname.clone(), port.number),
            service_accounts.to_vec(),
        );
    }
}

fn convert_traffic_policy(spec: &TrafficPolicySpec) -> TrafficPolicy {
    TrafficPolicy {
        connection_pool: spec.connection_pool.as_ref().map(convert_connection_pool),
        outlier_detection: spec.outlier_detection.as_ref().map(convert_outlier),
        load_balancer: spec.load_balancer.as_ref().map(convert_load_balancer),
        tls: spec.tls.as_ref().map(convert_tls),
        port_level_settings: spec
            .port_level_settings
            .iter()
            .map(|p| PortTrafficPolicy {
                port: p.port,
                connection_pool: p.connection_pool.as_ref().map(convert_connection_pool),
                outlier_detection: p.outlier_detection.as_ref().map(convert_outlier),
                load_balancer: p.load_balancer.as_ref().map(convert_load_balancer),
                tls: p.tls.as_ref().map(convert_tls),
            })
            .collect(),
    }
}

fn convert_connection_pool(spec: &ConnectionPoolSpec) -> ConnectionPool {
    ConnectionPool {
        tcp: spec.tcp.as_ref().map(|tcp| TcpSettings {
            max_connections: tcp.max_connections,
            connect_timeout: tcp.connect_timeout.map(Into::into),
            tcp_keepalive: tcp.tcp_keepalive.as_ref().map(|ka| TcpKeepalive {
                probes: ka.probes,
                time: ka.time.map(Into::into),
                interval: ka.interval.map(Into::into),
            }),
        }),
        http: spec.http.as_ref().map(|http| HttpSettings {
            http1_max_pending_requests: http.http1_max_pending_requests,
            http2_max_requests: http.http2_max_requests,
            max_requests_per_connection: http.max_requests_per_connection,
            max_retries: http.max_retries,
            idle_timeout: http.idle_timeout.map(Into::into),
        }),
    }
}

fn convert_outlier(spec: &OutlierDetectionSpec) -> OutlierDetection {
    OutlierDetection {
        consecutive_errors: spec.consecutive_errors,
        interval: spec.interval.map(Into::into),
        base_ejection_time: spec.base_ejection_time.map(Into::into),
        max_ejection_percent: spec.max_ejection_percent,
        min_health_percent: spec.min_health_percent,
    }
}

fn convert_load_balancer(spec: &LoadBalancerSpec) -> LoadBalancerSettings {
    match spec {
        LoadBalancerSpec::Simple(simple) => LoadBalancerSettings::Simple(match simple {
            SimpleLbSpec::RoundRobin => SimpleLb::RoundRobin,
            SimpleLbSpec::LeastConn => SimpleLb::LeastConn,
            SimpleLbSpec::Random => SimpleLb::Random,
            SimpleLbSpec::Passthrough => SimpleLb::Passthrough,
        }),
        LoadBalancerSpec::ConsistentHash(hash) => {
            LoadBalancerSettings::ConsistentHash(ConsistentHashLb {
                minimum_ring_size: hash.minimum_ring_size,
            })
        }
    }
}

fn convert_tls(spec: &TlsSpec) -> TlsSettings {
    TlsSettings {
        mode: match spec.mode {
            TlsModeSpec::Disable => TlsMode::Disable,
            TlsModeSpec::Simple => TlsMode::Simple,
            TlsModeSpec::Mutual => TlsMode::Mutual,
            TlsModeSpec::MeshMutual => TlsMode::MeshMutual,
        },
        client_certificate: spec.client_certificate.clone(),
        private_key: spec.private_key.clone(),
        ca_certificates: spec.ca_certificates.clone(),
        subject_alt_names: spec.subject_alt_names.clone(),
        sni: spec.sni.clone(),
    }
}
