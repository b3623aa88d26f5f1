use crate::endpoints::{build_inbound_locality_lb_endpoints, UNIX_ADDRESS_PREFIX};
use crate::factory::{self, MANAGEMENT_CLUSTER_HOSTNAME};
use crate::observer::ObserverContext;
use crate::policy;
use crate::sinks;
use crate::ClusterBuilder;
use ahash::AHashSet;
use mesh_controller_core::{
    AddressFamily, Environment, Hostname, IngressListener, InterceptionMode, NetworkEndpoint,
    Port, Proxy, PushContext, Service, ServiceAttributes, ServiceInstance, SidecarScope,
};
use mesh_controller_xds as xds;
use std::sync::Arc;
use xds::TrafficDirection;

impl ClusterBuilder {
    /// Inbound clusters for a sidecar. With user-declared ingress listeners
    /// the clusters come from their `defaultEndpoint` fields; otherwise one
    /// cluster per local service port, plus management ports.
    pub(crate) fn build_inbound_clusters(
        &self,
        env: &Environment,
        proxy: &Proxy,
        push: &PushContext,
        instances: &[ServiceInstance],
        management_ports: &[Port],
    ) -> Vec<xds::Cluster> {
        let mut clusters = Vec::new();
        let local_host = proxy.local_host();
        let scope = proxy.sidecar_scope.as_ref();

        if !scope.is_some_and(SidecarScope::has_ingress_listeners) {
            // Without declared ingress listeners, interception NONE means no
            // implicit inbound listeners: workloads would end up listening
            // on the same ports they serve.
            if proxy.interception_mode == InterceptionMode::None {
                return clusters;
            }

            // Same-port instances would only be dropped as duplicates
            // during normalization; skip them here.
            let mut have: AHashSet<(Hostname, u16)> = AHashSet::new();
            for instance in instances {
                let key = (
                    instance.service.hostname.clone(),
                    instance.endpoint.service_port.number,
                );
                if !have.insert(key) {
                    continue;
                }
                clusters.push(
                    self.build_inbound_cluster_for_port_or_uds(env, proxy, push, instance, local_host),
                );
            }

            // Health-check traffic to management ports gets its own
            // clusters against the loopback.
            for port in management_ports {
                let name = xds::build_subset_key(
                    TrafficDirection::Inbound,
                    &port.name,
                    MANAGEMENT_CLUSTER_HOSTNAME,
                    port.number,
                );
                let endpoints = build_inbound_locality_lb_endpoints(local_host, port.number);
                let mut cluster = factory::build_default_cluster(
                    env,
                    name,
                    xds::DiscoveryType::Static,
                    endpoints,
                    TrafficDirection::Inbound,
                    None,
                );
                policy::set_upstream_protocol(env, &mut cluster, port, TrafficDirection::Inbound);
                clusters.push(cluster);
            }
        } else if let Some(scope) = scope {
            let scope_id = format!("{}.{}", scope.name, scope.namespace);
            for listener in &scope.ingress {
                let Some((address, family, target_port)) =
                    parse_default_endpoint(&listener.default_endpoint, local_host)
                else {
                    tracing::debug!(
                        listener = %listener.default_endpoint,
                        "skipping ingress listener with a malformed default endpoint",
                    );
                    continue;
                };

                // A matching instance yields the cluster name the listener
                // generation expects; otherwise a placeholder named after
                // the scope stands in.
                let mut instance = find_instance_for_listener(instances, listener)
                    .unwrap_or_else(|| placeholder_instance(scope, &scope_id));
                instance.endpoint.family = family;
                instance.endpoint.address = address;
                instance.endpoint.service_port = listener.port.clone();
                instance.endpoint.port = target_port;

                let bind = instance.endpoint.address.clone();
                clusters.push(
                    self.build_inbound_cluster_for_port_or_uds(env, proxy, push, &instance, &bind),
                );
            }
        }

        clusters
    }

    fn build_inbound_cluster_for_port_or_uds(
        &self,
        env: &Environment,
        proxy: &Proxy,
        push: &PushContext,
        instance: &ServiceInstance,
        bind: &str,
    ) -> xds::Cluster {
        let service_port = &instance.endpoint.service_port;
        let name = xds::build_subset_key(
            TrafficDirection::Inbound,
            &service_port.name,
            instance.service.hostname.as_str(),
            service_port.number,
        );
        let endpoints = build_inbound_locality_lb_endpoints(bind, instance.endpoint.port);
        let mut cluster = factory::build_default_cluster(
            env,
            name,
            xds::DiscoveryType::Static,
            endpoints,
            TrafficDirection::Inbound,
            None,
        );
        if !env.mesh.inbound_cluster_stat_name.is_empty() {
            cluster.alt_stat_name = Some(factory::alt_stat_name(
                &env.mesh.inbound_cluster_stat_name,
                &instance.service.hostname,
                "",
                service_port,
                &instance.service.attributes,
            ));
        }
        policy::set_upstream_protocol(env, &mut cluster, service_port, TrafficDirection::Inbound);

        let ctx = ObserverContext {
            env,
            proxy,
            service: Some(&instance.service),
            port: Some(service_port),
            instance: Some(instance),
        };
        for observer in &self.observers {
            observer.on_inbound_cluster(&ctx, &mut cluster);
        }

        // User-declared circuit breakers must hold on the receiving side
        // too, so the server has matching capacity. Only the
        // connection-pool facet applies on the accept path; upstream TLS,
        // outlier detection, and balancing do not.
        if let Some(cfg) = push.destination_rule(&instance.service.hostname) {
            if let Some(traffic_policy) = &cfg.rule.traffic_policy {
                policy::apply_connection_pool(
                    env,
                    &mut cluster,
                    traffic_policy.connection_pool.as_ref(),
                    TrafficDirection::Inbound,
                );
                cluster.metadata = Some(factory::lineage_metadata(&cfg.meta));
            }
        }
        cluster
    }
}

/// Passthrough clusters delivering to the local workload while preserving
/// the original destination; one per supported IP family, each binding a
/// loopback-local source address.
pub(crate) fn build_inbound_passthrough_clusters(
    env: &Environment,
    proxy: &Proxy,
) -> Vec<xds::Cluster> {
    let mut clusters = Vec::with_capacity(2);
    if proxy.supports_ipv4() {
        let mut cluster = sinks::build_default_passthrough_cluster(env);
        cluster.name = xds::INBOUND_PASSTHROUGH_CLUSTER_IPV4.to_string();
        cluster.upstream_bind_config = Some(xds::BindConfig {
            source_address: xds::SocketAddress {
                address: xds::INBOUND_PASSTHROUGH_BIND_IPV4.to_string(),
                port: 0,
            },
        });
        clusters.push(cluster);
    }
    if proxy.supports_ipv6() {
        let mut cluster = sinks::build_default_passthrough_cluster(env);
        cluster.name = xds::INBOUND_PASSTHROUGH_CLUSTER_IPV6.to_string();
        cluster.upstream_bind_config = Some(xds::BindConfig {
            source_address: xds::SocketAddress {
                address: xds::INBOUND_PASSTHROUGH_BIND_IPV6.to_string(),
                port: 0,
            },
        });
        clusters.push(cluster);
    }
    clusters
}

/// `host:port`, `:port`, or a unix socket path. Malformed values yield
/// nothing. The host part is ignored: the workload is always local.
fn parse_default_endpoint(
    default_endpoint: &str,
    local_host: &str,
) -> Option<(String, AddressFamily, u16)> {
    if default_endpoint.starts_with(UNIX_ADDRESS_PREFIX) {
        return Some((default_endpoint.to_string(), AddressFamily::Unix, 0));
    }
    let mut parts = default_endpoint.split(':');
    parts.next()?;
    let port = parts.next()?.parse().ok()?;
    Some((local_host.to_string(), AddressFamily::Tcp, port))
}

fn find_instance_for_listener(
    instances: &[ServiceInstance],
    listener: &IngressListener,
) -> Option<ServiceInstance> {
    instances
        .iter()
        .find(|i| i.endpoint.port == listener.port.number)
        .cloned()
}

fn placeholder_instance(scope: &SidecarScope, scope_id: &str) -> ServiceInstance {
    ServiceInstance {
        service: Arc::new(Service {
            hostname: Hostname::from(scope_id),
            attributes: ServiceAttributes {
                name: scope.name.clone(),
                namespace: scope.namespace.clone(),
                ..Default::default()
            },
            ..Default::default()
        }),
        endpoint: NetworkEndpoint::default(),
        labels: Default::default(),
        service_account: String::new(),
        mtls_ready: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{instance_with, test_env};
    use mesh_controller_core::{
        ConnectionPool, ConfigMeta, DestinationRule, DestinationRuleConfig, Protocol, ProxyType,
        TcpSettings, TrafficPolicy,
    };
    use ahash::AHashMap;
    use std::sync::Arc;

    fn sidecar_with_ips(ips: &[&str]) -> Proxy {
        Proxy {
            id: "sidecar~10.0.0.1~default".to_string(),
            proxy_type: ProxyType::Sidecar,
            ip_addresses: ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            ..Default::default()
        }
    }

    fn local_instance(hostname: &str, port_name: &str, port: u16) -> ServiceInstance {
        let service = Arc::new(Service {
            hostname: hostname.into(),
            ports: vec![Port::new(port, port_name, Protocol::Http)],
            ..Default::default()
        });
        let mut instance = instance_with(&service, port, "10.0.0.1", "", "", 0, false);
        instance.endpoint.service_port = Port::new(port, port_name, Protocol::Http);
        instance
    }

    #[test]
    fn case_a_emits_one_cluster_per_service_port() {
        let env = test_env();
        let proxy = sidecar_with_ips(&["10.0.0.1"]);
        let push = PushContext::default();
        let instances = vec![
            local_instance("a.example.com", "http", 8080),
            local_instance("a.example.com", "http", 8080),
            local_instance("b.example.com", "http", 9090),
        ];
        let builder = ClusterBuilder::new();
        let clusters = builder.build_inbound_clusters(&env, &proxy, &push, &instances, &[]);
        let names: Vec<_> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["inbound|8080|http|a.example.com", "inbound|9090|http|b.example.com"]
        );
        for (cluster, port) in clusters.iter().zip([8080u32, 9090]) {
            assert_eq!(cluster.discovery_type, xds::DiscoveryType::Static);
            let endpoints = &cluster.load_assignment.as_ref().unwrap().endpoints;
            assert_eq!(
                endpoints[0].lb_endpoints[0].address,
                xds::Address::Socket(xds::SocketAddress {
                    address: "127.0.0.1".to_string(),
                    port,
                })
            );
        }
    }

    #[test]
    fn interception_none_emits_nothing_without_ingress_listeners() {
        let env = test_env();
        let mut proxy = sidecar_with_ips(&["10.0.0.1"]);
        proxy.interception_mode = InterceptionMode::None;
        let push = PushContext::default();
        let instances = vec![local_instance("a.example.com", "http", 8080)];
        let clusters =
            ClusterBuilder::new().build_inbound_clusters(&env, &proxy, &push, &instances, &[]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn management_ports_produce_static_clusters() {
        let env = test_env();
        let proxy = sidecar_with_ips(&["10.0.0.1"]);
        let push = PushContext::default();
        let ports = vec![Port::new(15020, "http-health", Protocol::Http)];
        let clusters =
            ClusterBuilder::new().build_inbound_clusters(&env, &proxy, &push, &[], &ports);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "inbound|15020|http-health|mgmtCluster");
        assert_eq!(clusters[0].discovery_type, xds::DiscoveryType::Static);
    }

    #[test]
    fn ingress_listeners_override_the_instance_endpoint() {
        let env = test_env();
        let mut proxy = sidecar_with_ips(&["10.0.0.1"]);
        proxy.sidecar_scope = Some(SidecarScope {
            name: "scope".to_string(),
            namespace: "default".to_string(),
            services: None,
            ingress: vec![
                IngressListener {
                    port: Port::new(8080, "http", Protocol::Http),
                    default_endpoint: "127.0.0.1:7070".to_string(),
                },
                IngressListener {
                    port: Port::new(9090, "uds", Protocol::Tcp),
                    default_endpoint: "unix:///var/run/app.sock".to_string(),
                },
                IngressListener {
                    port: Port::new(9999, "bad", Protocol::Tcp),
                    default_endpoint: "no-port".to_string(),
                },
            ],
        });
        let push = PushContext::default();
        let instances = vec![local_instance("a.example.com", "http", 8080)];
        let clusters =
            ClusterBuilder::new().build_inbound_clusters(&env, &proxy, &push, &instances, &[]);

        // The malformed listener is skipped silently.
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name, "inbound|8080|http|a.example.com");
        let endpoint =
            &clusters[0].load_assignment.as_ref().unwrap().endpoints[0].lb_endpoints[0];
        assert_eq!(
            endpoint.address,
            xds::Address::Socket(xds::SocketAddress {
                address: "127.0.0.1".to_string(),
                port: 7070,
            })
        );

        // No instance matches port 9090, so the scope id names the cluster
        // and the endpoint is the parsed unix socket.
        assert_eq!(clusters[1].name, "inbound|9090|uds|scope.default");
        let endpoint =
            &clusters[1].load_assignment.as_ref().unwrap().endpoints[0].lb_endpoints[0];
        assert_eq!(
            endpoint.address,
            xds::Address::Pipe {
                path: "/var/run/app.sock".to_string()
            }
        );
    }

    #[test]
    fn inbound_policy_takes_only_the_connection_pool_facet() {
        let env = test_env();
        let proxy = sidecar_with_ips(&["10.0.0.1"]);
        let mut rules = AHashMap::default();
        rules.insert(
            Hostname::from("a.example.com"),
            Arc::new(DestinationRuleConfig {
                meta: ConfigMeta {
                    name: "a-rule".to_string(),
                    namespace: "default".to_string(),
                    resource_version: "1".to_string(),
                },
                rule: DestinationRule {
                    host: "a.example.com".into(),
                    traffic_policy: Some(TrafficPolicy {
                        connection_pool: Some(ConnectionPool {
                            tcp: Some(TcpSettings {
                                max_connections: 7,
                                ..Default::default()
                            }),
                            http: None,
                        }),
                        outlier_detection: Some(Default::default()),
                        ..Default::default()
                    }),
                    subsets: Vec::new(),
                },
            }),
        );
        let push = PushContext::new(Vec::new(), rules, AHashMap::default());
        let instances = vec![local_instance("a.example.com", "http", 8080)];
        let clusters =
            ClusterBuilder::new().build_inbound_clusters(&env, &proxy, &push, &instances, &[]);

        let cluster = &clusters[0];
        let thresholds = &cluster.circuit_breakers.as_ref().unwrap().thresholds[0];
        assert_eq!(thresholds.max_connections, Some(7));
        // Inbound clusters never take outlier detection or TLS.
        assert!(cluster.outlier_detection.is_none());
        assert!(cluster.tls_context.is_none());
        assert_eq!(cluster.metadata.as_ref().unwrap().name, "a-rule");
    }

    #[test]
    fn passthrough_sinks_are_emitted_per_ip_family() {
        let env = test_env();
        let dual = sidecar_with_ips(&["10.0.0.1", "2001:db8::2"]);
        let clusters = build_inbound_passthrough_clusters(&env, &dual);
        let names: Vec<_> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                xds::INBOUND_PASSTHROUGH_CLUSTER_IPV4,
                xds::INBOUND_PASSTHROUGH_CLUSTER_IPV6
            ]
        );
        assert_eq!(
            clusters[0].upstream_bind_config.as_ref().unwrap().source_address.address,
            xds::INBOUND_PASSTHROUGH_BIND_IPV4
        );

        let v4_only = sidecar_with_ips(&["10.0.0.1"]);
        assert_eq!(build_inbound_passthrough_clusters(&env, &v4_only).len(), 1);
    }
}
