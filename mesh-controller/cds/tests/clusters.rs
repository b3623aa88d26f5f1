//! End-to-end builds over assembled environments: the seed scenarios plus
//! the global invariants every build must hold.

use ahash::AHashMap;
use maplit::btreemap;
use mesh_controller_cds::ClusterBuilder;
use mesh_controller_core::{
    ConfigMeta, ConsistentHashLb, DestinationRule, DestinationRuleConfig, Environment, EventKind,
    Hostname, LoadBalancerSettings, MemRegistry, MeshConfig, Port, Protocol, Proxy, ProxyMetadata,
    ProxyType, PushContext, Resolution, RouterMode, Service, SimpleLb, Subset, TlsMode,
    TlsSettings, TrafficPolicy,
};
use mesh_controller_xds as xds;
use std::sync::Arc;

fn reviews() -> Arc<Service> {
    Arc::new(Service {
        hostname: "reviews".into(),
        ports: vec![Port::new(9080, "http", Protocol::Http)],
        resolution: Resolution::ClientSide,
        mesh_external: false,
        ..Default::default()
    })
}

fn sidecar() -> Proxy {
    Proxy {
        id: "sidecar~10.0.0.1~default".to_string(),
        proxy_type: ProxyType::Sidecar,
        ip_addresses: vec!["10.0.0.1".parse().unwrap()],
        ..Default::default()
    }
}

fn env(auto_mtls: bool) -> Environment {
    Environment {
        mesh: MeshConfig {
            enable_auto_mtls: auto_mtls,
            ..Default::default()
        },
        discovery: Arc::new(MemRegistry::new()),
    }
}

fn push_with(
    services: Vec<Arc<Service>>,
    rules: Vec<(&str, DestinationRuleConfig)>,
) -> PushContext {
    let mut rule_map = AHashMap::default();
    for (host, rule) in rules {
        rule_map.insert(Hostname::from(host), Arc::new(rule));
    }
    PushContext::new(services, rule_map, AHashMap::default())
}

fn rule_config(name: &str, rule: DestinationRule) -> DestinationRuleConfig {
    DestinationRuleConfig {
        meta: ConfigMeta {
            name: name.to_string(),
            namespace: "default".to_string(),
            resource_version: "1".to_string(),
        },
        rule,
    }
}

fn names(clusters: &[xds::Cluster]) -> Vec<&str> {
    clusters.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn s1_plain_sidecar_service() {
    let env = env(false);
    let push = push_with(vec![reviews()], Vec::new());
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    assert_eq!(
        names(&clusters),
        vec![
            "outbound|9080||reviews",
            xds::BLACK_HOLE_CLUSTER,
            xds::PASSTHROUGH_CLUSTER,
            xds::INBOUND_PASSTHROUGH_CLUSTER_IPV4,
        ]
    );

    let outbound = &clusters[0];
    assert_eq!(outbound.discovery_type, xds::DiscoveryType::Eds);
    let eds = outbound.eds_cluster_config.as_ref().unwrap();
    assert_eq!(eds.service_name, "outbound|9080||reviews");
    assert!(outbound.load_assignment.is_none());
    // Plaintext: no TLS context and no transport-socket matches.
    assert!(outbound.tls_context.is_none());
    assert!(outbound.transport_socket_matches.is_empty());
}

#[test]
fn s2_auto_mtls_packages_a_transport_socket_match_list() {
    let env = env(true);
    let push = push_with(vec![reviews()], Vec::new());
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    let outbound = clusters
        .iter()
        .find(|c| c.name == "outbound|9080||reviews")
        .unwrap();
    assert!(outbound.tls_context.is_none());
    let matches = &outbound.transport_socket_matches;
    assert_eq!(matches.len(), 2);
    assert_eq!(
        matches[0].match_labels.get(xds::MTLS_READY_LABEL),
        Some(&"true".to_string())
    );
    assert_eq!(matches[0].transport_socket.name, xds::TLS_SOCKET_NAME);
    assert_eq!(matches[1].transport_socket.name, xds::RAW_BUFFER_SOCKET_NAME);
    assert!(matches[1].match_labels.is_empty());
}

#[test]
fn s3_subsets_share_the_consistent_hash_policy() {
    let env = env(false);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: Some(TrafficPolicy {
            load_balancer: Some(LoadBalancerSettings::ConsistentHash(ConsistentHashLb {
                minimum_ring_size: 0,
            })),
            ..Default::default()
        }),
        subsets: vec![
            Subset {
                name: "v1".to_string(),
                labels: btreemap! { "a".to_string() => "1".to_string() },
                traffic_policy: None,
            },
            Subset {
                name: "v2".to_string(),
                labels: btreemap! { "a".to_string() => "2".to_string() },
                traffic_policy: None,
            },
        ],
    };
    let push = push_with(vec![reviews()], vec![("reviews", rule_config("reviews-dr", rule))]);
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    for name in [
        "outbound|9080||reviews",
        "outbound|9080|v1|reviews",
        "outbound|9080|v2|reviews",
    ] {
        let cluster = clusters.iter().find(|c| c.name == name).unwrap();
        assert_eq!(cluster.lb_policy, xds::LbPolicy::RingHash, "{name}");
        assert_eq!(
            cluster.lb_config,
            Some(xds::LbConfig::RingHashLbConfig {
                minimum_ring_size: 1024
            }),
            "{name}",
        );
        // All three point their EDS reference at their own name.
        assert_eq!(
            cluster.eds_cluster_config.as_ref().unwrap().service_name,
            name
        );
        assert_eq!(cluster.metadata.as_ref().unwrap().name, "reviews-dr");
    }
}

#[test]
fn s4_passthrough_service_entries_use_original_dst() {
    let env = env(false);
    let external = Arc::new(Service {
        hostname: "external.example.com".into(),
        ports: vec![Port::new(443, "tls", Protocol::Tls)],
        resolution: Resolution::Passthrough,
        mesh_external: true,
        ..Default::default()
    });
    let push = push_with(vec![external], Vec::new());
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    let cluster = clusters
        .iter()
        .find(|c| c.name == "outbound|443||external.example.com")
        .unwrap();
    assert_eq!(cluster.discovery_type, xds::DiscoveryType::OriginalDst);
    assert_eq!(cluster.lb_policy, xds::LbPolicy::ClusterProvided);
    assert!(cluster.eds_cluster_config.is_none());
    assert!(cluster.load_assignment.is_none());
}

#[test]
fn s5_sni_dnat_gateways_emit_dns_srv_names_without_tls() {
    let env = env(false);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: Some(TrafficPolicy {
            tls: Some(TlsSettings {
                mode: TlsMode::MeshMutual,
                ..Default::default()
            }),
            ..Default::default()
        }),
        subsets: vec![Subset {
            name: "v1".to_string(),
            labels: btreemap! { "a".to_string() => "1".to_string() },
            traffic_policy: None,
        }],
    };
    let push = push_with(vec![reviews()], vec![("reviews", rule_config("reviews-dr", rule))]);
    let gateway = Proxy {
        id: "router~10.0.0.2~gateways".to_string(),
        proxy_type: ProxyType::Router,
        ip_addresses: vec!["10.0.0.2".parse().unwrap()],
        metadata: ProxyMetadata {
            router_mode: RouterMode::SniDnat,
            ..Default::default()
        },
        ..Default::default()
    };
    let clusters = ClusterBuilder::new().build(&env, &gateway, &push);

    let sni_dnat: Vec<_> = clusters
        .iter()
        .filter(|c| c.name.starts_with("outbound_."))
        .collect();
    assert_eq!(
        sni_dnat.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["outbound_.9080_._.reviews", "outbound_.9080_.v1_.reviews"]
    );
    for cluster in sni_dnat {
        assert!(cluster.tls_context.is_none(), "{}", cluster.name);
        assert!(cluster.transport_socket_matches.is_empty(), "{}", cluster.name);
    }

    // Gateways emit neither inbound clusters nor the sidecar passthroughs.
    assert!(names(&clusters).contains(&xds::BLACK_HOLE_CLUSTER));
    for cluster in &clusters {
        assert!(!cluster.name.starts_with("inbound|"));
        assert_ne!(cluster.name, xds::PASSTHROUGH_CLUSTER);
        assert_ne!(cluster.name, xds::INBOUND_PASSTHROUGH_CLUSTER_IPV4);
    }
}

#[test]
fn s6_duplicate_subset_names_are_dropped_first_wins() {
    let env = env(false);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: None,
        subsets: vec![
            Subset {
                name: "v1".to_string(),
                labels: btreemap! {},
                traffic_policy: Some(TrafficPolicy {
                    load_balancer: Some(LoadBalancerSettings::Simple(SimpleLb::Random)),
                    ..Default::default()
                }),
            },
            Subset {
                name: "v1".to_string(),
                labels: btreemap! {},
                traffic_policy: Some(TrafficPolicy {
                    load_balancer: Some(LoadBalancerSettings::Simple(SimpleLb::LeastConn)),
                    ..Default::default()
                }),
            },
        ],
    };
    let push = push_with(vec![reviews()], vec![("reviews", rule_config("reviews-dr", rule))]);
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    let v1: Vec<_> = clusters
        .iter()
        .filter(|c| c.name == "outbound|9080|v1|reviews")
        .collect();
    assert_eq!(v1.len(), 1);
    // The first subset's policy is present unchanged.
    assert_eq!(v1[0].lb_policy, xds::LbPolicy::Random);

    let events = push.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::DuplicateCluster);
    assert_eq!(events[0].key, "outbound|9080|v1|reviews");
}

#[test]
fn builds_are_deterministic() {
    let env = env(true);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: Some(TrafficPolicy {
            load_balancer: Some(LoadBalancerSettings::Simple(SimpleLb::Random)),
            ..Default::default()
        }),
        subsets: vec![Subset {
            name: "v1".to_string(),
            labels: btreemap! { "a".to_string() => "1".to_string() },
            traffic_policy: None,
        }],
    };
    let services = vec![
        reviews(),
        Arc::new(Service {
            hostname: "ratings".into(),
            ports: vec![
                Port::new(9080, "http", Protocol::Http),
                Port::new(9081, "grpc", Protocol::Grpc),
            ],
            ..Default::default()
        }),
    ];
    let proxy = sidecar();

    let push = push_with(services.clone(), vec![("reviews", rule_config("dr", rule.clone()))]);
    let first = ClusterBuilder::new().build(&env, &proxy, &push);
    let push = push_with(services, vec![("reviews", rule_config("dr", rule))]);
    let second = ClusterBuilder::new().build(&env, &proxy, &push);

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn global_invariants_hold_across_a_mixed_build() {
    let env = env(true);
    let services = vec![
        reviews(),
        Arc::new(Service {
            hostname: "dns.example.com".into(),
            ports: vec![Port::new(80, "http", Protocol::Http)],
            resolution: Resolution::Dns,
            ..Default::default()
        }),
        Arc::new(Service {
            hostname: "udp.example.com".into(),
            ports: vec![Port::new(53, "udp", Protocol::Udp)],
            ..Default::default()
        }),
        Arc::new(Service {
            hostname: "passthrough.example.com".into(),
            ports: vec![Port::new(443, "tcp", Protocol::Tcp)],
            resolution: Resolution::Passthrough,
            mesh_external: true,
            ..Default::default()
        }),
    ];
    let push = push_with(services, Vec::new());
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    // No UDP port contributes a cluster.
    assert!(!names(&clusters).iter().any(|n| n.contains("udp.example.com")));

    // Names are unique.
    let mut seen = std::collections::HashSet::new();
    for cluster in &clusters {
        assert!(seen.insert(&cluster.name), "duplicate name {}", cluster.name);
    }

    // Exactly one blackhole and one default passthrough for sidecars.
    assert_eq!(
        names(&clusters)
            .iter()
            .filter(|n| **n == xds::BLACK_HOLE_CLUSTER)
            .count(),
        1
    );
    assert_eq!(
        names(&clusters)
            .iter()
            .filter(|n| **n == xds::PASSTHROUGH_CLUSTER)
            .count(),
        1
    );

    for cluster in &clusters {
        match cluster.discovery_type {
            xds::DiscoveryType::Eds => {
                assert!(cluster.eds_cluster_config.is_some(), "{}", cluster.name);
                assert!(cluster.load_assignment.is_none(), "{}", cluster.name);
            }
            xds::DiscoveryType::Static | xds::DiscoveryType::StrictDns => {
                // The blackhole is the one static cluster without inline
                // endpoints.
                if cluster.name != xds::BLACK_HOLE_CLUSTER {
                    assert!(cluster.load_assignment.is_some(), "{}", cluster.name);
                }
            }
            xds::DiscoveryType::OriginalDst => {
                assert_eq!(cluster.lb_policy, xds::LbPolicy::ClusterProvided, "{}", cluster.name);
            }
        }

        // Mesh-external services are never auto-promoted to mTLS.
        if cluster.name.contains("passthrough.example.com") {
            assert!(cluster.transport_socket_matches.is_empty());
        }
    }
}

#[test]
fn auto_mtls_off_means_no_transport_socket_matches_anywhere() {
    let env = env(false);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: Some(TrafficPolicy {
            tls: Some(TlsSettings {
                mode: TlsMode::MeshMutual,
                ..Default::default()
            }),
            ..Default::default()
        }),
        subsets: Vec::new(),
    };
    let push = push_with(vec![reviews()], vec![("reviews", rule_config("dr", rule))]);
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);
    for cluster in &clusters {
        assert!(cluster.transport_socket_matches.is_empty(), "{}", cluster.name);
    }
    // The user-supplied mesh-mutual context attaches directly instead.
    let outbound = clusters
        .iter()
        .find(|c| c.name == "outbound|9080||reviews")
        .unwrap();
    assert!(outbound.tls_context.is_some());
}

#[test]
fn subset_policy_layers_over_the_root_policy() {
    let env = env(false);
    let rule = DestinationRule {
        host: "reviews".into(),
        traffic_policy: Some(TrafficPolicy {
            connection_pool: Some(mesh_controller_core::ConnectionPool {
                tcp: Some(mesh_controller_core::TcpSettings {
                    max_connections: 42,
                    ..Default::default()
                }),
                http: None,
            }),
            load_balancer: Some(LoadBalancerSettings::Simple(SimpleLb::Random)),
            ..Default::default()
        }),
        subsets: vec![Subset {
            name: "v1".to_string(),
            labels: btreemap! {},
            traffic_policy: Some(TrafficPolicy {
                load_balancer: Some(LoadBalancerSettings::Simple(SimpleLb::LeastConn)),
                ..Default::default()
            }),
        }],
    };
    let push = push_with(vec![reviews()], vec![("reviews", rule_config("dr", rule))]);
    let clusters = ClusterBuilder::new().build(&env, &sidecar(), &push);

    let default = clusters
        .iter()
        .find(|c| c.name == "outbound|9080||reviews")
        .unwrap();
    assert_eq!(default.lb_policy, xds::LbPolicy::Random);

    // The subset keeps the root's connection pool but its own balancer
    // wins: equivalent to applying the merged policy where subset fields,
    // when present, take precedence.
    let subset = clusters
        .iter()
        .find(|c| c.name == "outbound|9080|v1|reviews")
        .unwrap();
    assert_eq!(subset.lb_policy, xds::LbPolicy::LeastRequest);
    let thresholds = &subset.circuit_breakers.as_ref().unwrap().thresholds[0];
    assert_eq!(thresholds.max_connections, Some(42));
}
