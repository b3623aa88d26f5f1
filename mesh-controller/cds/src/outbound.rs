use crate::endpoints;
use crate::factory;
use crate::observer::ObserverContext;
use crate::policy::{self, ApplyPolicyOpts, ClusterMode};
use crate::ClusterBuilder;
use mesh_controller_core::{Environment, Protocol, Proxy, PushContext};
use mesh_controller_xds as xds;
use xds::TrafficDirection;

impl ClusterBuilder {
    /// One default cluster per visible service × port, plus one cluster per
    /// destination-rule subset.
    pub(crate) fn build_outbound_clusters(
        &self,
        env: &Environment,
        proxy: &Proxy,
        push: &PushContext,
    ) -> Vec<xds::Cluster> {
        let mut clusters = Vec::new();

        for service in push.services(proxy) {
            let dest_rule = push.destination_rule(&service.hostname);
            let rule = dest_rule.map(|cfg| &cfg.rule);
            let metadata = dest_rule.map(|cfg| factory::lineage_metadata(&cfg.meta));
            let root_policy = rule.and_then(|r| r.traffic_policy.as_ref());

            for port in &service.ports {
                if port.protocol == Protocol::Udp {
                    continue;
                }

                let default_endpoints = endpoints::build_locality_lb_endpoints(
                    env,
                    &proxy.network_view,
                    &service,
                    port.number,
                    &[],
                );
                let discovery_type = factory::convert_resolution(proxy, service.resolution);
                let cluster_name = xds::build_subset_key(
                    TrafficDirection::Outbound,
                    "",
                    service.hostname.as_str(),
                    port.number,
                );
                let service_accounts = push.service_accounts(&service.hostname, port.number);

                let mut default_cluster = factory::build_default_cluster(
                    env,
                    cluster_name,
                    discovery_type,
                    default_endpoints.clone(),
                    TrafficDirection::Outbound,
                    Some(port),
                );
                if !env.mesh.outbound_cluster_stat_name.is_empty() {
                    default_cluster.alt_stat_name = Some(factory::alt_stat_name(
                        &env.mesh.outbound_cluster_stat_name,
                        &service.hostname,
                        "",
                        port,
                        &service.attributes,
                    ));
                }
                policy::set_upstream_protocol(
                    env,
                    &mut default_cluster,
                    port,
                    TrafficDirection::Outbound,
                );

                let default_sni = xds::build_dns_srv_subset_key(
                    TrafficDirection::Outbound,
                    "",
                    service.hostname.as_str(),
                    port.number,
                );
                policy::apply_traffic_policy(
                    &mut default_cluster,
                    &ApplyPolicyOpts {
                        env,
                        proxy,
                        policy: root_policy,
                        port: Some(port),
                        service_accounts,
                        sni: &default_sni,
                        cluster_mode: ClusterMode::Default,
                        direction: TrafficDirection::Outbound,
                        mesh_external: service.mesh_external,
                    },
                );
                default_cluster.metadata = metadata.clone();

                let mut subset_clusters = Vec::new();
                for subset in rule.map(|r| r.subsets.as_slice()).unwrap_or_default() {
                    let subset_name = xds::build_subset_key(
                        TrafficDirection::Outbound,
                        &subset.name,
                        service.hostname.as_str(),
                        port.number,
                    );
                    let subset_sni = xds::build_dns_srv_subset_key(
                        TrafficDirection::Outbound,
                        &subset.name,
                        service.hostname.as_str(),
                        port.number,
                    );

                    // Inline-endpoint discovery types carry the subset's
                    // label predicate in the endpoint list itself.
                    let subset_endpoints = if discovery_type != xds::DiscoveryType::Eds
                        && !subset.labels.is_empty()
                    {
                        endpoints::build_locality_lb_endpoints(
                            env,
                            &proxy.network_view,
                            &service,
                            port.number,
                            std::slice::from_ref(&subset.labels),
                        )
                    } else {
                        default_endpoints.clone()
                    };

                    let mut subset_cluster = factory::build_default_cluster(
                        env,
                        subset_name,
                        discovery_type,
                        subset_endpoints,
                        TrafficDirection::Outbound,
                        None,
                    );
                    if !env.mesh.outbound_cluster_stat_name.is_empty() {
                        subset_cluster.alt_stat_name = Some(factory::alt_stat_name(
                            &env.mesh.outbound_cluster_stat_name,
                            &service.hostname,
                            &subset.name,
                            port,
                            &service.attributes,
                        ));
                    }
                    policy::set_upstream_protocol(
                        env,
                        &mut subset_cluster,
                        port,
                        TrafficDirection::Outbound,
                    );

                    // Root policy first, then the subset's: subset facets
                    // layer on top where present.
                    for policy_layer in [root_policy, subset.traffic_policy.as_ref()] {
                        policy::apply_traffic_policy(
                            &mut subset_cluster,
                            &ApplyPolicyOpts {
                                env,
                                proxy,
                                policy: policy_layer,
                                port: Some(port),
                                service_accounts,
                                sni: &subset_sni,
                                cluster_mode: ClusterMode::Default,
                                direction: TrafficDirection::Outbound,
                                mesh_external: service.mesh_external,
                            },
                        );
                    }

                    factory::update_eds(env, &mut subset_cluster);
                    subset_cluster.metadata = metadata.clone();

                    let ctx = ObserverContext {
                        env,
                        proxy,
                        service: Some(&service),
                        port: Some(port),
                        instance: None,
                    };
                    for observer in &self.observers {
                        observer.on_outbound_cluster(&ctx, &mut subset_cluster);
                    }
                    subset_clusters.push(subset_cluster);
                }

                factory::update_eds(env, &mut default_cluster);
                let ctx = ObserverContext {
                    env,
                    proxy,
                    service: Some(&service),
                    port: Some(port),
                    instance: None,
                };
                for observer in &self.observers {
                    observer.on_outbound_cluster(&ctx, &mut default_cluster);
                }

                clusters.push(default_cluster);
                clusters.extend(subset_clusters);
            }
        }

        clusters
    }

    /// SNI-DNAT variants for gateways forwarding TLS by SNI: DNS-SRV-shaped
    /// names, mesh-internal services only, and no TLS of their own.
    pub(crate) fn build_outbound_sni_dnat_clusters(
        &self,
        env: &Environment,
        proxy: &Proxy,
        push: &PushContext,
    ) -> Vec<xds::Cluster> {
        let mut clusters = Vec::new();

        for service in push.services(proxy) {
            if service.mesh_external {
                continue;
            }
            let dest_rule = push.destination_rule(&service.hostname);

            for port in &service.ports {
                if port.protocol == Protocol::Udp {
                    continue;
                }

                let default_endpoints = endpoints::build_locality_lb_endpoints(
                    env,
                    &proxy.network_view,
                    &service,
                    port.number,
                    &[],
                );
                let discovery_type = factory::convert_resolution(proxy, service.resolution);
                let cluster_name = xds::build_dns_srv_subset_key(
                    TrafficDirection::Outbound,
                    "",
                    service.hostname.as_str(),
                    port.number,
                );
                let mut default_cluster = factory::build_default_cluster(
                    env,
                    cluster_name,
                    discovery_type,
                    default_endpoints.clone(),
                    TrafficDirection::Outbound,
                    None,
                );

                let mut subset_clusters = Vec::new();
                if let Some(cfg) = dest_rule {
                    policy::apply_traffic_policy(
                        &mut default_cluster,
                        &ApplyPolicyOpts {
                            env,
                            proxy,
                            policy: cfg.rule.traffic_policy.as_ref(),
                            port: Some(port),
                            service_accounts: &[],
                            sni: "",
                            cluster_mode: ClusterMode::SniDnat,
                            direction: TrafficDirection::Outbound,
                            mesh_external: false,
                        },
                    );
                    default_cluster.metadata = Some(factory::lineage_metadata(&cfg.meta));

                    for subset in &cfg.rule.subsets {
                        let subset_name = xds::build_dns_srv_subset_key(
                            TrafficDirection::Outbound,
                            &subset.name,
                            service.hostname.as_str(),
                            port.number,
                        );
                        let subset_endpoints = if discovery_type != xds::DiscoveryType::Eds
                            && !subset.labels.is_empty()
                        {
                            endpoints::build_locality_lb_endpoints(
                                env,
                                &proxy.network_view,
                                &service,
                                port.number,
                                std::slice::from_ref(&subset.labels),
                            )
                        } else {
                            default_endpoints.clone()
                        };

                        let mut subset_cluster = factory::build_default_cluster(
                            env,
                            subset_name,
                            discovery_type,
                            subset_endpoints,
                            TrafficDirection::Outbound,
                            None,
                        );
                        for policy_layer in
                            [cfg.rule.traffic_policy.as_ref(), subset.traffic_policy.as_ref()]
                        {
                            policy::apply_traffic_policy(
                                &mut subset_cluster,
                                &ApplyPolicyOpts {
                                    env,
                                    proxy,
                                    policy: policy_layer,
                                    port: Some(port),
                                    service_accounts: &[],
                                    sni: "",
                                    cluster_mode: ClusterMode::SniDnat,
                                    direction: TrafficDirection::Outbound,
                                    mesh_external: false,
                                },
                            );
                        }
                        factory::update_eds(env, &mut subset_cluster);
                        subset_cluster.metadata = Some(factory::lineage_metadata(&cfg.meta));
                        subset_clusters.push(subset_cluster);
                    }
                }

                factory::update_eds(env, &mut default_cluster);
                clusters.push(default_cluster);
                clusters.extend(subset_clusters);
            }
        }

        clusters
    }
}
