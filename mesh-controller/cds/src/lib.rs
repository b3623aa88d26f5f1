#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Builds the complete set of upstream cluster definitions a proxy must be
//! served, from a frozen snapshot of the mesh. The build is pure and
//! single-threaded per invocation; it never fails as a whole, degrading
//! defective facets instead.

mod endpoints;
mod factory;
mod inbound;
mod locality;
mod metrics;
mod observer;
mod outbound;
mod policy;
mod sinks;
#[cfg(test)]
mod test_util;
mod tls;

pub use self::metrics::Metrics;
pub use self::observer::{ClusterObserver, ObserverContext};

use ahash::AHashSet;
use mesh_controller_core::{
    Environment, EventKind, Port, Proxy, ProxyType, PushContext, PushEvent, RouterMode,
};
use mesh_controller_xds as xds;
use std::sync::Arc;

pub struct ClusterBuilder {
    observers: Vec<Arc<dyn ClusterObserver>>,
    metrics: Metrics,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            metrics: Metrics::default(),
        }
    }

    /// Appends a post-hook fired for every generated outbound and inbound
    /// cluster. Hooks run in registration order and may mutate the cluster,
    /// but the builder still owns naming and ordering.
    pub fn with_observer(mut self, observer: Arc<dyn ClusterObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Produces the ordered cluster list for one proxy.
    pub fn build(
        &self,
        env: &Environment,
        proxy: &Proxy,
        push: &PushContext,
    ) -> Vec<xds::Cluster> {
        let span = tracing::debug_span!(
            "build_clusters",
            proxy = %proxy.id,
            proxy_version = proxy.metadata.version.as_deref().unwrap_or(""),
        );
        let _enter = span.enter();

        let mut outbound = self.build_outbound_clusters(env, proxy, push);

        let clusters = match proxy.proxy_type {
            ProxyType::Sidecar => {
                // Catch-alls for traffic to unresolved routes and unknown
                // listener ports. Observers are not called for these.
                outbound.push(sinks::build_blackhole_cluster(env));
                outbound.push(sinks::build_default_passthrough_cluster(env));
                locality::apply_locality_lb_setting(
                    &proxy.locality,
                    &mut outbound,
                    env.mesh.locality_lb_setting.as_ref(),
                );

                let instances = match env.discovery.proxy_service_instances(proxy) {
                    Ok(instances) => instances,
                    Err(error) => {
                        tracing::error!(proxy = %proxy.id, %error, "failed to list proxy service instances");
                        Vec::new()
                    }
                };
                let mut management_ports: Vec<Port> = Vec::new();
                for ip in &proxy.ip_addresses {
                    management_ports.extend(env.discovery.management_ports(*ip));
                }

                let mut inbound =
                    self.build_inbound_clusters(env, proxy, push, &instances, &management_ports);
                inbound.extend(inbound::build_inbound_passthrough_clusters(env, proxy));

                outbound.extend(inbound);
                outbound
            }
            ProxyType::Router => {
                // Gateways have no original-destination listeners, so no
                // default passthrough and no inbound clusters.
                outbound.push(sinks::build_blackhole_cluster(env));
                if proxy.router_mode() == RouterMode::SniDnat {
                    outbound.extend(self.build_outbound_sni_dnat_clusters(env, proxy, push));
                }
                locality::apply_locality_lb_setting(
                    &proxy.locality,
                    &mut outbound,
                    env.mesh.locality_lb_setting.as_ref(),
                );
                outbound
            }
        };

        self.normalize_clusters(push, proxy, clusters)
    }

    /// Resolves name conflicts: conflicting service definitions can yield
    /// duplicate names. The first cluster wins; rejections are recorded.
    fn normalize_clusters(
        &self,
        push: &PushContext,
        proxy: &Proxy,
        clusters: Vec<xds::Cluster>,
    ) -> Vec<xds::Cluster> {
        let mut have = AHashSet::with_capacity(clusters.len());
        let mut out = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            if have.contains(cluster.name.as_str()) {
                self.metrics.record_duplicate(proxy);
                push.add_event(PushEvent {
                    kind: EventKind::DuplicateCluster,
                    key: cluster.name.clone(),
                    proxy_id: proxy.id.clone(),
                    message: format!("duplicate cluster {} found while pushing", cluster.name),
                });
                continue;
            }
            have.insert(cluster.name.clone());
            out.push(cluster);
        }
        out
    }
}
