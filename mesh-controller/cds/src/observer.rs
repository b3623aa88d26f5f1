use mesh_controller_core::{Environment, Port, Proxy, Service, ServiceInstance};
use mesh_controller_xds as xds;
use std::sync::Arc;

/// Inputs describing the cluster being observed.
pub struct ObserverContext<'a> {
    pub env: &'a Environment,
    pub proxy: &'a Proxy,
    pub service: Option<&'a Arc<Service>>,
    pub port: Option<&'a Port>,
    pub instance: Option<&'a ServiceInstance>,
}

/// Post-hooks fired once per generated outbound/inbound cluster. Hooks may
/// mutate the cluster in place but must not rely on seeing sinks or
/// SNI-DNAT variants.
pub trait ClusterObserver: Send + Sync {
    fn on_outbound_cluster(&self, _ctx: &ObserverContext<'_>, _cluster: &mut xds::Cluster) {}

    fn on_inbound_cluster(&self, _ctx: &ObserverContext<'_>, _cluster: &mut xds::Cluster) {}
}
