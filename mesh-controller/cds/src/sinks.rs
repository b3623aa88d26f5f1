use crate::policy;
use mesh_controller_core::{ConnectionPool, Environment, TcpSettings};
use mesh_controller_xds as xds;
use xds::TrafficDirection;

/// Catches traffic to unresolved destinations and drops it: static
/// discovery with no endpoints.
pub(crate) fn build_blackhole_cluster(env: &Environment) -> xds::Cluster {
    let mut cluster = xds::Cluster::new(xds::BLACK_HOLE_CLUSTER, xds::DiscoveryType::Static);
    cluster.connect_timeout = Some(env.mesh.connect_timeout);
    cluster.lb_policy = xds::LbPolicy::RoundRobin;
    cluster
}

/// Catches traffic to unknown listener ports and forwards it to the
/// address the client dialed.
pub(crate) fn build_default_passthrough_cluster(env: &Environment) -> xds::Cluster {
    let mut cluster = xds::Cluster::new(xds::PASSTHROUGH_CLUSTER, xds::DiscoveryType::OriginalDst);
    cluster.connect_timeout = Some(env.mesh.connect_timeout);
    cluster.lb_policy = xds::LbPolicy::ClusterProvided;
    // The connection limit is not configurable on this path; raise it far
    // enough that outbound connections are effectively unlimited.
    let settings = ConnectionPool {
        tcp: Some(TcpSettings {
            max_connections: 1024 * 100,
            ..Default::default()
        }),
        http: None,
    };
    policy::apply_connection_pool(env, &mut cluster, Some(&settings), TrafficDirection::Outbound);
    cluster
}
