use crate::policy;
use mesh_controller_core::{
    ConfigMeta, ConnectionPool, Environment, Hostname, LoadBalancerSettings, Port, Proxy,
    ProxyType, Resolution, ServiceAttributes, ServiceRegistry, SimpleLb, TcpSettings,
};
use mesh_controller_xds as xds;
use xds::TrafficDirection;

/// Hostname used for inbound management-port clusters.
pub(crate) const MANAGEMENT_CLUSTER_HOSTNAME: &str = "mgmtCluster";

const SERVICE_STAT_PATTERN: &str = "%SERVICE%";
const SERVICE_FQDN_STAT_PATTERN: &str = "%SERVICE_FQDN%";
const SERVICE_PORT_STAT_PATTERN: &str = "%SERVICE_PORT%";
const SERVICE_PORT_NAME_STAT_PATTERN: &str = "%SERVICE_PORT_NAME%";
const SUBSET_NAME_STAT_PATTERN: &str = "%SUBSET_NAME%";

pub(crate) fn default_circuit_breaker_thresholds(direction: TrafficDirection) -> xds::Thresholds {
    match direction {
        TrafficDirection::Inbound => xds::Thresholds::default(),
        // The data plane's default of 3 parallel retries is insufficient
        // during endpoint churn, surfacing as client-facing 503s before an
        // updated endpoint list arrives.
        TrafficDirection::Outbound => xds::Thresholds {
            max_retries: Some(1024),
            ..Default::default()
        },
    }
}

pub(crate) fn convert_resolution(proxy: &Proxy, resolution: Resolution) -> xds::DiscoveryType {
    match resolution {
        Resolution::ClientSide => xds::DiscoveryType::Eds,
        Resolution::Dns => xds::DiscoveryType::StrictDns,
        Resolution::Passthrough => {
            // Gateways cannot use passthrough clusters.
            if proxy.proxy_type == ProxyType::Sidecar {
                xds::DiscoveryType::OriginalDst
            } else {
                xds::DiscoveryType::Eds
            }
        }
        Resolution::DnsRoundRobin => xds::DiscoveryType::Eds,
    }
}

/// Assembles a cluster with the mesh-wide defaults applied: inline
/// endpoints for Static/StrictDNS, DNS knobs for StrictDNS, and the default
/// LB and connection-pool facets. TLS is never applied here; the outbound
/// generator owns TLS.
pub(crate) fn build_default_cluster(
    env: &Environment,
    name: String,
    discovery_type: xds::DiscoveryType,
    endpoints: Vec<xds::LocalityLbEndpoints>,
    direction: TrafficDirection,
    port: Option<&Port>,
) -> xds::Cluster {
    let mut cluster = xds::Cluster::new(name, discovery_type);

    if discovery_type == xds::DiscoveryType::StrictDns {
        cluster.dns_lookup_family = Some(xds::DnsLookupFamily::V4Only);
        cluster.dns_refresh_rate = Some(env.mesh.dns_refresh_rate);
        cluster.respect_dns_ttl = env.mesh.features.respect_dns_ttl;
    }

    if matches!(
        discovery_type,
        xds::DiscoveryType::Static | xds::DiscoveryType::StrictDns
    ) {
        cluster.load_assignment = Some(xds::ClusterLoadAssignment {
            cluster_name: cluster.name.clone(),
            endpoints,
        });
    }

    let simple = if discovery_type == xds::DiscoveryType::OriginalDst {
        SimpleLb::Passthrough
    } else {
        SimpleLb::RoundRobin
    };
    policy::apply_load_balancer(
        env,
        &mut cluster,
        Some(&LoadBalancerSettings::Simple(simple)),
        port,
    );

    let default_pool = ConnectionPool {
        tcp: Some(TcpSettings {
            connect_timeout: Some(env.mesh.connect_timeout),
            ..Default::default()
        }),
        http: None,
    };
    policy::apply_connection_pool(env, &mut cluster, Some(&default_pool), direction);

    cluster
}

/// Dynamic clusters reference their own name on the aggregated discovery
/// stream; they never carry inline endpoints.
pub(crate) fn update_eds(env: &Environment, cluster: &mut xds::Cluster) {
    if cluster.discovery_type != xds::DiscoveryType::Eds {
        return;
    }
    cluster.eds_cluster_config = Some(xds::EdsClusterConfig {
        service_name: cluster.name.clone(),
        eds_config: xds::ConfigSource {
            specifier: xds::ConfigSourceSpecifier::Ads,
            initial_fetch_timeout: Some(env.mesh.features.initial_fetch_timeout),
        },
    });
}

pub(crate) fn alt_stat_name(
    pattern: &str,
    host: &Hostname,
    subset: &str,
    port: &Port,
    attributes: &ServiceAttributes,
) -> String {
    pattern
        .replace(SERVICE_STAT_PATTERN, &short_host_name(host, attributes))
        .replace(SERVICE_FQDN_STAT_PATTERN, host.as_str())
        .replace(SUBSET_NAME_STAT_PATTERN, subset)
        .replace(SERVICE_PORT_STAT_PATTERN, &port.number.to_string())
        .replace(SERVICE_PORT_NAME_STAT_PATTERN, &port.name)
}

/// Kubernetes hostnames shorten to `<name>.<namespace>`; other hosts keep
/// the full hostname.
fn short_host_name(host: &Hostname, attributes: &ServiceAttributes) -> String {
    if attributes.registry == ServiceRegistry::Kubernetes {
        format!("{}.{}", attributes.name, attributes.namespace)
    } else {
        host.to_string()
    }
}

pub(crate) fn lineage_metadata(meta: &ConfigMeta) -> xds::Lineage {
    xds::Lineage {
        kind: "destination-rule".to_string(),
        name: meta.name.clone(),
        namespace: meta.namespace.clone(),
        resource_version: meta.resource_version.clone(),
    }
}
