use crate::factory::default_circuit_breaker_thresholds;
use crate::tls;
use mesh_controller_core::{
    ConnectionPool, Environment, LoadBalancerSettings, OutlierDetection, Port, Protocol, Proxy,
    SimpleLb, TcpSettings, TlsSettings, TrafficPolicy,
};
use mesh_controller_xds as xds;
use xds::TrafficDirection;

/// Whether the cluster is built for SNI forwarding (no TLS of its own) or
/// as a regular upstream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ClusterMode {
    Default,
    SniDnat,
}

pub(crate) struct ApplyPolicyOpts<'a> {
    pub env: &'a Environment,
    pub proxy: &'a Proxy,
    pub policy: Option<&'a TrafficPolicy>,
    pub port: Option<&'a Port>,
    pub service_accounts: &'a [String],
    pub sni: &'a str,
    pub cluster_mode: ClusterMode,
    pub direction: TrafficDirection,
    pub mesh_external: bool,
}

/// Picks the effective facets for a port. Port-level settings are authored
/// as complete overrides, not deltas: the first matching entry replaces all
/// four facets, nulls included.
pub(crate) fn select_traffic_policy_components<'a>(
    policy: Option<&'a TrafficPolicy>,
    port: Option<&Port>,
) -> (
    Option<&'a ConnectionPool>,
    Option<&'a OutlierDetection>,
    Option<&'a LoadBalancerSettings>,
    Option<&'a TlsSettings>,
) {
    let Some(policy) = policy else {
        return (None, None, None, None);
    };

    if let Some(port) = port {
        for settings in &policy.port_level_settings {
            if settings.port == Some(port.number) {
                return (
                    settings.connection_pool.as_ref(),
                    settings.outlier_detection.as_ref(),
                    settings.load_balancer.as_ref(),
                    settings.tls.as_ref(),
                );
            }
        }
    }

    (
        policy.connection_pool.as_ref(),
        policy.outlier_detection.as_ref(),
        policy.load_balancer.as_ref(),
        policy.tls.as_ref(),
    )
}

pub(crate) fn apply_traffic_policy(cluster: &mut xds::Cluster, opts: &ApplyPolicyOpts<'_>) {
    let (connection_pool, outlier, lb, tls_settings) =
        select_traffic_policy_components(opts.policy, opts.port);

    apply_connection_pool(opts.env, cluster, connection_pool, opts.direction);
    apply_outlier_detection(cluster, outlier);
    apply_load_balancer(opts.env, cluster, lb, opts.port);

    // SNI-DNAT clusters forward TLS as-is and never carry their own.
    if opts.cluster_mode != ClusterMode::SniDnat {
        let auto_mtls = opts.env.mesh.enable_auto_mtls;
        let (resolved, origin) = tls::resolve_upstream_tls(
            tls_settings,
            opts.service_accounts,
            opts.sni,
            opts.proxy,
            auto_mtls,
            opts.mesh_external,
        );
        tls::apply_upstream_tls(opts.env, cluster, resolved.as_deref(), origin, opts.proxy);
    }
}

/// Zero-valued knobs are indistinguishable from unset ones in the source
/// representation and are skipped.
pub(crate) fn apply_connection_pool(
    env: &Environment,
    cluster: &mut xds::Cluster,
    settings: Option<&ConnectionPool>,
    direction: TrafficDirection,
) {
    let Some(settings) = settings else { return };

    let mut threshold = default_circuit_breaker_thresholds(direction);
    let mut idle_timeout = None;

    if let Some(http) = &settings.http {
        if http.http2_max_requests > 0 {
            // The data plane only applies max_requests to HTTP/2 clusters.
            threshold.max_requests = Some(http.http2_max_requests);
        }
        if http.http1_max_pending_requests > 0 {
            threshold.max_pending_requests = Some(http.http1_max_pending_requests);
        }
        if http.max_requests_per_connection > 0 {
            cluster.max_requests_per_connection = Some(http.max_requests_per_connection);
        }
        if http.max_retries > 0 {
            threshold.max_retries = Some(http.max_retries);
        }
        idle_timeout = http.idle_timeout;
    }

    if let Some(tcp) = &settings.tcp {
        if let Some(timeout) = tcp.connect_timeout {
            cluster.connect_timeout = Some(timeout);
        }
        if tcp.max_connections > 0 {
            threshold.max_connections = Some(tcp.max_connections);
        }
        apply_tcp_keepalive(env, cluster, tcp);
    }

    cluster.circuit_breakers = Some(xds::CircuitBreakers {
        thresholds: vec![threshold],
    });

    if let Some(idle) = idle_timeout {
        cluster.common_http_protocol_options = Some(xds::HttpProtocolOptions {
            idle_timeout: Some(idle),
        });
    }
}

fn apply_tcp_keepalive(env: &Environment, cluster: &mut xds::Cluster, tcp: &TcpSettings) {
    let mut probes = 0;
    let mut time = None;
    let mut interval = None;
    let mut keepalive_set = false;

    if let Some(keepalive) = &env.mesh.tcp_keepalive {
        probes = keepalive.probes;
        time = keepalive.time;
        interval = keepalive.interval;
        keepalive_set = true;
    }

    // A per-policy keepalive overrides the mesh-wide one wholesale.
    if let Some(keepalive) = &tcp.tcp_keepalive {
        probes = keepalive.probes;
        time = keepalive.time;
        interval = keepalive.interval;
        keepalive_set = true;
    }

    if !keepalive_set {
        return;
    }

    // The empty keepalive record still sets SO_KEEPALIVE on the socket;
    // unset fields are omitted so OS defaults apply.
    let mut keepalive = xds::TcpKeepalive::default();
    if probes > 0 {
        keepalive.keepalive_probes = Some(probes);
    }
    if let Some(time) = time {
        keepalive.keepalive_time = Some(time.as_secs() as u32);
    }
    if let Some(interval) = interval {
        keepalive.keepalive_interval = Some(interval.as_secs() as u32);
    }
    cluster.upstream_connection_options = Some(xds::UpstreamConnectionOptions {
        tcp_keepalive: keepalive,
    });
}

pub(crate) fn apply_outlier_detection(
    cluster: &mut xds::Cluster,
    outlier: Option<&OutlierDetection>,
) {
    let Some(outlier) = outlier else { return };

    let mut out = xds::OutlierDetection::default();
    if let Some(time) = outlier.base_ejection_time {
        out.base_ejection_time = Some(time);
    }
    if outlier.consecutive_errors > 0 {
        // Only gateway-class failures count toward ejection; plain 5xx
        // responses do not.
        out.enforcing_consecutive_gateway_failure = Some(100);
        out.enforcing_consecutive_5xx = Some(0);
        out.consecutive_gateway_failure = Some(outlier.consecutive_errors);
    }
    if let Some(interval) = outlier.interval {
        out.interval = Some(interval);
    }
    if outlier.max_ejection_percent > 0 {
        out.max_ejection_percent = Some(outlier.max_ejection_percent);
    }
    cluster.outlier_detection = Some(out);

    // The data plane's 50% healthy-panic default rarely fits meshes with
    // few endpoints per service; 0 disables it.
    if outlier.min_health_percent >= 0 {
        cluster
            .common_lb_config
            .get_or_insert_with(Default::default)
            .healthy_panic_threshold = Some(f64::from(outlier.min_health_percent));
    }
}

pub(crate) fn apply_load_balancer(
    env: &Environment,
    cluster: &mut xds::Cluster,
    lb: Option<&LoadBalancerSettings>,
    port: Option<&Port>,
) {
    if cluster.outlier_detection.is_some() {
        cluster
            .common_lb_config
            .get_or_insert_with(Default::default)
            .locality_weighted_lb_config = true;
    }

    let Some(lb) = lb else { return };

    // Original-destination discovery must keep its own balancer, and takes
    // precedence over protocol defaults: a passthrough cluster on a
    // redis-named port must not end up MAGLEV.
    if cluster.discovery_type == xds::DiscoveryType::OriginalDst {
        cluster.lb_policy = xds::LbPolicy::ClusterProvided;
        return;
    }

    // Redis benefits from client-side sharding when the filter is enabled.
    if env.mesh.features.enable_redis_filter
        && port.is_some_and(|p| p.protocol == Protocol::Redis)
    {
        cluster.lb_policy = xds::LbPolicy::Maglev;
        return;
    }

    match lb {
        LoadBalancerSettings::Simple(simple) => match simple {
            SimpleLb::LeastConn => cluster.lb_policy = xds::LbPolicy::LeastRequest,
            SimpleLb::Random => cluster.lb_policy = xds::LbPolicy::Random,
            SimpleLb::RoundRobin => cluster.lb_policy = xds::LbPolicy::RoundRobin,
            SimpleLb::Passthrough => {
                cluster.lb_policy = xds::LbPolicy::ClusterProvided;
                cluster.discovery_type = xds::DiscoveryType::OriginalDst;
            }
        },
        LoadBalancerSettings::ConsistentHash(hash) => {
            // 0 is indistinguishable from unset; the data-plane default
            // ring size applies.
            let minimum_ring_size = if hash.minimum_ring_size != 0 {
                hash.minimum_ring_size
            } else {
                1024
            };
            cluster.lb_policy = xds::LbPolicy::RingHash;
            cluster.lb_config = Some(xds::LbConfig::RingHashLbConfig { minimum_ring_size });
        }
    }
}

const H2_MAX_CONCURRENT_STREAMS: u32 = 1 << 30;

/// HTTP/2 ports advertise HTTP/2 upstream; sniffed ports additionally
/// follow the downstream protocol.
pub(crate) fn set_upstream_protocol(
    env: &Environment,
    cluster: &mut xds::Cluster,
    port: &Port,
    direction: TrafficDirection,
) {
    if port.protocol.is_http2() {
        cluster.http2_protocol_options = Some(xds::Http2ProtocolOptions {
            // The data-plane default of 100 concurrent streams is too low
            // for the data path.
            max_concurrent_streams: Some(H2_MAX_CONCURRENT_STREAMS),
        });
    }

    let sniffing = match direction {
        TrafficDirection::Inbound => env.mesh.features.inbound_protocol_sniffing,
        TrafficDirection::Outbound => env.mesh.features.outbound_protocol_sniffing,
    };
    if sniffing && port.protocol.is_unsupported() {
        cluster.http2_protocol_options = Some(xds::Http2ProtocolOptions {
            max_concurrent_streams: Some(H2_MAX_CONCURRENT_STREAMS),
        });
        cluster.protocol_selection = xds::ProtocolSelection::UseDownstreamProtocol;
    }
}
