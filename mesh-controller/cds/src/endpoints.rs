use mesh_controller_core::{Environment, Labels, Locality, Resolution, Service};
use mesh_controller_xds as xds;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) const UNIX_ADDRESS_PREFIX: &str = "unix://";

/// Weights are scaled onto this shared denominator so the data plane sees
/// comparable locality weights regardless of endpoint counts.
const LOCALITY_WEIGHT_SCALE: u64 = 128;

pub(crate) fn build_address(address: &str, port: u16) -> xds::Address {
    match address.strip_prefix(UNIX_ADDRESS_PREFIX) {
        Some(path) => xds::Address::Pipe {
            path: path.to_string(),
        },
        None => xds::Address::Socket(xds::SocketAddress {
            address: address.to_string(),
            port: u32::from(port),
        }),
    }
}

/// Expands a (service, port, selectors) triple into locality-grouped
/// load-balancing endpoints, filtered by the proxy's network view. Only
/// DNS-resolved services carry inline endpoints; every other resolution
/// defers to endpoint discovery and yields nothing here.
pub(crate) fn build_locality_lb_endpoints(
    env: &Environment,
    network_view: &BTreeSet<String>,
    service: &Service,
    port: u16,
    selectors: &[Labels],
) -> Vec<xds::LocalityLbEndpoints> {
    if service.resolution != Resolution::Dns {
        return Vec::new();
    }

    let instances = match env.discovery.instances_by_port(service, port, selectors) {
        Ok(instances) => instances,
        Err(error) => {
            tracing::error!(service = %service.hostname, %error, "failed to retrieve instances");
            return Vec::new();
        }
    };

    let mut by_locality: BTreeMap<String, Vec<xds::LbEndpoint>> = BTreeMap::new();
    for instance in instances {
        // Endpoints outside the proxy's network view are invisible. The
        // unnamed network must be present in the view explicitly.
        if !network_view.contains(instance.endpoint.network.as_str()) {
            continue;
        }

        let weight = if instance.endpoint.lb_weight > 0 {
            instance.endpoint.lb_weight
        } else {
            1
        };
        let mut metadata = BTreeMap::new();
        if !instance.endpoint.uid.is_empty() {
            metadata.insert("uid".to_string(), instance.endpoint.uid.clone());
        }
        if !instance.endpoint.network.is_empty() {
            metadata.insert("network".to_string(), instance.endpoint.network.clone());
        }
        if instance.mtls_ready {
            metadata.insert(xds::MTLS_READY_LABEL.to_string(), "true".to_string());
        }

        by_locality
            .entry(instance.endpoint.locality.clone())
            .or_default()
            .push(xds::LbEndpoint {
                address: build_address(&instance.endpoint.address, instance.endpoint.port),
                load_balancing_weight: Some(weight),
                metadata,
            });
    }

    let mut groups = Vec::with_capacity(by_locality.len());
    for (locality, lb_endpoints) in by_locality {
        let weight = lb_endpoints
            .iter()
            .map(|e| e.load_balancing_weight.unwrap_or(0))
            .sum();
        groups.push(xds::LocalityLbEndpoints {
            locality: convert_locality(&locality),
            lb_endpoints,
            load_balancing_weight: Some(weight),
            priority: 0,
        });
    }
    normalize_locality_weights(groups)
}

/// A single local endpoint, ungrouped, as used by inbound clusters.
pub(crate) fn build_inbound_locality_lb_endpoints(
    bind: &str,
    port: u16,
) -> Vec<xds::LocalityLbEndpoints> {
    vec![xds::LocalityLbEndpoints {
        locality: None,
        lb_endpoints: vec![xds::LbEndpoint {
            address: build_address(bind, port),
            load_balancing_weight: None,
            metadata: BTreeMap::new(),
        }],
        load_balancing_weight: None,
        priority: 0,
    }]
}

fn convert_locality(locality: &str) -> Option<xds::Locality> {
    if locality.is_empty() {
        return None;
    }
    let parsed = Locality::parse(locality);
    Some(xds::Locality {
        region: parsed.region,
        zone: parsed.zone,
        sub_zone: parsed.sub_zone,
    })
}

fn normalize_locality_weights(
    mut groups: Vec<xds::LocalityLbEndpoints>,
) -> Vec<xds::LocalityLbEndpoints> {
    let total: u64 = groups
        .iter()
        .map(|g| u64::from(g.load_balancing_weight.unwrap_or(0)))
        .sum();
    if total == 0 {
        return groups;
    }
    for group in &mut groups {
        let weight = u64::from(group.load_balancing_weight.unwrap_or(0));
        let scaled = (weight * LOCALITY_WEIGHT_SCALE) as f64 / total as f64;
        group.load_balancing_weight = Some(scaled.ceil() as u32);
    }
    groups
}
