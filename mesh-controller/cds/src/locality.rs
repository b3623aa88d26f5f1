use mesh_controller_core::{Locality, LocalityDistribute, LocalityFailover, LocalityLbSetting};
use mesh_controller_xds as xds;

/// Applies locality-aware load balancing across the clusters that carry a
/// load assignment. Distribute rules rewrite locality weights; failover
/// assigns priorities, and is only armed when the cluster has outlier
/// detection (without ejection, failover would never trigger).
pub(crate) fn apply_locality_lb_setting(
    locality: &Locality,
    clusters: &mut [xds::Cluster],
    setting: Option<&LocalityLbSetting>,
) {
    let Some(setting) = setting else { return };
    if locality.is_empty() {
        return;
    }

    for cluster in clusters {
        let enable_failover = cluster.outlier_detection.is_some();
        if let Some(assignment) = &mut cluster.load_assignment {
            if !setting.distribute.is_empty() {
                apply_locality_weights(locality, assignment, &setting.distribute);
            } else if enable_failover {
                apply_locality_failover(locality, assignment, &setting.failover);
            }
        }
    }
}

/// Rewrites locality-group weights from the first distribute rule matching
/// the proxy locality. Groups without a matching `to` entry are dropped.
fn apply_locality_weights(
    locality: &Locality,
    assignment: &mut xds::ClusterLoadAssignment,
    distribute: &[LocalityDistribute],
) {
    let Some(rule) = distribute
        .iter()
        .find(|d| locality_match(locality, &d.from))
    else {
        return;
    };

    let groups = std::mem::take(&mut assignment.endpoints);
    assignment.endpoints = groups
        .into_iter()
        .filter_map(|mut group| {
            let group_locality = group.locality.as_ref().map_or_else(Locality::default, |l| {
                Locality {
                    region: l.region.clone(),
                    zone: l.zone.clone(),
                    sub_zone: l.sub_zone.clone(),
                }
            });
            let weight = rule
                .to
                .iter()
                .filter(|(pattern, _)| locality_match(&group_locality, pattern))
                .max_by_key(|(pattern, _)| specificity(pattern))
                .map(|(_, weight)| *weight)?;
            group.load_balancing_weight = Some(weight);
            Some(group)
        })
        .collect();
}

/// Priorities: 0 full match, 1 region+zone, 2 region, 3 explicit failover
/// region, 4 everything else.
fn apply_locality_failover(
    locality: &Locality,
    assignment: &mut xds::ClusterLoadAssignment,
    failover: &[LocalityFailover],
) {
    for group in &mut assignment.endpoints {
        group.priority = failover_priority(locality, group.locality.as_ref(), failover);
    }
}

fn failover_priority(
    locality: &Locality,
    group: Option<&xds::Locality>,
    failover: &[LocalityFailover],
) -> u32 {
    let Some(group) = group else { return 4 };
    if group.region == locality.region {
        if group.zone == locality.zone {
            if group.sub_zone == locality.sub_zone {
                return 0;
            }
            return 1;
        }
        return 2;
    }
    if failover
        .iter()
        .any(|f| f.from == locality.region && f.to == group.region)
    {
        return 3;
    }
    4
}

/// Matches a locality against a slash-delimited pattern. `*` and omitted
/// segments match anything.
fn locality_match(locality: &Locality, pattern: &str) -> bool {
    let mut parts = pattern.splitn(3, '/');
    let region = parts.next().unwrap_or("");
    let zone = parts.next().unwrap_or("");
    let sub_zone = parts.next().unwrap_or("");
    segment_match(&locality.region, region)
        && segment_match(&locality.zone, zone)
        && segment_match(&locality.sub_zone, sub_zone)
}

fn segment_match(value: &str, pattern: &str) -> bool {
    pattern.is_empty() || pattern == "*" || pattern == value
}

fn specificity(pattern: &str) -> usize {
    pattern
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "*")
        .count()
}
