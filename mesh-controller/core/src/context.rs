use super::mesh::MeshConfig;
use super::proxy::Proxy;
use super::service::{Hostname, Labels, Port, Service, ServiceInstance};
use super::traffic_policy::DestinationRuleConfig;
use ahash::AHashMap as HashMap;
use anyhow::Result;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;

/// Read-only endpoint discovery as seen by the cluster builder. Queries may
/// fail; failures degrade the affected endpoint list to empty.
pub trait ServiceDiscovery: Send + Sync {
    /// Instances of `service` on `port` matching any of `selectors`
    /// (no selectors selects all).
    fn instances_by_port(
        &self,
        service: &Service,
        port: u16,
        selectors: &[Labels],
    ) -> Result<Vec<ServiceInstance>>;

    /// Instances co-located with the given proxy (matched by address).
    fn proxy_service_instances(&self, proxy: &Proxy) -> Result<Vec<ServiceInstance>>;

    /// Health-check and admin ports exposed at the given workload address.
    fn management_ports(&self, addr: IpAddr) -> Vec<Port>;
}

/// Everything the builder reads besides the per-push service tables.
#[derive(Clone)]
pub struct Environment {
    pub mesh: MeshConfig,
    pub discovery: Arc<dyn ServiceDiscovery>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    DuplicateCluster,
}

#[derive(Clone, Debug)]
pub struct PushEvent {
    pub kind: EventKind,
    pub key: String,
    pub proxy_id: String,
    pub message: String,
}

/// Frozen per-push view of the mesh: visible services, destination rules,
/// and service accounts. The event recorder is the only writable member and
/// is internally synchronized, append-only.
#[derive(Default)]
pub struct PushContext {
    services: Vec<Arc<Service>>,
    destination_rules: HashMap<Hostname, Arc<DestinationRuleConfig>>,
    service_accounts: HashMap<(Hostname, u16), Vec<String>>,
    events: Mutex<Vec<PushEvent>>,
}

impl PushContext {
    pub fn new(
        mut services: Vec<Arc<Service>>,
        destination_rules: HashMap<Hostname, Arc<DestinationRuleConfig>>,
        mut service_accounts: HashMap<(Hostname, u16), Vec<String>>,
    ) -> Self {
        // The service walk drives emission order, so it must be stable.
        services.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        for accounts in service_accounts.values_mut() {
            accounts.sort();
        }
        Self {
            services,
            destination_rules,
            service_accounts,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Services visible to the given proxy, in hostname order.
    pub fn services(&self, proxy: &Proxy) -> Vec<Arc<Service>> {
        match proxy.sidecar_scope.as_ref().and_then(|s| s.services.as_ref()) {
            Some(visible) => self
                .services
                .iter()
                .filter(|svc| visible.contains(&svc.hostname))
                .cloned()
                .collect(),
            None => self.services.clone(),
        }
    }

    pub fn destination_rule(&self, host: &Hostname) -> Option<&Arc<DestinationRuleConfig>> {
        self.destination_rules.get(host)
    }

    pub fn service_accounts(&self, host: &Hostname, port: u16) -> &[String] {
        self.service_accounts
            .get(&(host.clone(), port))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_event(&self, event: PushEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<PushEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProxyType, SidecarScope};

    fn service(hostname: &str) -> Arc<Service> {
        Arc::new(Service {
            hostname: hostname.into(),
            ..Default::default()
        })
    }

    #[test]
    fn services_are_sorted_by_hostname() {
        let push = PushContext::new(
            vec![service("b.example.com"), service("a.example.com")],
            HashMap::default(),
            HashMap::default(),
        );
        let names: Vec<_> = push
            .services(&Proxy::default())
            .iter()
            .map(|s| s.hostname.clone())
            .collect();
        assert_eq!(
            names,
            vec![Hostname::from("a.example.com"), Hostname::from("b.example.com")]
        );
    }

    #[test]
    fn sidecar_scope_limits_visibility() {
        let push = PushContext::new(
            vec![service("a.example.com"), service("b.example.com")],
            HashMap::default(),
            HashMap::default(),
        );
        let proxy = Proxy {
            proxy_type: ProxyType::Sidecar,
            sidecar_scope: Some(SidecarScope {
                name: "scope".to_string(),
                namespace: "default".to_string(),
                services: Some(vec!["b.example.com".into()]),
                ingress: Vec::new(),
            }),
            ..Default::default()
        };
        let visible = push.services(&proxy);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].hostname, Hostname::from("b.example.com"));
    }
}
