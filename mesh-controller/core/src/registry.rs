use super::context::ServiceDiscovery;
use super::proxy::Proxy;
use super::service::{Labels, Port, Service, ServiceInstance};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use std::net::IpAddr;

/// In-memory service discovery backing the builder: populated from the
/// declarative configuration stream, or directly in tests.
#[derive(Default, Debug)]
pub struct MemRegistry {
    instances: Vec<ServiceInstance>,
    management_ports: HashMap<IpAddr, Vec<Port>>,
}

impl MemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&mut self, instance: ServiceInstance) {
        self.instances.push(instance);
    }

    pub fn set_management_ports(&mut self, addr: IpAddr, ports: Vec<Port>) {
        self.management_ports.insert(addr, ports);
    }
}

fn selector_matches(selectors: &[Labels], labels: &Labels) -> bool {
    if selectors.is_empty() {
        return true;
    }
    selectors
        .iter()
        .any(|sel| sel.iter().all(|(k, v)| labels.get(k) == Some(v)))
}

impl ServiceDiscovery for MemRegistry {
    fn instances_by_port(
        &self,
        service: &Service,
        port: u16,
        selectors: &[Labels],
    ) -> Result<Vec<ServiceInstance>> {
        Ok(self
            .instances
            .iter()
            .filter(|i| i.service.hostname == service.hostname)
            .filter(|i| i.endpoint.service_port.number == port)
            .filter(|i| selector_matches(selectors, &i.labels))
            .cloned()
            .collect())
    }

    fn proxy_service_instances(&self, proxy: &Proxy) -> Result<Vec<ServiceInstance>> {
        Ok(self
            .instances
            .iter()
            .filter(|i| {
                i.endpoint
                    .address
                    .parse::<IpAddr>()
                    .is_ok_and(|ip| proxy.ip_addresses.contains(&ip))
            })
            .cloned()
            .collect())
    }

    fn management_ports(&self, addr: IpAddr) -> Vec<Port> {
        self.management_ports.get(&addr).cloned().unwrap_or_default()
    }
}
