use anyhow::{anyhow, Result};
use mesh_controller_core::{
    Environment, Labels, MemRegistry, MeshConfig, NetworkEndpoint, Port, Protocol, Proxy,
    Service, ServiceDiscovery, ServiceInstance,
};
use std::net::IpAddr;
use std::sync::Arc;

pub(crate) fn test_env() -> Environment {
    test_env_with_registry(MemRegistry::new())
}

pub(crate) fn test_env_with_registry(registry: MemRegistry) -> Environment {
    Environment {
        mesh: MeshConfig::default(),
        discovery: Arc::new(registry),
    }
}

/// A registry whose queries always fail, for degraded-path tests.
pub(crate) fn failing_env() -> Environment {
    struct FailingDiscovery;

    impl ServiceDiscovery for FailingDiscovery {
        fn instances_by_port(
            &self,
            _service: &Service,
            _port: u16,
            _selectors: &[Labels],
        ) -> Result<Vec<ServiceInstance>> {
            Err(anyhow!("registry unavailable"))
        }

        fn proxy_service_instances(&self, _proxy: &Proxy) -> Result<Vec<ServiceInstance>> {
            Err(anyhow!("registry unavailable"))
        }

        fn management_ports(&self, _addr: IpAddr) -> Vec<Port> {
            Vec::new()
        }
    }

    Environment {
        mesh: MeshConfig::default(),
        discovery: Arc::new(FailingDiscovery),
    }
}

pub(crate) fn instance_with(
    service: &Arc<Service>,
    port: u16,
    address: &str,
    network: &str,
    locality: &str,
    weight: u32,
    mtls_ready: bool,
) -> ServiceInstance {
    ServiceInstance {
        service: service.clone(),
        endpoint: NetworkEndpoint {
            address: address.to_string(),
            port,
            service_port: Port::new(port, "http", Protocol::Http),
            network: network.to_string(),
            locality: locality.to_string(),
            lb_weight: weight,
            ..Default::default()
        },
        labels: Labels::default(),
        service_account: String::new(),
        mtls_ready,
    }
}
