use mesh_controller_core::{Proxy, ProxyType};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::{counter::Counter, family::Family};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ProxyLabels {
    proxy_type: &'static str,
}

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    duplicate_clusters: Family<ProxyLabels, Counter>,
}

impl Metrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "duplicate_clusters",
            "Clusters dropped during normalization because the name was already emitted",
            metrics.duplicate_clusters.clone(),
        );
        metrics
    }

    pub(crate) fn record_duplicate(&self, proxy: &Proxy) {
        let proxy_type = match proxy.proxy_type {
            ProxyType::Sidecar => "sidecar",
            ProxyType::Router => "router",
        };
        self.duplicate_clusters
            .get_or_create(&ProxyLabels { proxy_type })
            .inc();
    }
}
