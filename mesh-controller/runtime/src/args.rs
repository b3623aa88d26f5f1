use anyhow::{anyhow, Result};
use clap::Parser;
use mesh_controller_core::{
    InterceptionMode, Locality, MeshConfig, Proxy, ProxyMetadata, ProxyType, RouterMode,
};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(name = "mesh-controller", about = "Mesh-controller cluster generation")]
pub struct Args {
    #[clap(
        long,
        default_value = "mesh_controller=info,warn",
        env = "MESH_CONTROLLER_LOG"
    )]
    pub log_level: String,

    #[clap(long, default_value = "plain")]
    pub log_format: LogFormat,

    /// Path to the declarative mesh configuration stream.
    #[clap(long)]
    pub config: PathBuf,

    /// Identity of the proxy to build clusters for.
    #[clap(long, default_value = "sidecar~127.0.0.1~default")]
    pub proxy_id: String,

    #[clap(long, default_value = "sidecar")]
    pub proxy_type: ProxyType,

    #[clap(long = "proxy-ip", default_value = "127.0.0.1")]
    pub proxy_ips: Vec<IpAddr>,

    /// Proxy locality as `region/zone/subzone`.
    #[clap(long, default_value = "")]
    pub locality: String,

    #[clap(long, default_value = "redirect")]
    pub interception_mode: InterceptionMode,

    #[clap(long, default_value = "standard")]
    pub router_mode: RouterMode,

    /// Networks whose endpoints the proxy may see; repeatable. The unnamed
    /// network is always included.
    #[clap(long = "network-view")]
    pub network_view: Vec<String>,

    /// Sidecar scope to attach, as `name.namespace`.
    #[clap(long)]
    pub sidecar_scope: Option<String>,

    #[clap(long)]
    pub enable_auto_mtls: bool,

    #[clap(long, default_value = "")]
    pub sds_uds_path: String,

    #[clap(long, default_value = "")]
    pub outbound_cluster_stat_name: String,

    #[clap(long, default_value = "")]
    pub inbound_cluster_stat_name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

impl Args {
    pub fn init_logging(&self) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .map_err(|e| anyhow!("invalid log level {}: {}", self.log_level, e))?;
        match self.log_format {
            LogFormat::Plain => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| anyhow!("failed to initialize logging: {}", e))?,
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| anyhow!("failed to initialize logging: {}", e))?,
        }
        Ok(())
    }

    /// The proxy descriptor these arguments describe. The sidecar scope is
    /// attached by the caller once the configuration is loaded.
    pub fn proxy(&self) -> Proxy {
        let mut network_view: BTreeSet<String> = Proxy::default_network_view();
        network_view.extend(self.network_view.iter().cloned());
        Proxy {
            id: self.proxy_id.clone(),
            proxy_type: self.proxy_type,
            ip_addresses: self.proxy_ips.clone(),
            locality: Locality::parse(&self.locality),
            interception_mode: self.interception_mode,
            sidecar_scope: None,
            metadata: ProxyMetadata {
                router_mode: self.router_mode,
                ..Default::default()
            },
            network_view,
        }
    }

    /// Mesh configuration with the flag overrides applied.
    pub fn mesh(&self) -> MeshConfig {
        MeshConfig {
            enable_auto_mtls: self.enable_auto_mtls,
            sds_uds_path: self.sds_uds_path.clone(),
            outbound_cluster_stat_name: self.outbound_cluster_stat_name.clone(),
            inbound_cluster_stat_name: self.inbound_cluster_stat_name.clone(),
            ..Default::default()
        }
    }

    /// Splits a `name.namespace` scope reference.
    pub fn scope_ref(&self) -> Option<(&str, &str)> {
        self.sidecar_scope.as_deref().and_then(|s| s.split_once('.'))
    }
}
