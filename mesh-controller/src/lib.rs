#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use mesh_controller_cds as cds;
pub use mesh_controller_config as config;
pub use mesh_controller_core as core;
pub use mesh_controller_runtime as runtime;
pub use mesh_controller_xds as xds;

pub use mesh_controller_cds::{ClusterBuilder, ClusterObserver, ObserverContext};
pub use mesh_controller_core::{Environment, Proxy, PushContext};
