#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Ingestion of the declarative mesh-configuration stream: a sequence of
//! YAML documents describing services, external hosts, routing rules,
//! destination rules, and sidecar scopes.

mod convert;
pub mod docs;
mod duration;

pub use self::convert::{load, ConfigError, ConfigSet};
pub use self::duration::{ConfigDuration, DurationError};
