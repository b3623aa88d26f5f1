#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Runtime wiring: command-line arguments, logging setup, and the work
//! queue that drives rebuilds. Rebuild tickets are processed by a single
//! run loop, so per-proxy rebuilds never overlap.

mod args;
mod queue;

pub use self::args::{Args, LogFormat};
pub use self::queue::{ChainHandler, Event, Handler, Queue, Task};
