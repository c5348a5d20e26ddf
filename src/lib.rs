//! sdls library crate: configuration, discovery, output and the batch
//! pipeline around the `sdls-core` engine.
//!
//! The primary interface is the `sdls` binary. The modules are public so
//! integration tests and benches can drive a run without the CLI.

pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod telemetry;

pub use config::SdlsConfig;
pub use error::SdlsError;
pub use pipeline::{Pipeline, ProcessingHandle, RunReport};
