//! jenkins-exporter — configuration, HTTP surface and logging for the
//! exporter daemon.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Landing page linking to the telemetry path |
//! | GET | `/healthz` | Process liveness |
//! | GET | `{telemetry_path}` | Prometheus exposition (default `/metrics`) |

pub mod config;
pub mod logging;
pub mod server;

pub use config::{Cli, ConfigError, ExporterConfig, LogFormat};
pub use server::build_router;
