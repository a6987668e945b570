//! jenkins-metrics — Jenkins build history as Prometheus metrics.
//!
//! Polls Jenkins on a fixed interval, turns recent builds into timestamped
//! samples, keeps them in a time-windowed in-memory store, and serves the
//! current window to Prometheus scrapes without ever touching the network
//! on the scrape path.
//!
//! # Architecture
//!
//! ```text
//! RefreshLoop (background task)
//!   ├── Fetch::fetch_all()   → FetchReport (network, no lock held)
//!   ├── SampleStore::refresh() ← success: evict + append, one lock
//!   ├── last_fetch gauge       ← set on success only
//!   └── SampleStore::evict()   ← failure: evict only
//!
//! JenkinsCollector (prometheus::core::Collector)
//!   ├── desc()    → liveness gauge descriptor
//!   └── collect() → liveness gauge + newest sample per series
//! ```

pub mod error;
pub mod exporter;
pub mod fetcher;
pub mod refresh;
pub mod sample;
pub mod store;

pub use error::FetchError;
pub use exporter::{CollectorState, JenkinsCollector, LAST_FETCH_METRIC};
pub use fetcher::{DEFAULT_BUILDS_PER_JOB, Fetch, FetchReport, JenkinsFetcher, JobFailure};
pub use refresh::{CycleOutcome, RefreshLoop, WallClock};
pub use sample::Sample;
pub use store::{EXPIRY_SLACK, RefreshStats, SampleStore, StoreConfig};
