//! Prometheus collector over the sample store.
//!
//! Scrapes only read cached state: the liveness gauge and a snapshot of the
//! store. Nothing on this path awaits or performs I/O.
//!
//! When the ttl spans several cycles the store holds one sample per cycle
//! for the same build; only the newest of each series is exported.

use std::collections::HashSet;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};

use crate::sample::Sample;
use crate::store::{SampleStore, StoreConfig};

/// Name of the liveness gauge.
pub const LAST_FETCH_METRIC: &str = "jenkins_last_fetch_timestamp_seconds";
const LAST_FETCH_HELP: &str = "Unix timestamp of the last successful fetch of Jenkins metrics.";

/// Process-wide state shared by the refresh loop and the collector.
pub struct CollectorState {
    store: SampleStore,
    /// Unix seconds of the last successful fetch, 0 until the first one.
    last_fetch: Gauge,
}

impl CollectorState {
    pub fn new(config: StoreConfig) -> prometheus::Result<Self> {
        Ok(Self {
            store: SampleStore::new(config),
            last_fetch: Gauge::with_opts(Opts::new(LAST_FETCH_METRIC, LAST_FETCH_HELP))?,
        })
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Current value of the liveness gauge.
    pub fn last_fetch(&self) -> f64 {
        self.last_fetch.get()
    }

    /// Record a successful fetch. The gauge never moves backwards, even if
    /// the wall clock does.
    pub(crate) fn record_fetch(&self, unix_secs: f64) {
        if unix_secs > self.last_fetch.get() {
            self.last_fetch.set(unix_secs);
        }
    }
}

/// Exposes the cached Jenkins samples to a Prometheus registry.
pub struct JenkinsCollector {
    state: Arc<CollectorState>,
}

impl JenkinsCollector {
    pub fn new(state: Arc<CollectorState>) -> Self {
        Self { state }
    }
}

impl Collector for JenkinsCollector {
    /// Only the liveness gauge is described; build metrics are unchecked.
    fn desc(&self) -> Vec<&Desc> {
        self.state.last_fetch.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.state.last_fetch.collect();
        families.extend(newest_per_series(self.state.store.snapshot()));
        families
    }
}

/// Keep the last occurrence of each series, preserving store order.
fn newest_per_series(snapshot: Vec<Sample>) -> Vec<MetricFamily> {
    let mut seen = HashSet::with_capacity(snapshot.len());
    let mut newest: Vec<MetricFamily> = snapshot
        .into_iter()
        .rev()
        .filter(|s| seen.insert(s.series_key()))
        .map(Sample::into_metric)
        .collect();
    newest.reverse();
    newest
}
