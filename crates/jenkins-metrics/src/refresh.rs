//! Refresh loop — periodically refills the sample store from Jenkins.
//!
//! Each tick runs one cycle: fetch (bounded by a timeout, no lock held),
//! then on success evict and append in one store refresh and bump the
//! liveness gauge; on failure only evict. The first cycle runs immediately at
//! startup; later ticks that are missed are delayed rather than bursted.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::exporter::CollectorState;
use crate::fetcher::Fetch;

/// Source of wall-clock time in Unix seconds, used for the liveness gauge.
pub type WallClock = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Result of a single refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch succeeded and its samples were appended.
    Refreshed {
        appended: usize,
        failed_jobs: usize,
        evicted: usize,
    },
    /// The fetch failed or timed out; only eviction ran.
    Failed { evicted: usize },
}

/// Background task driving [`Fetch`] into the shared [`CollectorState`].
pub struct RefreshLoop<F> {
    fetcher: F,
    state: Arc<CollectorState>,
    interval: Duration,
    fetch_timeout: Duration,
    wall_clock: WallClock,
}

impl<F: Fetch> RefreshLoop<F> {
    /// Create a loop polling every `interval`.
    ///
    /// The fetch timeout defaults to two thirds of the interval.
    pub fn new(fetcher: F, state: Arc<CollectorState>, interval: Duration) -> Self {
        Self {
            fetcher,
            state,
            interval,
            fetch_timeout: interval * 2 / 3,
            wall_clock: Arc::new(unix_now),
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Replace the wall clock used for the liveness gauge.
    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one fetch/evict/append cycle.
    ///
    /// Dropping the returned future before it completes leaves the state
    /// untouched: the store is only modified after the fetch has resolved.
    pub async fn refresh_once(&self) -> CycleOutcome {
        let result = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_all())
            .await
            .unwrap_or_else(|_| Err(FetchError::Timeout(self.fetch_timeout)));
        let now = Instant::now();

        let outcome = match result {
            Ok(report) => {
                let appended = report.samples.len();
                let failed_jobs = report.failures.len();

                let stats = self.state.store().refresh(report.samples, now);
                if stats.dropped > 0 {
                    warn!(dropped = stats.dropped, "sample store over capacity, dropped oldest samples");
                }
                self.state.record_fetch((self.wall_clock)());
                CycleOutcome::Refreshed {
                    appended,
                    failed_jobs,
                    evicted: stats.evicted,
                }
            }
            Err(e) => {
                error!(error = %e, "jenkins fetch failed, keeping previous samples until they expire");
                CycleOutcome::Failed {
                    evicted: self.state.store().evict(now),
                }
            }
        };
        debug!(?outcome, stored = self.state.store().len(), "refresh cycle finished");
        outcome
    }

    /// Run cycles on every tick until the shutdown signal fires.
    ///
    /// Shutdown is observed while waiting for a tick and while a cycle is in
    /// flight; an interrupted cycle is abandoned.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            fetch_timeout_secs = self.fetch_timeout.as_secs_f64(),
            ttl_secs = self.state.store().ttl().as_secs_f64(),
            "refresh loop started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = self.refresh_once() => {}
                _ = shutdown.changed() => {
                    info!("shutdown during refresh, abandoning cycle");
                    break;
                }
            }
        }
        info!("refresh loop shutting down");
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
