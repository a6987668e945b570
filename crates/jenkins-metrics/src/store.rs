//! Time-windowed sample store.
//!
//! A queue of samples in insertion order behind a single mutex. The refresh
//! loop evicts by age and appends one batch per cycle in a single critical
//! section; scrapes take a cloned snapshot.
//!
//! # Expiry
//!
//! A sample expires once its age reaches `ttl - EXPIRY_SLACK`. Consecutive
//! ticks of a `tokio::time::Interval` can land a few milliseconds less than
//! one period apart, and a fetch may complete instantly, so with `ttl` equal
//! to the poll interval the previous batch must already count as expired
//! when the next one arrives.
//!
//! # Concurrency
//!
//! The queue is protected by a `std::sync::Mutex`. Every operation holds the
//! lock only for in-memory work (push, retain, clone), never across an
//! `.await`, so a refresh (evict + append) is atomic with respect to
//! snapshots.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::sample::Sample;

/// Tolerance subtracted from the ttl when deciding expiry.
pub const EXPIRY_SLACK: Duration = Duration::from_millis(100);

/// Retention settings for [`SampleStore`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum age before a sample is evicted (default: 30 seconds).
    pub ttl: Duration,
    /// Initial capacity of the queue (default: 1024). Not a limit.
    pub capacity_hint: usize,
    /// Hard cap on retained samples; oldest are dropped first once exceeded.
    pub max_entries: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            capacity_hint: 1024,
            max_entries: None,
        }
    }
}

/// What one [`SampleStore::refresh`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Samples removed because they expired.
    pub evicted: usize,
    /// Samples removed to honour `max_entries`.
    pub dropped: usize,
}

/// Concurrency-safe store of [`Sample`]s.
pub struct SampleStore {
    entries: Mutex<VecDeque<Sample>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl SampleStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(config.capacity_hint)),
            ttl: config.ttl,
            max_entries: config.max_entries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        // Every critical section leaves the queue valid, so a panic elsewhere
        // while holding the guard cannot have torn it.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch, preserving its order.
    ///
    /// Returns the number of older samples dropped to honour `max_entries`.
    pub fn append(&self, batch: Vec<Sample>) -> usize {
        let mut entries = self.lock();
        self.push_batch(&mut entries, batch)
    }

    /// Evict expired samples as of `now` and append `batch`, under one lock.
    ///
    /// A snapshot sees either the window before the refresh or after it,
    /// never the old and new batches side by side.
    pub fn refresh(&self, batch: Vec<Sample>, now: Instant) -> RefreshStats {
        let mut entries = self.lock();
        let evicted = self.evict_locked(&mut entries, now);
        let dropped = self.push_batch(&mut entries, batch);
        RefreshStats { evicted, dropped }
    }

    /// Copy of all current samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().iter().cloned().collect()
    }

    /// Remove every sample that has expired as of `now`.
    ///
    /// Returns how many samples were removed.
    pub(crate) fn evict(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        self.evict_locked(&mut entries, now)
    }

    fn evict_locked(&self, entries: &mut VecDeque<Sample>, now: Instant) -> usize {
        let max_age = self.ttl.saturating_sub(EXPIRY_SLACK);
        let before = entries.len();
        entries.retain(|s| now.saturating_duration_since(s.observed_at()) < max_age);
        let evicted = before - entries.len();

        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "evicted expired samples");
        }
        evicted
    }

    fn push_batch(&self, entries: &mut VecDeque<Sample>, batch: Vec<Sample>) -> usize {
        entries.extend(batch);

        let mut dropped = 0;
        if let Some(max) = self.max_entries {
            while entries.len() > max {
                entries.pop_front();
                dropped += 1;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
