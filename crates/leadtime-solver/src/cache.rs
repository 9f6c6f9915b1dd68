//! Keyed memoization of materialized graphs and their schedules.
//!
//! The key includes the document's `cache_hash`, so a mutated document
//! never hits entries computed from an older snapshot; stale entries are
//! simply unreachable and age out via TTL. Each key owns a slot with its
//! own lock: the first caller computes, concurrent callers for the same
//! key wait and observe that result, and callers for other keys proceed
//! independently. A computation that fails or is cancelled removes its
//! slot, leaving no partial entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, trace};

use leadtime_core::{Pid, ProjectDocument};

use crate::graph::PlanGraph;
use crate::{
    schedule_graph, CancelToken, ScheduleError, ScheduleMode, ScheduleOutcome, SchedulerOptions,
};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Identity of one scheduling request against one document snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Snapshot identity of the document
    pub cache_hash: u64,
    pub as_of: NaiveDate,
    /// Terminal set, sorted
    pub terminals: Vec<Pid>,
    pub mode: ScheduleMode,
}

impl CacheKey {
    pub fn new(document: &ProjectDocument, as_of: NaiveDate, options: &SchedulerOptions) -> Self {
        let mut terminals = options.terminals.clone();
        terminals.sort();
        terminals.dedup();
        Self {
            cache_hash: document.cache_hash,
            as_of,
            terminals,
            mode: options.mode,
        }
    }
}

/// A cached graph together with the schedule computed from it.
#[derive(Clone, Debug)]
pub struct CachedSchedule {
    pub graph: PlanGraph,
    pub outcome: ScheduleOutcome,
}

struct Entry {
    value: Arc<CachedSchedule>,
    computed_at: Instant,
}

#[derive(Default)]
struct Slot {
    entry: Mutex<Option<Entry>>,
}

/// Shared schedule cache with compute-once semantics per key.
pub struct ScheduleCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ScheduleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule through the cache.
    ///
    /// A hit returns the shared result; a miss computes it while holding
    /// only this key's slot lock, so other keys stay available. Errors
    /// (including cancellation) leave no entry behind.
    pub fn schedule(
        &self,
        document: &ProjectDocument,
        as_of: NaiveDate,
        options: &SchedulerOptions,
        cancel: &CancelToken,
    ) -> Result<Arc<CachedSchedule>, ScheduleError> {
        let key = CacheKey::new(document, as_of, options);
        let slot = {
            let mut slots = self.slots.lock().expect("cache map poisoned");
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut entry = slot.entry.lock().expect("cache slot poisoned");
        if let Some(existing) = entry.as_ref() {
            if existing.computed_at.elapsed() < self.ttl {
                trace!(?key, "schedule cache hit");
                return Ok(Arc::clone(&existing.value));
            }
            debug!(?key, "schedule cache entry expired");
            *entry = None;
        }

        debug!(?key, "schedule cache miss; computing");
        let computed = self.compute(document, as_of, options, cancel);
        match computed {
            Ok(value) => {
                if cancel.is_cancelled() {
                    // Cancelled after the passes ran; do not publish
                    drop(entry);
                    self.remove_slot(&key, &slot);
                    return Err(ScheduleError::CancelRequested);
                }
                let value = Arc::new(value);
                *entry = Some(Entry {
                    value: Arc::clone(&value),
                    computed_at: Instant::now(),
                });
                Ok(value)
            }
            Err(err) => {
                drop(entry);
                self.remove_slot(&key, &slot);
                Err(err)
            }
        }
    }

    /// Number of live slots, for diagnostics.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("cache map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots.lock().expect("cache map poisoned").clear();
    }

    fn compute(
        &self,
        document: &ProjectDocument,
        as_of: NaiveDate,
        options: &SchedulerOptions,
        cancel: &CancelToken,
    ) -> Result<CachedSchedule, ScheduleError> {
        let graph = PlanGraph::build(document, as_of)?;
        let outcome = schedule_graph(&graph, as_of, options, cancel)?;
        Ok(CachedSchedule { graph, outcome })
    }

    fn remove_slot(&self, key: &CacheKey, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock().expect("cache map poisoned");
        if let Some(current) = slots.get(key) {
            if Arc::ptr_eq(current, slot) {
                slots.remove(key);
            }
        }
    }
}
