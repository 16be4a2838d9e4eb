//! Per-resource generation state.
//!
//! A resource is busy from `try_start` until `finish`. Only busy resources
//! are kept in the map, so its size is bounded by the number of operations
//! actually in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lookbook_domain::ResourceId;

use crate::infrastructure::ports::ClockPort;

/// Tracks which resources have an operation in flight.
pub struct GenerationStateTracker {
    /// resource -> when the running operation started
    flags: DashMap<ResourceId, DateTime<Utc>>,
    clock: Arc<dyn ClockPort>,
}

impl GenerationStateTracker {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            flags: DashMap::new(),
            clock,
        }
    }

    /// Mark `resource_id` busy if it is not already.
    ///
    /// Returns `false` when an operation is already running for the resource;
    /// the caller must not start another one. Check and set happen under the
    /// same shard lock.
    pub fn try_start(&self, resource_id: &ResourceId) -> bool {
        match self.flags.entry(resource_id.clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    resource_id = %resource_id,
                    started_at = %existing.get(),
                    "Duplicate operation rejected, resource busy"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(self.clock.now());
                tracing::debug!(resource_id = %resource_id, "Operation started");
                true
            }
        }
    }

    /// Clear the busy flag. Idempotent.
    pub fn finish(&self, resource_id: &ResourceId) {
        if self.flags.remove(resource_id).is_some() {
            tracing::debug!(resource_id = %resource_id, "Operation finished");
        }
    }

    pub fn is_in_progress(&self, resource_id: &ResourceId) -> bool {
        self.flags.contains_key(resource_id)
    }

    pub fn started_at(&self, resource_id: &ResourceId) -> Option<DateTime<Utc>> {
        self.flags.get(resource_id).map(|started| *started)
    }

    /// All busy resources, in no particular order.
    pub fn in_progress(&self) -> Vec<ResourceId> {
        self.flags.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Release flags whose operation started more than `max_age` ago.
    ///
    /// An operation that crashed without calling `finish` would otherwise
    /// lock its resource for the rest of the session.
    pub fn clear_stale(&self, max_age: chrono::Duration) -> Vec<ResourceId> {
        let now = self.clock.now();
        let mut released = Vec::new();
        self.flags.retain(|resource_id, started_at| {
            if now - *started_at >= max_age {
                released.push(resource_id.clone());
                false
            } else {
                true
            }
        });

        for resource_id in &released {
            tracing::warn!(resource_id = %resource_id, "Released stale generation flag");
        }
        released
    }

    /// Clear every flag (session switch, full recovery). Returns how many were set.
    pub fn reset_all(&self) -> usize {
        let count = self.flags.len();
        self.flags.clear();
        if count > 0 {
            tracing::info!(count, "Generation state reset");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{ManualClock, SystemClock};
    use crate::infrastructure::ports::MockClockPort;

    fn resource(id: &str) -> ResourceId {
        ResourceId::new(id).unwrap()
    }

    fn tracker() -> GenerationStateTracker {
        GenerationStateTracker::new(Arc::new(SystemClock::new()))
    }

    #[test]
    fn second_start_is_rejected_until_finish() {
        let tracker = tracker();
        let res = resource("res-1");

        assert_eq!((tracker.try_start(&res), tracker.try_start(&res)), (true, false));
        assert!(tracker.is_in_progress(&res));

        tracker.finish(&res);
        assert!(!tracker.is_in_progress(&res));
        assert!(tracker.try_start(&res));
    }

    #[test]
    fn finish_is_idempotent() {
        let tracker = tracker();
        let res = resource("res-1");

        tracker.finish(&res);
        assert!(tracker.try_start(&res));
        tracker.finish(&res);
        tracker.finish(&res);
        assert!(tracker.is_empty());
    }

    #[test]
    fn resources_are_independent() {
        let tracker = tracker();
        assert!(tracker.try_start(&resource("template-a")));
        assert!(tracker.try_start(&resource("template-b")));

        let mut busy = tracker.in_progress();
        busy.sort();
        assert_eq!(busy, vec![resource("template-a"), resource("template-b")]);
    }

    #[test]
    fn reset_all_clears_everything() {
        let tracker = tracker();
        tracker.try_start(&resource("a"));
        tracker.try_start(&resource("b"));

        assert_eq!(tracker.reset_all(), 2);
        assert!(!tracker.is_in_progress(&resource("a")));
        assert!(tracker.try_start(&resource("b")));
    }

    #[test]
    fn clear_stale_releases_only_old_flags() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let tracker = GenerationStateTracker::new(clock.clone());

        tracker.try_start(&resource("old"));
        clock.advance(chrono::Duration::minutes(40));
        tracker.try_start(&resource("fresh"));

        let released = tracker.clear_stale(chrono::Duration::minutes(30));
        assert_eq!(released, vec![resource("old")]);
        assert!(tracker.is_in_progress(&resource("fresh")));
        assert!(!tracker.is_in_progress(&resource("old")));
    }

    #[test]
    fn started_at_comes_from_clock() {
        let fixed = Utc::now();
        let mut clock = MockClockPort::new();
        clock.expect_now().return_const(fixed);
        let tracker = GenerationStateTracker::new(Arc::new(clock));

        tracker.try_start(&resource("res-1"));
        assert_eq!(tracker.started_at(&resource("res-1")), Some(fixed));
    }

    #[test]
    fn concurrent_starts_admit_exactly_one() {
        let tracker = Arc::new(tracker());
        let res = resource("shared");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let res = res.clone();
                std::thread::spawn(move || tracker.try_start(&res))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|accepted| *accepted)
            .count();
        assert_eq!(accepted, 1);
    }
}
