//! Count snapshots and the cadence at which they are surfaced.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::tally::CountTable;

/// Default interval between surfaced snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time copy of the count table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSnapshot {
    /// Frames processed when the snapshot was taken.
    pub frame_index: u64,
    pub counts: BTreeMap<String, u64>,
}

impl CountSnapshot {
    pub fn new(frame_index: u64, table: &CountTable) -> Self {
        Self {
            frame_index,
            counts: table
                .iter()
                .map(|(class_name, count)| (class_name.to_string(), count))
                .collect(),
        }
    }

    /// `"<count> <class_name>"` per class, in class name order.
    pub fn lines(&self) -> Vec<String> {
        self.counts
            .iter()
            .map(|(class_name, count)| format!("{} {}", count, class_name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Throttles snapshot output to at most once per interval.
///
/// Counts are always current; this only limits how often they are shown.
#[derive(Clone, Debug)]
pub struct SnapshotThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl SnapshotThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// True on the first call, then once `interval` has passed since the last true.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_emit = Some(now);
        }
        due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SnapshotThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::tally::TallyEngine;

    #[test]
    fn throttle_emits_once_per_interval() {
        let mut throttle = SnapshotThrottle::default();
        let t0 = Instant::now();
        assert!(throttle.should_emit(t0));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(500)));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(999)));
        assert!(throttle.should_emit(t0 + Duration::from_millis(1000)));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(1500)));
        assert!(throttle.should_emit(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn snapshot_lines_are_count_then_class() {
        let mut engine = TallyEngine::default();
        engine.process_frame(&[
            Detection::at("can", 0, 0, 0.8),
            Detection::at("bottle", 0, 0, 0.8),
        ]);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.frame_index, 1);
        assert_eq!(snapshot.lines(), vec!["1 bottle", "1 can"]);
    }
}
