use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::matcher::{IdentityMatcher, MatcherSettings};
use super::visibility::{
    CountTable, FrameObservations, VisibilityCounter, VisibilitySettings, VisibilityState,
};
use crate::detect::{Detection, Point};
use crate::snapshot::CountSnapshot;

/// Settings for one aggregation session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TallySettings {
    pub matcher: MatcherSettings,
    pub visibility: VisibilitySettings,
}

/// A detection the matcher accepted as a new spatial instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewInstance {
    pub class_name: String,
    pub point: Point,
}

/// Per-frame telemetry from `TallyEngine::process_frame`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// 1-based index of the processed frame.
    pub frame_index: u64,
    pub detections: usize,
    pub new_instances: Vec<NewInstance>,
    /// Classes counted this frame, with their new count.
    pub incremented: Vec<(String, u64)>,
    /// Classes that turned Visible without counting.
    pub silent_reappearances: Vec<String>,
    /// Classes whose appearance episode ended this frame.
    pub ended: Vec<String>,
}

impl FrameReport {
    pub fn has_changes(&self) -> bool {
        !self.incremented.is_empty() || !self.ended.is_empty()
    }
}

/// Aggregation session: identity matching followed by visibility counting.
///
/// One engine per session, owned by the caller. All state lives here.
#[derive(Clone, Debug)]
pub struct TallyEngine {
    settings: TallySettings,
    matcher: IdentityMatcher,
    counter: VisibilityCounter,
    frames_processed: u64,
}

impl TallyEngine {
    pub fn new(settings: &TallySettings) -> Self {
        Self {
            settings: *settings,
            matcher: IdentityMatcher::new(&settings.matcher),
            counter: VisibilityCounter::new(settings.visibility),
            frames_processed: 0,
        }
    }

    /// Rescale the match radius for the source's frame size.
    pub fn configure_for_resolution(&mut self, width: u32, height: u32) {
        let radius = self.settings.matcher.radius_for_frame(width, height);
        if (radius - self.matcher.radius()).abs() > f64::EPSILON {
            log::info!(
                "match radius {:.1}px for {}x{} frames",
                radius,
                width,
                height
            );
        }
        self.matcher.set_radius(radius);
    }

    /// Process every detection of one frame, in input order.
    pub fn process_frame(&mut self, detections: &[Detection]) -> FrameReport {
        self.frames_processed += 1;
        let mut observations = FrameObservations::new();
        let mut new_instances = Vec::new();

        for det in detections {
            let center = det.center();
            let accepted = self.matcher.accept(&det.class_name, center.x, center.y);
            if accepted {
                new_instances.push(NewInstance {
                    class_name: det.class_name.clone(),
                    point: center,
                });
            }
            observations.record(&det.class_name, accepted);
        }

        let update = self.counter.apply(&observations);

        for (class_name, count) in &update.incremented {
            log::info!(
                "frame {}: {} appeared, count={}",
                self.frames_processed,
                class_name,
                count
            );
        }
        for class_name in &update.ended {
            log::debug!("frame {}: {} left view", self.frames_processed, class_name);
        }
        log::debug!(
            "frame {}: detections={} new_instances={}",
            self.frames_processed,
            detections.len(),
            new_instances.len()
        );

        FrameReport {
            frame_index: self.frames_processed,
            detections: detections.len(),
            new_instances,
            incremented: update.incremented,
            silent_reappearances: update.silent_reappearances,
            ended: update.ended,
        }
    }

    pub fn counts(&self) -> &CountTable {
        self.counter.counts()
    }

    pub fn snapshot(&self) -> CountSnapshot {
        CountSnapshot::new(self.frames_processed, self.counter.counts())
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn visibility(&self, class_name: &str) -> VisibilityState {
        self.counter.state(class_name)
    }

    /// Classes currently in a visibility episode, sorted by name.
    pub fn visible_classes(&self) -> Vec<&str> {
        self.counter.visible_classes()
    }

    pub fn history_len(&self, class_name: &str) -> usize {
        self.matcher
            .history(class_name)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    pub fn settings(&self) -> &TallySettings {
        &self.settings
    }
}

impl Default for TallyEngine {
    fn default() -> Self {
        Self::new(&TallySettings::default())
    }
}

/// Engine shared across threads. The lock covers a whole frame.
#[derive(Clone)]
pub struct SharedTallyEngine {
    inner: Arc<Mutex<TallyEngine>>,
}

impl SharedTallyEngine {
    pub fn new(engine: TallyEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn process_frame(&self, detections: &[Detection]) -> Result<FrameReport> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("tally engine lock poisoned"))?;
        Ok(guard.process_frame(detections))
    }

    pub fn snapshot(&self) -> Result<CountSnapshot> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("tally engine lock poisoned"))?;
        Ok(guard.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::IncrementRule;

    fn bottle(x: i32, y: i32) -> Detection {
        Detection::at("bottle", x, y, 0.9)
    }

    #[test]
    fn report_tracks_new_instances_and_increments() {
        let mut engine = TallyEngine::default();
        let report = engine.process_frame(&[bottle(100, 100), bottle(600, 600)]);
        assert_eq!(report.frame_index, 1);
        assert_eq!(report.new_instances.len(), 2);
        assert_eq!(report.incremented, vec![("bottle".to_string(), 1)]);
        assert_eq!(engine.history_len("bottle"), 2);
    }

    #[test]
    fn changes_flag_follows_increments_and_exits() {
        let mut engine = TallyEngine::default();
        let entered = engine.process_frame(&[bottle(100, 100), Detection::at("can", 50, 50, 0.9)]);
        assert!(entered.has_changes());
        assert_eq!(engine.visible_classes(), vec!["bottle", "can"]);

        let steady = engine.process_frame(&[bottle(100, 100), Detection::at("can", 50, 50, 0.9)]);
        assert!(!steady.has_changes());

        let can_left = engine.process_frame(&[bottle(100, 100)]);
        assert!(can_left.has_changes());
        assert_eq!(can_left.ended, vec!["can".to_string()]);
        assert_eq!(engine.visible_classes(), vec!["bottle"]);
    }

    #[test]
    fn strict_rule_suppresses_remembered_reappearance() {
        let settings = TallySettings {
            visibility: VisibilitySettings {
                increment_rule: IncrementRule::NewInstanceReappearance,
                absence_grace_frames: 0,
            },
            ..TallySettings::default()
        };
        let mut engine = TallyEngine::new(&settings);
        engine.process_frame(&[bottle(100, 100)]);
        engine.process_frame(&[]);
        let report = engine.process_frame(&[bottle(100, 100)]);
        assert!(report.incremented.is_empty());
        assert_eq!(report.silent_reappearances, vec!["bottle".to_string()]);
        assert_eq!(engine.counts().get("bottle"), Some(1));
    }

    #[test]
    fn configure_for_resolution_rescales_radius() {
        let settings = TallySettings {
            matcher: MatcherSettings {
                reference_resolution: Some((1280, 720)),
                ..MatcherSettings::default()
            },
            ..TallySettings::default()
        };
        let mut engine = TallyEngine::new(&settings);
        engine.configure_for_resolution(640, 360);
        engine.process_frame(&[bottle(0, 0)]);
        engine.process_frame(&[]);
        // 250px apart: new at radius 200, same at radius 400
        let report = engine.process_frame(&[bottle(250, 0)]);
        assert_eq!(report.new_instances.len(), 1);
    }

    #[test]
    fn shared_engine_processes_from_threads() {
        let shared = SharedTallyEngine::new(TallyEngine::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let det = Detection::at(format!("class{}", i), 10, 10, 0.9);
                    shared.process_frame(&[det]).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = shared.snapshot().unwrap();
        assert_eq!(snapshot.frame_index, 4);
        // each frame hides the other classes, so every class counted exactly once
        assert_eq!(snapshot.counts.len(), 4);
        assert!(snapshot.counts.values().all(|c| *c == 1));
    }
}
