//! Synthetic detection scene (`stub://`) for demos and tests.
//!
//! Objects enter at random positions, drift a few pixels per frame, and leave
//! after a random dwell time. Confidences are spread around the default gate
//! so filtering is exercised too. Runs are deterministic for a given seed.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DetectionSource, SourceConfig, SourceStats, MAX_FRAME_DIMENSION};
use crate::detect::{BoundingBox, Detection, FrameDetections};

const SCENE_CLASSES: &[&str] = &["bottle", "can", "cup"];
const MAX_ACTORS: usize = 4;
const SPAWN_PROBABILITY: f64 = 0.05;
const MIN_DWELL_FRAMES: u32 = 10;
const MAX_DWELL_FRAMES: u32 = 80;
const DROPOUT_PROBABILITY: f64 = 0.02;
const BOX_HALF_SIZE: i32 = 40;

struct Actor {
    class_name: &'static str,
    x: i32,
    y: i32,
    frames_left: u32,
}

pub struct SyntheticSource {
    config: SourceConfig,
    rng: StdRng,
    actors: Vec<Actor>,
    frames_read: u64,
    detections_read: u64,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            actors: Vec::new(),
            frames_read: 0,
            detections_read: 0,
        }
    }

    fn step_scene(&mut self) {
        // clamped, so the casts cannot wrap
        let width = self.config.width.clamp(1, MAX_FRAME_DIMENSION) as i32;
        let height = self.config.height.clamp(1, MAX_FRAME_DIMENSION) as i32;

        for actor in self.actors.iter_mut() {
            actor.frames_left = actor.frames_left.saturating_sub(1);
            actor.x = (actor.x + self.rng.gen_range(-3..=3)).clamp(0, width - 1);
            actor.y = (actor.y + self.rng.gen_range(-3..=3)).clamp(0, height - 1);
        }
        self.actors.retain(|a| a.frames_left > 0);

        if self.actors.len() < MAX_ACTORS && self.rng.gen_bool(SPAWN_PROBABILITY) {
            let class_name = SCENE_CLASSES[self.rng.gen_range(0..SCENE_CLASSES.len())];
            let actor = Actor {
                class_name,
                x: self.rng.gen_range(0..width),
                y: self.rng.gen_range(0..height),
                frames_left: self.rng.gen_range(MIN_DWELL_FRAMES..=MAX_DWELL_FRAMES),
            };
            log::debug!(
                "synthetic: {} enters at ({}, {}) for {} frames",
                actor.class_name,
                actor.x,
                actor.y,
                actor.frames_left
            );
            self.actors.push(actor);
        }
    }

    fn observe(&mut self) -> Vec<Detection> {
        let mut detections = Vec::with_capacity(self.actors.len());
        for actor in &self.actors {
            // detector occasionally misses a visible object
            if self.rng.gen_bool(DROPOUT_PROBABILITY) {
                continue;
            }
            let bbox = BoundingBox::new(
                actor.x - BOX_HALF_SIZE,
                actor.y - BOX_HALF_SIZE,
                actor.x + BOX_HALF_SIZE,
                actor.y + BOX_HALF_SIZE,
            );
            let confidence = self.rng.gen_range(0.55f32..0.99);
            detections.push(Detection::new(actor.class_name, bbox, confidence));
        }
        detections
    }
}

impl DetectionSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn connect(&mut self) -> Result<()> {
        let (width, height) = (self.config.width, self.config.height);
        let valid = 1..=MAX_FRAME_DIMENSION;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(anyhow!(
                "synthetic frame size {}x{} outside 1..={}",
                width,
                height,
                MAX_FRAME_DIMENSION
            ));
        }
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameDetections>> {
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frames_read >= limit)
        {
            return Ok(None);
        }
        self.step_scene();
        let detections = self.observe();
        self.frames_read += 1;
        self.detections_read += detections.len() as u64;
        Ok(Some(FrameDetections::new(detections)))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            detections_read: self.detections_read,
            url: self.config.url.clone(),
        }
    }

    fn is_live(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64, frames: u64) -> SyntheticSource {
        SyntheticSource::new(SourceConfig {
            seed: Some(seed),
            frame_limit: Some(frames),
            ..SourceConfig::default()
        })
    }

    fn drain(source: &mut SyntheticSource) -> Vec<FrameDetections> {
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn same_seed_same_scene() {
        let a = drain(&mut seeded(7, 200));
        let b = drain(&mut seeded(7, 200));
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
    }

    #[test]
    fn detections_stay_in_frame() {
        let mut source = seeded(11, 300);
        for frame in drain(&mut source) {
            assert!(frame.len() <= MAX_ACTORS);
            for det in frame.detections {
                let c = det.center();
                assert!((0..1280).contains(&c.x));
                assert!((0..720).contains(&c.y));
                assert!(SCENE_CLASSES.contains(&det.class_name.as_str()));
            }
        }
        assert_eq!(source.stats().frames_read, 300);
    }

    #[test]
    fn oversized_frame_is_rejected_on_connect() {
        let mut source = SyntheticSource::new(SourceConfig {
            width: u32::MAX,
            ..SourceConfig::default()
        });
        assert!(source.connect().is_err());
    }

    #[test]
    fn oversized_frame_never_panics_when_stepping() {
        let mut source = SyntheticSource::new(SourceConfig {
            width: u32::MAX,
            height: u32::MAX,
            seed: Some(5),
            frame_limit: Some(500),
            ..SourceConfig::default()
        });
        for frame in drain(&mut source) {
            for det in frame.detections {
                let c = det.center();
                assert!((0..MAX_FRAME_DIMENSION as i32).contains(&c.x));
                assert!((0..MAX_FRAME_DIMENSION as i32).contains(&c.y));
            }
        }
    }
}
