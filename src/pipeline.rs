//! Detector output -> confidence gate -> tally engine.

use anyhow::Result;

use crate::config::TallyConfig;
use crate::detect::{ConfidenceGate, FrameDetections};
use crate::ingest::DetectionSource;
use crate::snapshot::CountSnapshot;
use crate::tally::{FrameReport, TallyEngine, TallySettings};

pub struct TallyPipeline {
    gate: ConfidenceGate,
    engine: TallyEngine,
}

impl TallyPipeline {
    pub fn new(gate: ConfidenceGate, settings: &TallySettings) -> Self {
        Self {
            gate,
            engine: TallyEngine::new(settings),
        }
    }

    pub fn from_config(cfg: &TallyConfig) -> Self {
        Self::new(cfg.gate, &cfg.tally)
    }

    /// Adopt the source's frame size for radius scaling.
    pub fn prepare_for(&mut self, source: &dyn DetectionSource) {
        let (width, height) = source.resolution();
        self.engine.configure_for_resolution(width, height);
    }

    pub fn process(&mut self, frame: FrameDetections) -> FrameReport {
        let detections = self.gate.apply(frame.detections);
        self.engine.process_frame(&detections)
    }

    pub fn snapshot(&self) -> CountSnapshot {
        self.engine.snapshot()
    }

    pub fn engine(&self) -> &TallyEngine {
        &self.engine
    }
}

/// Feed every remaining frame of `source` through the pipeline.
///
/// Stops when the source is exhausted. Returns the number of frames processed.
pub fn drain_source(
    source: &mut dyn DetectionSource,
    pipeline: &mut TallyPipeline,
    mut on_frame: impl FnMut(&FrameReport),
) -> Result<u64> {
    let mut frames = 0u64;
    while let Some(frame) = source.next_frame()? {
        let report = pipeline.process(frame);
        on_frame(&report);
        frames += 1;
    }
    log::info!(
        "{} exhausted after {} frames",
        source.name(),
        source.stats().frames_read
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::ingest::{SourceConfig, SyntheticSource};

    #[test]
    fn low_confidence_detections_never_count() {
        let mut pipeline = TallyPipeline::from_config(&TallyConfig::default());
        let report = pipeline.process(FrameDetections::new(vec![
            Detection::at("bottle", 100, 100, 0.5),
            Detection::at("can", 100, 100, 0.95),
        ]));
        assert_eq!(report.detections, 1);
        assert_eq!(pipeline.engine().counts().get("bottle"), None);
        assert_eq!(pipeline.engine().counts().get("can"), Some(1));
    }

    #[test]
    fn drain_source_runs_to_exhaustion() {
        let mut source = SyntheticSource::new(SourceConfig {
            seed: Some(3),
            frame_limit: Some(120),
            ..SourceConfig::default()
        });
        source.connect().unwrap();
        let mut pipeline = TallyPipeline::from_config(&TallyConfig::default());
        pipeline.prepare_for(&source);
        let mut seen = 0;
        let frames = drain_source(&mut source, &mut pipeline, |_| seen += 1).unwrap();
        assert_eq!(frames, 120);
        assert_eq!(seen, 120);
        assert_eq!(pipeline.engine().frames_processed(), 120);
    }
}
