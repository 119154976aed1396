//! Detection sources.
//!
//! A source stands in for the camera plus the upstream detector: each call to
//! `next_frame` yields the detections for one frame.
//! - Replay of a local JSON Lines file (one frame per line)
//! - Synthetic scene (`stub://`) for demos and tests
//!
//! `Ok(None)` from `next_frame` means the source is exhausted and the
//! processing loop should stop gracefully.

pub mod file;
pub mod synthetic;

use anyhow::Result;

use crate::detect::FrameDetections;

pub use file::ReplaySource;
pub use synthetic::SyntheticSource;

const DEFAULT_SOURCE_URL: &str = "stub://scene";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_TARGET_FPS: u32 = 10;

/// Largest accepted frame width or height, in pixels.
pub const MAX_FRAME_DIMENSION: u32 = 16_384;

/// Configuration shared by all detection sources.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceConfig {
    /// Local file path, or `stub://<name>` for the synthetic scene.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Pace for live sources. Replays ignore it.
    pub target_fps: u32,
    /// Synthetic scene seed.
    pub seed: Option<u64>,
    /// Stop after this many frames.
    pub frame_limit: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            seed: None,
            frame_limit: None,
        }
    }
}

/// Statistics for a detection source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub detections_read: u64,
    pub url: String,
}

pub trait DetectionSource {
    /// Source identifier for logs.
    fn name(&self) -> &'static str;

    fn connect(&mut self) -> Result<()>;

    /// Detections for the next frame, or `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameDetections>>;

    /// Frame size in pixels.
    fn resolution(&self) -> (u32, u32);

    fn stats(&self) -> SourceStats;

    /// Whether the loop should pace itself to `target_fps`.
    fn is_live(&self) -> bool {
        false
    }
}

/// Open the source named by `config.url`.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn DetectionSource>> {
    if config.url.starts_with("stub://") {
        Ok(Box::new(SyntheticSource::new(config)))
    } else {
        Ok(Box::new(ReplaySource::new(config)?))
    }
}
