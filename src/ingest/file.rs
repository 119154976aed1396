//! Local replay of recorded detections.
//!
//! The replay file is JSON Lines, one frame per line:
//!
//! ```text
//! {"detections": [{"class": "bottle", "bbox": [90, 80, 110, 120], "confidence": 0.91}]}
//! ```
//!
//! Blank lines are frames with no detections. The replay source only reads
//! local paths; URL schemes are rejected.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use super::{DetectionSource, SourceConfig, SourceStats};
use crate::detect::FrameDetections;

pub struct ReplaySource {
    config: SourceConfig,
    lines: Option<Lines<BufReader<File>>>,
    line_no: u64,
    frames_read: u64,
    detections_read: u64,
}

impl ReplaySource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if !is_local_file_path(&config.url) {
            return Err(anyhow!(
                "replay only supports local paths (no URL schemes): {}",
                config.url
            ));
        }
        Ok(Self {
            config,
            lines: None,
            line_no: 0,
            frames_read: 0,
            detections_read: 0,
        })
    }
}

impl DetectionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.config.url)
            .map_err(|e| anyhow!("failed to open replay file {}: {}", self.config.url, e))?;
        self.lines = Some(BufReader::new(file).lines());
        log::info!("ReplaySource: reading {}", self.config.url);
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
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| anyhow!("replay source not connected"))?;
        let Some(line) = lines.next() else {
            return Ok(None);
        };
        self.line_no += 1;
        let line = line.map_err(|e| {
            anyhow!(
                "failed to read {} line {}: {}",
                self.config.url,
                self.line_no,
                e
            )
        })?;

        let frame = parse_frame_line(&line)
            .map_err(|e| anyhow!("{} line {}: {}", self.config.url, self.line_no, e))?;
        self.frames_read += 1;
        self.detections_read += frame.len() as u64;
        Ok(Some(frame))
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
}

/// Parse one replay line. Blank lines are empty frames.
pub fn parse_frame_line(line: &str) -> Result<FrameDetections> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(FrameDetections::empty());
    }
    serde_json::from_str(trimmed).map_err(|e| anyhow!("invalid frame: {}", e))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}
