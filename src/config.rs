use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{ConfidenceGate, DEFAULT_MAX_DETECTIONS, DEFAULT_MIN_CONFIDENCE};
use crate::ingest::{SourceConfig, MAX_FRAME_DIMENSION};
use crate::snapshot::DEFAULT_SNAPSHOT_INTERVAL;
use crate::storage::DEFAULT_LOG_PATH;
use crate::tally::{
    IncrementRule, MatcherSettings, TallySettings, VisibilitySettings, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_MATCH_RADIUS_PX,
};

#[derive(Debug, Deserialize, Default)]
struct TallyConfigFile {
    source: Option<SourceConfigFile>,
    matcher: Option<MatcherConfigFile>,
    visibility: Option<VisibilityConfigFile>,
    detector: Option<DetectorConfigFile>,
    snapshot: Option<SnapshotConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    seed: Option<u64>,
    frame_limit: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MatcherConfigFile {
    match_radius_px: Option<f64>,
    history_capacity: Option<usize>,
    reference_width: Option<u32>,
    reference_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct VisibilityConfigFile {
    increment_rule: Option<String>,
    absence_grace_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    min_confidence: Option<f32>,
    max_detections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    interval_ms: Option<u64>,
    log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TallyConfig {
    pub source: SourceConfig,
    pub tally: TallySettings,
    pub gate: ConfidenceGate,
    pub snapshot: SnapshotSettings,
}

#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub interval: Duration,
    pub log_path: PathBuf,
}

impl TallyConfig {
    /// Defaults, then the `TALLY_CONFIG` file (if set), then `TALLY_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TALLY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file without consulting `TALLY_CONFIG`. Env overrides still apply.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TallyConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source_defaults = SourceConfig::default();
        let source = SourceConfig {
            url: source_file.url.unwrap_or(source_defaults.url),
            width: source_file.width.unwrap_or(source_defaults.width),
            height: source_file.height.unwrap_or(source_defaults.height),
            target_fps: source_file.target_fps.unwrap_or(source_defaults.target_fps),
            seed: source_file.seed,
            frame_limit: source_file.frame_limit,
        };

        let matcher_file = file.matcher.unwrap_or_default();
        let reference_resolution = match (
            matcher_file.reference_width,
            matcher_file.reference_height,
        ) {
            (Some(w), Some(h)) => Some((w, h)),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "matcher.reference_width and matcher.reference_height must be set together"
                ))
            }
        };
        let matcher = MatcherSettings {
            match_radius_px: matcher_file
                .match_radius_px
                .unwrap_or(DEFAULT_MATCH_RADIUS_PX),
            history_capacity: matcher_file
                .history_capacity
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
            reference_resolution,
        };

        let visibility_file = file.visibility.unwrap_or_default();
        let increment_rule = match visibility_file.increment_rule.as_deref() {
            Some(rule) => parse_rule(rule)?,
            None => IncrementRule::default(),
        };
        let visibility = VisibilitySettings {
            increment_rule,
            absence_grace_frames: visibility_file.absence_grace_frames.unwrap_or(0),
        };

        let detector_file = file.detector.unwrap_or_default();
        let gate = ConfidenceGate::new(
            detector_file.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            detector_file.max_detections.unwrap_or(DEFAULT_MAX_DETECTIONS),
        );

        let snapshot_file = file.snapshot.unwrap_or_default();
        let snapshot = SnapshotSettings {
            interval: snapshot_file
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL),
            log_path: snapshot_file
                .log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
        };

        Ok(Self {
            source,
            tally: TallySettings {
                matcher,
                visibility,
            },
            gate,
            snapshot,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("TALLY_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Some(radius) = parse_env::<f64>("TALLY_MATCH_RADIUS", "a number of pixels")? {
            self.tally.matcher.match_radius_px = radius;
        }
        if let Some(capacity) = parse_env::<usize>("TALLY_HISTORY_CAPACITY", "an integer")? {
            self.tally.matcher.history_capacity = capacity;
        }
        if let Some(conf) = parse_env::<f32>("TALLY_MIN_CONFIDENCE", "a number in [0, 1]")? {
            self.gate.min_confidence = conf;
        }
        if let Ok(rule) = std::env::var("TALLY_INCREMENT_RULE") {
            if !rule.trim().is_empty() {
                self.tally.visibility.increment_rule = parse_rule(&rule)?;
            }
        }
        if let Ok(path) = std::env::var("TALLY_LOG_PATH") {
            if !path.trim().is_empty() {
                self.snapshot.log_path = PathBuf::from(path);
            }
        }
        if let Some(ms) = parse_env::<u64>(
            "TALLY_SNAPSHOT_INTERVAL_MS",
            "an integer number of milliseconds",
        )? {
            self.snapshot.interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let radius = self.tally.matcher.match_radius_px;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(anyhow!("match radius must be a positive number of pixels"));
        }
        if self.tally.matcher.history_capacity == 0 {
            return Err(anyhow!("history capacity must be greater than zero"));
        }
        if let Some((w, h)) = self.tally.matcher.reference_resolution {
            if w == 0 || h == 0 {
                return Err(anyhow!("reference resolution must be non-zero"));
            }
        }
        if !(0.0..=1.0).contains(&self.gate.min_confidence) {
            return Err(anyhow!("min confidence must be within [0, 1]"));
        }
        if self.gate.max_detections == 0 {
            return Err(anyhow!("max detections must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source resolution must be non-zero"));
        }
        if self.source.width > MAX_FRAME_DIMENSION || self.source.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "source resolution must be at most {}x{}",
                MAX_FRAME_DIMENSION,
                MAX_FRAME_DIMENSION
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        if self.snapshot.interval.is_zero() {
            return Err(anyhow!("snapshot interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            tally: TallySettings::default(),
            gate: ConfidenceGate::default(),
            snapshot: SnapshotSettings::default(),
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SNAPSHOT_INTERVAL,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

fn read_config_file(path: &Path) -> Result<TallyConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_rule(value: &str) -> Result<IncrementRule> {
    IncrementRule::parse(value).ok_or_else(|| {
        anyhow!(
            "unknown increment rule '{}' (expected reappearance or new_instance_reappearance)",
            value
        )
    })
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        _ => Ok(None),
    }
}
