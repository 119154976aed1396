//! Object Tally
//!
//! Turns a stream of per-frame object detections into a running count of
//! distinct appearances per class.
//!
//! # Architecture
//!
//! Detections carry no track IDs, so identity is inferred:
//!
//! 1. **Identity matching**: a detection within the match radius of a
//!    remembered point of its class is the same spatial instance.
//! 2. **Visibility counting**: each class is Invisible or Visible; a class
//!    is counted once per Invisible -> Visible transition, never per frame.
//!
//! Counts only grow. Visibility is per class, not per instance, so two
//! simultaneous objects of one class are counted once.
//!
//! # Module Structure
//!
//! - `tally`: the aggregation core (matcher, visibility counter, engine)
//! - `detect`: detection types and the confidence gate
//! - `ingest`: detection sources (file replay, synthetic scene)
//! - `pipeline`: gate + engine driven by a source
//! - `snapshot`: count snapshots and output throttling
//! - `storage`: append-only snapshot log
//! - `config`: layered configuration (file + env)

pub mod config;
pub mod detect;
pub mod ingest;
pub mod pipeline;
pub mod snapshot;
pub mod storage;
pub mod tally;

pub use config::{SnapshotSettings, TallyConfig};
pub use detect::{BoundingBox, ConfidenceGate, Detection, FrameDetections, Point};
pub use ingest::{open_source, DetectionSource, ReplaySource, SourceConfig, SyntheticSource};
pub use pipeline::{drain_source, TallyPipeline};
pub use snapshot::{CountSnapshot, SnapshotThrottle};
pub use storage::{InMemorySnapshotStore, SnapshotStore, TextFileSnapshotStore};
pub use tally::{
    CountTable, FrameReport, IdentityMatcher, IncrementRule, MatcherSettings, SharedTallyEngine,
    SpatialHistory, TallyEngine, TallySettings, VisibilityCounter, VisibilitySettings,
    VisibilityState,
};
