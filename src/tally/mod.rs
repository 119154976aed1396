//! Detection-to-count aggregation.
//!
//! - `IdentityMatcher`: proximity test against a bounded per-class history
//! - `VisibilityCounter`: per-class Invisible/Visible state machine feeding the `CountTable`
//! - `TallyEngine`: one session owning both, driven once per frame
//!
//! Nothing in this module performs I/O or can fail.

mod engine;
mod history;
mod matcher;
mod visibility;

pub use engine::{FrameReport, NewInstance, SharedTallyEngine, TallyEngine, TallySettings};
pub use history::{SpatialHistory, DEFAULT_HISTORY_CAPACITY};
pub use matcher::{IdentityMatcher, MatcherSettings, DEFAULT_MATCH_RADIUS_PX};
pub use visibility::{
    ClassObservation, CountTable, FrameObservations, IncrementRule, VisibilityCounter,
    VisibilitySettings, VisibilityState, VisibilityUpdate,
};
