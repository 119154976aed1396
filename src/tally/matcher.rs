use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::history::{SpatialHistory, DEFAULT_HISTORY_CAPACITY};
use crate::detect::Point;

/// Default same-instance radius in pixels.
pub const DEFAULT_MATCH_RADIUS_PX: f64 = 400.0;

/// Parameters for proximity matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatcherSettings {
    /// Points strictly closer than this to a remembered point are the same instance.
    pub match_radius_px: f64,
    /// Remembered points per class.
    pub history_capacity: usize,
    /// Resolution the radius was tuned against. `None` disables scaling.
    pub reference_resolution: Option<(u32, u32)>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            match_radius_px: DEFAULT_MATCH_RADIUS_PX,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            reference_resolution: None,
        }
    }
}

impl MatcherSettings {
    /// Radius to use for a frame of the given size.
    ///
    /// Scales with the frame diagonal relative to `reference_resolution`.
    pub fn radius_for_frame(&self, width: u32, height: u32) -> f64 {
        match self.reference_resolution {
            Some((ref_w, ref_h)) if ref_w > 0 && ref_h > 0 && width > 0 && height > 0 => {
                let reference = diagonal(ref_w, ref_h);
                self.match_radius_px * diagonal(width, height) / reference
            }
            _ => self.match_radius_px,
        }
    }
}

fn diagonal(width: u32, height: u32) -> f64 {
    let w = width as f64;
    let h = height as f64;
    (w * w + h * h).sqrt()
}

/// Decides whether a detection is a new spatial instance of its class.
///
/// Identity is proximity only: no track IDs, no time-based eviction. A
/// detection near any remembered point of its class is the same instance.
#[derive(Clone, Debug)]
pub struct IdentityMatcher {
    histories: HashMap<String, SpatialHistory>,
    radius: f64,
    capacity: usize,
}

impl IdentityMatcher {
    pub fn new(settings: &MatcherSettings) -> Self {
        Self {
            histories: HashMap::new(),
            radius: settings.match_radius_px,
            capacity: settings.history_capacity,
        }
    }

    /// Returns true and remembers the point when no stored point of
    /// `class_name` is within the radius. Returns false otherwise and leaves
    /// the history untouched.
    pub fn accept(&mut self, class_name: &str, x: i32, y: i32) -> bool {
        let point = Point::new(x, y);
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(class_name.to_string())
            .or_insert_with(|| SpatialHistory::with_capacity(capacity));

        if history.any_within(&point, self.radius) {
            return false;
        }

        if let Some(evicted) = history.push(point) {
            log::trace!(
                "{}: history full, evicted ({}, {})",
                class_name,
                evicted.x,
                evicted.y
            );
        }
        true
    }

    /// Replace the radius, e.g. after the source reports its resolution.
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn history(&self, class_name: &str) -> Option<&SpatialHistory> {
        self.histories.get(class_name)
    }

    pub fn known_classes(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(|k| k.as_str())
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(&MatcherSettings::default())
    }
}
