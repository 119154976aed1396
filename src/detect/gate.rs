use super::result::Detection;

/// Minimum confidence for a detection to reach the tally core.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.70;

/// Per-frame cap on forwarded detections.
pub const DEFAULT_MAX_DETECTIONS: usize = 10;

/// Filters raw detector output before it reaches the tally core.
///
/// Drops low-confidence (and non-finite) detections, then keeps the
/// `max_detections` most confident ones. Surviving detections keep their
/// original relative order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceGate {
    pub min_confidence: f32,
    pub max_detections: usize,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

impl ConfidenceGate {
    pub fn new(min_confidence: f32, max_detections: usize) -> Self {
        Self {
            min_confidence,
            max_detections,
        }
    }

    pub fn admits(&self, detection: &Detection) -> bool {
        detection.confidence.is_finite() && detection.confidence >= self.min_confidence
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let mut kept: Vec<(usize, Detection)> = detections
            .into_iter()
            .filter(|d| self.admits(d))
            .enumerate()
            .collect();

        if kept.len() > self.max_detections {
            kept.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence).then(a.0.cmp(&b.0)));
            kept.truncate(self.max_detections);
            kept.sort_by_key(|(idx, _)| *idx);
        }

        kept.into_iter().map(|(_, d)| d).collect()
    }
}
