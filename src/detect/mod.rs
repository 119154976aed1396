mod gate;
mod result;

pub use gate::{ConfidenceGate, DEFAULT_MAX_DETECTIONS, DEFAULT_MIN_CONFIDENCE};
pub use result::{BoundingBox, Detection, FrameDetections, Point};
