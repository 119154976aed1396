use std::collections::VecDeque;

use crate::detect::Point;

/// Default number of accepted points remembered per class.
pub const DEFAULT_HISTORY_CAPACITY: usize = 40;

/// Bounded ring buffer of accepted center points for one class.
///
/// - Holds at most `capacity` points
/// - Evicts the oldest point first when full
/// - Only grows by `push`; nothing clears it
#[derive(Clone, Debug)]
pub struct SpatialHistory {
    points: VecDeque<Point>,
    capacity: usize,
}

impl SpatialHistory {
    /// A capacity of zero is clamped to one so the buffer can always hold the latest point.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point. Returns the evicted point when the buffer was full.
    pub fn push(&mut self, point: Point) -> Option<Point> {
        let evicted = if self.points.len() >= self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    /// True when any remembered point lies strictly closer than `radius`.
    pub fn any_within(&self, point: &Point, radius: f64) -> bool {
        self.iter().any(|p| p.distance_to(point) < radius)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn oldest(&self) -> Option<&Point> {
        self.points.front()
    }

    pub fn newest(&self) -> Option<&Point> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SpatialHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}
