//! Extracted points and their distribution across the council.
//!
//! Points arrive from the preflight extraction stage as plain `{id, text}`
//! records. Inside a run they travel through an immutable [`PointQueue`]:
//! taking the front element returns a new queue rather than mutating shared
//! state, so no two recursion branches can observe each other's consumption.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A point of contention extracted from the content before the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPoint {
    /// Stable identifier assigned by the extraction stage.
    pub id: String,
    /// The point text itself.
    pub text: String,
}

impl ExtractedPoint {
    /// Create a point from an id and its text.
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
        }
    }
}

/// An immutable window over a shared slice of extracted points.
///
/// Cloning is cheap (an `Arc` bump plus two indices); consuming the front
/// yields a narrowed copy instead of mutating in place.
#[derive(Debug, Clone)]
pub struct PointQueue {
    points: Arc<[ExtractedPoint]>,
    start: usize,
    end: usize,
}

impl PointQueue {
    /// Build a queue over the given points.
    pub fn new(points: Vec<ExtractedPoint>) -> Self {
        let end = points.len();
        Self {
            points: points.into(),
            start: 0,
            end,
        }
    }

    /// An empty queue.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of points remaining in this window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether this window holds no points.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Split off the front point, returning it with the remainder queue.
    ///
    /// Returns `None` when the window is exhausted. The receiver is never
    /// mutated; branches that hold clones of `self` still see the original
    /// window.
    pub fn take_front(&self) -> Option<(ExtractedPoint, PointQueue)> {
        if self.is_empty() {
            return None;
        }
        let head = self.points[self.start].clone();
        let rest = Self {
            points: Arc::clone(&self.points),
            start: self.start + 1,
            end: self.end,
        };
        Some((head, rest))
    }

    /// Split the remaining points into `n` child queues, one point each.
    ///
    /// Child `i` receives the `i`-th remaining point; children past
    /// exhaustion receive empty queues. Order is preserved.
    pub fn distribute(&self, n: usize) -> Vec<PointQueue> {
        (0..n)
            .map(|i| {
                let at = self.start + i;
                if at < self.end {
                    Self {
                        points: Arc::clone(&self.points),
                        start: at,
                        end: at + 1,
                    }
                } else {
                    Self {
                        points: Arc::clone(&self.points),
                        start: self.end,
                        end: self.end,
                    }
                }
            })
            .collect()
    }

    /// Iterate the remaining points without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &ExtractedPoint> {
        self.points[self.start..self.end].iter()
    }
}

impl From<Vec<ExtractedPoint>> for PointQueue {
    fn from(points: Vec<ExtractedPoint>) -> Self {
        Self::new(points)
    }
}
