//! Evidence produced by the detection and extraction engines.
//!
//! Both types are immutable once produced: the pipeline aggregates them across
//! images and hands them to the prompt builder, never mutating them.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in source-image pixel coordinates.
///
/// Invariant: `x1 <= x2` and `y1 <= y2`. The detection adapter normalizes
/// degenerate boxes from the engine before constructing one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a bounding box from possibly-unordered corner coordinates.
    pub fn normalized(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }
}

/// A single detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    /// Confidence in [0, 1]; clamped by the adapter.
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// A single recognized text span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Recognized text, possibly empty.
    pub text: String,
    /// Confidence in [0, 1]; clamped by the adapter.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_normalizes_corners() {
        let b = BoundingBox::normalized(10.0, 20.0, 5.0, 2.0);
        assert_eq!(
            b,
            BoundingBox {
                x1: 5.0,
                y1: 2.0,
                x2: 10.0,
                y2: 20.0
            }
        );
    }

    #[test]
    fn test_bounding_box_keeps_ordered_corners() {
        let b = BoundingBox::normalized(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            b,
            BoundingBox {
                x1: 1.0,
                y1: 2.0,
                x2: 3.0,
                y2: 4.0
            }
        );
    }
}
