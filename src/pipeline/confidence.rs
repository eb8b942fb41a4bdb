//! Qualitative confidence bands for evidence scores.

use serde::{Deserialize, Serialize};

/// Discretized confidence level for a detection or text score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Classify a score in [0, 1] into a band.
    ///
    /// Thresholds: >= 0.80 is High, >= 0.50 is Medium, everything below is
    /// Low. Callers clamp scores into [0, 1] before classifying.
    pub fn classify(score: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&score), "score outside [0, 1]");
        if score >= 0.80 {
            Self::High
        } else if score >= 0.50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Bracketed tag used when rendering evidence into the prompt.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::High => "[HIGH]",
            Self::Medium => "[MEDIUM]",
            Self::Low => "[LOW]",
        }
    }
}
