//! Object-detection adapter.
//!
//! Calls an external detector service over HTTP and normalizes its raw
//! output into `Finding`s: confidences clamped into [0, 1], bounding boxes
//! reordered so x1 <= x2 and y1 <= y2. Engine output order is preserved;
//! deterministic ordering happens later in the prompt builder.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{BoundingBox, Finding};
use crate::pipeline::{DetectionEngine, EngineError};

/// Configuration for the detection adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Whether object detection is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Detector service endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Minimum confidence to keep a raw detection.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:8600".to_string()
}
fn default_min_confidence() -> f64 {
    0.05
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl DetectionConfig {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// Raw detection as returned by the detector service.
#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    confidence: f64,
    /// Corner coordinates [x1, y1, x2, y2] in source-image pixels.
    #[serde(rename = "box")]
    bbox: [f64; 4],
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    objects: Vec<RawDetection>,
}

/// HTTP client for the external detector service.
pub struct DetectionClient {
    config: DetectionConfig,
    client: Client,
}

impl DetectionClient {
    pub fn new(config: DetectionConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Check if the detector service is reachable.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/health", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn normalize(&self, raw: Vec<RawDetection>) -> Vec<Finding> {
        raw.into_iter()
            .filter(|d| d.confidence >= self.config.min_confidence)
            .map(|d| Finding {
                label: d.label,
                confidence: d.confidence.clamp(0.0, 1.0),
                bbox: BoundingBox::normalized(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
            })
            .collect()
    }
}

#[async_trait]
impl DetectionEngine for DetectionClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Finding>, EngineError> {
        if !self.config.enabled {
            return Err(EngineError::Unavailable(
                "detection is disabled in configuration".to_string(),
            ));
        }

        let url = format!("{}/v1/detect", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: DetectResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        let findings = self.normalize(parsed.objects);
        debug!(count = findings.len(), "detection finished");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DetectionClient {
        DetectionClient::new(DetectionConfig::default()).unwrap()
    }

    fn raw(label: &str, confidence: f64, bbox: [f64; 4]) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_normalize_clamps_confidence() {
        let findings = client().normalize(vec![
            raw("person", 1.3, [0.0, 0.0, 5.0, 5.0]),
            raw("knife", 0.9, [0.0, 0.0, 5.0, 5.0]),
        ]);
        assert_eq!(findings[0].confidence, 1.0);
        assert_eq!(findings[1].confidence, 0.9);
    }

    #[test]
    fn test_normalize_reorders_degenerate_boxes() {
        let findings = client().normalize(vec![raw("person", 0.9, [20.0, 30.0, 10.0, 5.0])]);
        let bbox = findings[0].bbox;
        assert!(bbox.x1 <= bbox.x2);
        assert!(bbox.y1 <= bbox.y2);
        assert_eq!(bbox.x1, 10.0);
        assert_eq!(bbox.y2, 30.0);
    }

    #[test]
    fn test_normalize_preserves_engine_order() {
        let findings = client().normalize(vec![
            raw("knife", 0.6, [0.0, 0.0, 1.0, 1.0]),
            raw("person", 0.95, [0.0, 0.0, 1.0, 1.0]),
        ]);
        // Engine order kept; the prompt builder does the sorting.
        assert_eq!(findings[0].label, "knife");
        assert_eq!(findings[1].label, "person");
    }

    #[test]
    fn test_normalize_drops_below_min_confidence() {
        let findings = client().normalize(vec![raw("noise", 0.01, [0.0, 0.0, 1.0, 1.0])]);
        assert!(findings.is_empty());
    }
}
