//! Text-extraction adapter.
//!
//! Runs the Tesseract binary with TSV output and groups word rows into
//! line-level fragments. Word confidences come back as 0-100; fragments
//! carry the mean word confidence scaled into [0, 1].

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::models::TextFragment;
use crate::pipeline::{EngineError, ExtractionEngine};

/// Configuration for the extraction adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Whether text extraction is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tesseract language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Tesseract binary name or path.
    #[serde(default = "default_binary")]
    pub binary: String,
}

fn default_enabled() -> bool {
    true
}
fn default_language() -> String {
    "eng".to_string()
}
fn default_binary() -> String {
    "tesseract".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            language: default_language(),
            binary: default_binary(),
        }
    }
}

/// OCR client backed by the tesseract command-line binary.
pub struct TesseractClient {
    config: ExtractionConfig,
}

impl TesseractClient {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Check if the tesseract binary is present.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn run_tesseract(&self, image_path: &Path) -> Result<String, EngineError> {
        let output = Command::new(&self.config.binary)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .arg("tsv")
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                Ok(String::from_utf8_lossy(&out.stdout).to_string())
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(EngineError::Api(format!("tesseract failed: {}", stderr)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::Unavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(EngineError::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl ExtractionEngine for TesseractClient {
    async fn extract(&self, image: &[u8]) -> Result<Vec<TextFragment>, EngineError> {
        if !self.config.enabled {
            return Err(EngineError::Unavailable(
                "extraction is disabled in configuration".to_string(),
            ));
        }

        let dir = tempfile::tempdir().map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let image_path = dir.path().join("input.png");
        tokio::fs::write(&image_path, image)
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        let tsv = self.run_tesseract(&image_path).await?;
        let fragments = parse_tsv(&tsv);
        debug!(count = fragments.len(), "extraction finished");
        Ok(fragments)
    }
}

/// Parse Tesseract TSV output into line-level fragments.
///
/// Word rows (level 5) with non-negative confidence are grouped by
/// (block, paragraph, line); rows the engine marks with conf -1 are layout
/// metadata, not words.
fn parse_tsv(tsv: &str) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    let mut current_key: Option<(String, String, String)> = None;
    let mut words: Vec<String> = Vec::new();
    let mut confidences: Vec<f64> = Vec::new();

    let flush = |words: &mut Vec<String>, confidences: &mut Vec<f64>| {
        if words.is_empty() {
            return None;
        }
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        let fragment = TextFragment {
            text: words.join(" "),
            confidence: (mean / 100.0).clamp(0.0, 1.0),
        };
        words.clear();
        confidences.clear();
        Some(fragment)
    };

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let Ok(conf) = cols[10].parse::<f64>() else {
            continue;
        };
        if conf < 0.0 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = (
            cols[2].to_string(),
            cols[3].to_string(),
            cols[4].to_string(),
        );
        if current_key.as_ref() != Some(&key) {
            if let Some(fragment) = flush(&mut words, &mut confidences) {
                fragments.push(fragment);
            }
            current_key = Some(key);
        }
        words.push(text.to_string());
        confidences.push(conf);
    }
    if let Some(fragment) = flush(&mut words, &mut confidences) {
        fragments.push(fragment);
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: u32, par: u32, line: u32, word: u32, conf: f64, text: &str) -> String {
        format!("5\t1\t{block}\t{par}\t{line}\t{word}\t0\t0\t10\t10\t{conf}\t{text}")
    }

    #[test]
    fn test_groups_words_into_lines() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 1, 90.0, "EVIDENCE"),
            word_row(1, 1, 1, 2, 80.0, "#4521"),
            word_row(1, 1, 2, 1, 60.0, "HELP"),
        ]
        .join("\n");

        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "EVIDENCE #4521");
        assert!((fragments[0].confidence - 0.85).abs() < 1e-9);
        assert_eq!(fragments[1].text, "HELP");
        assert!((fragments[1].confidence - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_skips_layout_rows_and_empty_words() {
        let tsv = [
            HEADER.to_string(),
            // Layout rows carry conf -1.
            "4\t1\t1\t1\t1\t0\t0\t0\t10\t10\t-1\t".to_string(),
            word_row(1, 1, 1, 1, 95.0, "KNIFE"),
            word_row(1, 1, 1, 2, 95.0, "  "),
        ]
        .join("\n");

        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "KNIFE");
    }

    #[test]
    fn test_empty_output_yields_no_fragments() {
        assert!(parse_tsv(HEADER).is_empty());
        assert!(parse_tsv("").is_empty());
    }

    #[test]
    fn test_confidence_scaled_into_unit_range() {
        let tsv = [HEADER.to_string(), word_row(1, 1, 1, 1, 100.0, "CLEAR")].join("\n");
        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments[0].confidence, 1.0);
    }
}
