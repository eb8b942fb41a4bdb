//! Deterministic prompt construction from aggregated evidence.
//!
//! The output is a stable contract: identical findings, fragments, and
//! context produce byte-identical prompt text regardless of the order the
//! engines delivered them in, because everything is re-sorted here.

use super::ConfidenceBand;
use crate::models::{Finding, TextFragment};

/// Framing sentence for the reasoning stage.
const PROMPT_FRAMING: &str = "You are a forensic analyst reviewing evidence from a scene. \
Analyze the evidence below and provide a brief, professional hypothesis of what happened. \
List key observations first, then the hypothesis. No dramatic narration.";

/// Marker rendered when an evidence line has no entries.
const NONE_DETECTED: &str = "none detected";
/// Marker rendered when the caller supplied no context.
const NONE_PROVIDED: &str = "none provided";

/// Build the instruction for the inference engine.
///
/// Findings are sorted by confidence descending then label ascending;
/// fragments by confidence descending then text ascending. Ties sort on the
/// secondary key so the output stays byte-stable.
pub fn build_prompt(findings: &[Finding], fragments: &[TextFragment], context: &str) -> String {
    let mut findings: Vec<&Finding> = findings.iter().collect();
    findings.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.label.cmp(&b.label))
    });

    let mut fragments: Vec<&TextFragment> = fragments.iter().collect();
    fragments.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.text.cmp(&b.text))
    });

    let objects_line = if findings.is_empty() {
        NONE_DETECTED.to_string()
    } else {
        findings
            .iter()
            .map(|f| format!("{} {}", ConfidenceBand::classify(f.confidence).as_tag(), f.label))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let text_line = if fragments.is_empty() {
        NONE_DETECTED.to_string()
    } else {
        fragments
            .iter()
            .map(|t| {
                format!(
                    "{} \"{}\"",
                    ConfidenceBand::classify(t.confidence).as_tag(),
                    t.text
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    let context_line = if context.is_empty() {
        NONE_PROVIDED
    } else {
        context
    };

    format!(
        "{PROMPT_FRAMING}\n\nObjects at scene: {objects_line}\nText found: {text_line}\nAdditional Context: {context_line}"
    )
}
