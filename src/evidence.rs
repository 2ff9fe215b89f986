//! Human-readable evidence lines.
//!
//! Each search match becomes one line used both in the model prompt and in
//! locally composed fallback answers. Output order and length always match
//! the input.

use crate::models::SearchMatch;

/// Placeholder for fields the search service did not return.
const MISSING: &str = "N/A";

/// Render one match as an evidence line.
///
/// Identifier, page and similarity are always present in the output (as
/// [`MISSING`] when absent). Token and billable-character counts are
/// appended only when the upstream provided them.
pub fn format_evidence_line(m: &SearchMatch) -> String {
    let id = m.document_id.as_deref().unwrap_or(MISSING);
    let page = m
        .document_page
        .map(|p| p.to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let similarity = m
        .similarity_score
        .map(|s| format!("{:.4}", s))
        .unwrap_or_else(|| MISSING.to_string());

    let mut line = format!(
        "Document ID: {}, Page: {}, Similarity: {}",
        id, page, similarity
    );
    if let Some(tokens) = m.tokens {
        line.push_str(&format!(", Tokens: {}", tokens));
    }
    if let Some(chars) = m.billable_characters {
        line.push_str(&format!(", Characters: {}", chars));
    }
    line
}

/// Render every match, preserving upstream rank order.
pub fn format_evidence(results: &[SearchMatch]) -> Vec<String> {
    results.iter().map(format_evidence_line).collect()
}
