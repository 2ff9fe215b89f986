//! Summary statistics over a ranked result list.

use std::collections::HashSet;

use crate::models::{ResultAnalysis, SearchMatch};

/// Compute [`ResultAnalysis`] for `results`.
///
/// Similarity statistics only consider matches that carry a score; when no
/// match does (including the empty input), all three are `0.0`.
/// `unique_documents` ignores matches without a `document_id`, and
/// `pages_covered` counts distinct `(document_id, document_page)` pairs where
/// both are present.
pub fn analyze_results(query: &str, results: &[SearchMatch]) -> ResultAnalysis {
    let scores: Vec<f64> = results.iter().filter_map(|r| r.similarity_score).collect();

    let (average, max, min) = if scores.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        // Summation error can push the mean a hair outside [min, max].
        (mean.clamp(min, max), max, min)
    };

    let documents: HashSet<&str> = results
        .iter()
        .filter_map(|r| r.document_id.as_deref())
        .collect();

    let pages: HashSet<(&str, i64)> = results
        .iter()
        .filter_map(|r| Some((r.document_id.as_deref()?, r.document_page?)))
        .collect();

    ResultAnalysis {
        total_results: results.len(),
        average_similarity: average,
        max_similarity: max,
        min_similarity: min,
        unique_documents: documents.len(),
        pages_covered: pages.len(),
        query: query.to_string(),
    }
}
