//! Locally composed answers used when the model is not available.
//!
//! The output has the same shape whether or not anything was found, and can
//! carry a short note explaining why the model was skipped. Composition is a
//! pure string transform and cannot fail.

use crate::models::ResultAnalysis;

/// How many evidence lines a fallback answer quotes.
const MAX_QUOTED_EVIDENCE: usize = 3;

/// Why a locally composed answer replaced the model's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No model credential is configured.
    NotConfigured,
    /// The model call exceeded its timeout.
    Timeout,
    /// Transport or HTTP failure talking to the gateway.
    Connection,
    /// Anything else that went wrong during the model call.
    Error,
}

impl FallbackReason {
    pub fn note(self) -> &'static str {
        match self {
            FallbackReason::NotConfigured => {
                "AI analysis is not configured for this service, so this summary was \
                 generated directly from the search results."
            }
            FallbackReason::Timeout => {
                "The AI service is taking too long to respond, so this summary was \
                 generated directly from the search results."
            }
            FallbackReason::Connection => {
                "There was trouble connecting to the AI service, so this summary was \
                 generated directly from the search results."
            }
            FallbackReason::Error => {
                "An error occurred while generating the AI response, so this summary \
                 was generated directly from the search results."
            }
        }
    }
}

/// Compose an answer for `query` without calling the model.
pub fn compose_fallback(
    query: &str,
    evidence: &[String],
    analysis: &ResultAnalysis,
    reason: Option<FallbackReason>,
) -> String {
    let mut lines = vec![format!("Search results for: \"{}\"", query), String::new()];

    if evidence.is_empty() {
        lines.push("No matching documents were found for this query.".to_string());
        lines.push(String::new());
        lines.push("Suggestions:".to_string());
        lines.push("- Try different or more general keywords".to_string());
        lines.push("- Check the spelling of key terms".to_string());
        lines.push("- Make sure the relevant documents have been indexed".to_string());
    } else {
        lines.push("Summary:".to_string());
        lines.push(format!("- Total results: {}", analysis.total_results));
        lines.push(format!(
            "- Best similarity: {}",
            percent(analysis.max_similarity)
        ));
        lines.push(format!(
            "- Average similarity: {}",
            percent(analysis.average_similarity)
        ));
        lines.push(format!("- Unique documents: {}", analysis.unique_documents));
        lines.push(String::new());
        lines.push("Top matches:".to_string());
        for (i, line) in evidence.iter().take(MAX_QUOTED_EVIDENCE).enumerate() {
            lines.push(format!("{}. {}", i + 1, line));
        }
        if evidence.len() > MAX_QUOTED_EVIDENCE {
            lines.push(format!(
                "({} more matches not shown)",
                evidence.len() - MAX_QUOTED_EVIDENCE
            ));
        }
        lines.push(String::new());
        lines.push("Suggested next steps:".to_string());
        lines.push("- Open the top-ranked pages listed above".to_string());
        lines.push("- Narrow the query to focus on a specific detail".to_string());
        lines.push("- Request a specific document and page for full content".to_string());
    }

    if let Some(reason) = reason {
        lines.push(String::new());
        lines.push(format!("Note: {}", reason.note()));
    }

    lines.join("\n")
}

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_results;
    use crate::evidence::format_evidence;
    use crate::models::SearchMatch;

    const ALL_REASONS: [Option<FallbackReason>; 5] = [
        None,
        Some(FallbackReason::NotConfigured),
        Some(FallbackReason::Timeout),
        Some(FallbackReason::Connection),
        Some(FallbackReason::Error),
    ];

    fn matches(n: usize) -> Vec<SearchMatch> {
        (0..n)
            .map(|i| SearchMatch {
                document_id: Some(format!("doc-{}", i)),
                document_page: Some(i as i64 + 1),
                similarity_score: Some(0.9 - i as f64 * 0.1),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_empty_evidence_block() {
        let analysis = analyze_results("xyz", &[]);
        let text = compose_fallback("xyz", &[], &analysis, None);
        assert!(text.contains("\"xyz\""));
        assert!(text.contains("No matching documents were found"));
        assert_eq!(text.lines().filter(|l| l.starts_with("- ")).count(), 3);
        assert!(!text.contains("Note:"));
    }

    #[test]
    fn test_non_empty_quotes_first_three_lines() {
        let results = matches(5);
        let evidence = format_evidence(&results);
        let analysis = analyze_results("q", &results);
        let text = compose_fallback("q", &evidence, &analysis, None);

        for line in &evidence[..3] {
            assert!(text.contains(line.as_str()));
        }
        assert!(!text.contains(evidence[3].as_str()));
        assert!(text.contains("(2 more matches not shown)"));
        assert!(text.contains("- Total results: 5"));
        assert!(text.contains("- Best similarity: 90.0%"));
        assert!(text.contains("- Unique documents: 5"));
        assert!(text.contains("Suggested next steps:"));
    }

    #[test]
    fn test_notes_are_distinct() {
        let notes: std::collections::HashSet<&str> = ALL_REASONS
            .iter()
            .flatten()
            .map(|r| r.note())
            .collect();
        assert_eq!(notes.len(), 4);
        assert!(FallbackReason::Timeout.note().contains("taking too long"));
        assert!(FallbackReason::Connection.note().contains("trouble connecting"));
        assert!(FallbackReason::NotConfigured.note().contains("not configured"));
        assert!(FallbackReason::Error.note().contains("error occurred"));
    }

    #[test]
    fn test_note_follows_blank_line() {
        let results = matches(2);
        let evidence = format_evidence(&results);
        let analysis = analyze_results("q", &results);
        let text = compose_fallback("q", &evidence, &analysis, Some(FallbackReason::Timeout));

        assert!(text.starts_with("Search results for: \"q\"\n\nSummary:"));
        assert!(text.contains("\n\nNote: The AI service is taking too long"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_never_empty_for_any_combination() {
        for n in [0, 1, 2, 3, 4, 10] {
            let results = matches(n);
            let evidence = format_evidence(&results);
            let analysis = analyze_results("", &results);
            for reason in ALL_REASONS {
                let text = compose_fallback("", &evidence, &analysis, reason);
                assert!(!text.is_empty());
                if let Some(r) = reason {
                    assert!(text.ends_with(r.note()));
                }
            }
        }
    }
}
