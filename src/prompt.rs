//! Prompt construction for the model gateway.
//!
//! A prompt is always two messages: a fixed system framing and a user
//! message that embeds the question, the result statistics and the evidence
//! block. When nothing was found the user message instead asks the model to
//! explain the empty result and help the user search again.

use serde::{Deserialize, Serialize};

use crate::models::ResultAnalysis;

pub const SYSTEM_PROMPT: &str = "You are an AI assistant that analyzes results from a \
semantic document search system. You receive a user's question together with metadata \
about the best matching document pages: document identifiers, page numbers, similarity \
scores and size information. Explain what the matches suggest about where the answer is \
likely to be found, how relevant they are, and what the user should look at next. Be \
concise, factual and do not invent document contents you were not given.";

/// One chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// System and user framing for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Build the prompt for `query` from its evidence lines and analysis.
pub fn build_prompt(query: &str, evidence: &[String], analysis: &ResultAnalysis) -> ChatPrompt {
    let user = if evidence.is_empty() {
        format!(
            "User question: \"{query}\"\n\
             \n\
             The semantic search returned no matching documents for this question.\n\
             \n\
             Please provide:\n\
             1. A short explanation of why the search may have returned no results\n\
             2. Suggestions for refining or rephrasing the query\n\
             3. Alternative approaches the user could try to find this information"
        )
    } else {
        let evidence_block = evidence
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}. {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "User question: \"{query}\"\n\
             \n\
             Search analysis:\n\
             - Total matches: {total}\n\
             - Best similarity: {best:.3}\n\
             - Average similarity: {avg:.3}\n\
             \n\
             Matching document pages:\n\
             {evidence_block}\n\
             \n\
             Please:\n\
             - Assess how relevant these matches are to the question\n\
             - Identify patterns across the matching documents and pages\n\
             - Provide insights about where the answer is most likely found\n\
             - Suggest concrete next steps for the user",
            total = analysis.total_results,
            best = analysis.max_similarity,
            avg = analysis.average_similarity,
        )
    };

    ChatPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
