//! Context assembly and answer generation.
//!
//! Builds a bounded prompt from retrieved chunks and calls the OpenAI chat
//! completions API. The context budget is a character count standing in for
//! a token budget (roughly 4 characters per token), sized to keep system
//! prompt + context + user message + completion inside the model's window
//! with margin.
//!
//! Provider errors are not retried here; they propagate so the HTTP layer
//! can reply with a generic failure message instead of provider internals.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::{Config, CHAT_MAX_TOKENS, CHAT_MODEL, CHAT_TEMPERATURE};
use crate::models::RetrievedChunk;

/// Character budget for the serialized context.
pub const MAX_CONTEXT_CHARS: usize = 6000;
/// Appended when the context had to be cut at the budget.
pub const TRUNCATION_MARKER: &str = "... [truncated]";
/// Character budget for the text fed to summary generation.
const SUMMARY_CONTEXT_CHARS: usize = 4000;

/// Reply used when retrieval produced nothing to ground an answer on.
pub const NOT_ENOUGH_INFORMATION: &str = "I don't have enough information in the selected \
sources to answer your question. Please try selecting different sources or rephrasing your \
question.";

/// Summary attached when generation fails; ingestion still succeeds.
pub const SUMMARY_FALLBACK: &str = "Summary generation failed. Document is ready for queries.";

const TIMEOUT: Duration = Duration::from_secs(60);

/// Join chunk texts in retrieval order and truncate to the context budget.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    let joined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_to_budget(&joined, MAX_CONTEXT_CHARS)
}

/// Cut `text` to at most `budget` characters, appending the truncation
/// marker when anything was dropped.
pub fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(budget).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

fn system_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant who helps resolve user queries based on the context \
available to you from the indexed documents.\n\n\
Instructions:\n\
- Answer based on the available context from the documents. Mention the source of \
information when possible.\n\
- If the context contains relevant information, provide a helpful and detailed answer.\n\
- If the context doesn't contain enough information to fully answer the question, mention \
that you don't have enough information and more details might be needed.\n\
- Be helpful and informative while staying grounded in the provided context.\n\n\
Context from documents:\n{}",
        context
    )
}

/// Client for the OpenAI chat completions API. Cheap to clone.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: config.openai_api_key.clone(),
        })
    }

    /// Answer `message` grounded in the retrieved chunks.
    pub async fn generate_answer(
        &self,
        message: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String> {
        let context = build_context(chunks);
        self.chat_completion(
            &system_prompt(&context),
            message,
            CHAT_TEMPERATURE,
            CHAT_MAX_TOKENS,
        )
        .await
    }

    /// Produce a 2-3 sentence summary of a document's chunk texts.
    ///
    /// Never fails the caller: any error is logged and replaced with
    /// [`SUMMARY_FALLBACK`] — summary quality is non-critical to ingestion.
    pub async fn generate_summary(&self, chunk_texts: &[String]) -> String {
        let context = truncate_to_budget(&chunk_texts.join("\n\n"), SUMMARY_CONTEXT_CHARS);
        let system = "You are an AI assistant that creates concise, informative summaries \
of documents. Create a 2-3 sentence summary that captures the main topics and key \
information from the provided content. Focus on the most important concepts and themes.";
        let user = format!(
            "Please create a summary of this document content:\n\n{}",
            context
        );

        match self.chat_completion(system, &user, 0.3, 200).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "summary generation failed, using fallback");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    async fn chat_completion(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": CHAT_MODEL,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI chat completion error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("Sorry, I could not generate a response.");

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            document_id: Some("d1".to_string()),
            source: Some("text_input".to_string()),
            score: 0.9,
        }
    }

    #[test]
    fn short_context_is_untouched() {
        let chunks = vec![chunk("alpha"), chunk("beta")];
        let context = build_context(&chunks);
        assert_eq!(context, "alpha\n\nbeta");
    }

    #[test]
    fn context_preserves_retrieval_order() {
        let chunks = vec![chunk("third"), chunk("first"), chunk("second")];
        let context = build_context(&chunks);
        let third = context.find("third").unwrap();
        let first = context.find("first").unwrap();
        assert!(third < first);
    }

    #[test]
    fn oversized_context_is_cut_at_budget_with_marker() {
        let chunks = vec![chunk(&"x".repeat(9000))];
        let context = build_context(&chunks);
        assert!(context.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            context.chars().count(),
            MAX_CONTEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn budget_boundary_is_exact() {
        let exact = "y".repeat(MAX_CONTEXT_CHARS);
        assert_eq!(truncate_to_budget(&exact, MAX_CONTEXT_CHARS), exact);

        let over = "y".repeat(MAX_CONTEXT_CHARS + 1);
        let cut = truncate_to_budget(&over, MAX_CONTEXT_CHARS);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let text = "é".repeat(MAX_CONTEXT_CHARS + 100);
        let cut = truncate_to_budget(&text, MAX_CONTEXT_CHARS);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            cut.chars().count(),
            MAX_CONTEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn system_prompt_embeds_context() {
        let prompt = system_prompt("THE CONTEXT");
        assert!(prompt.contains("THE CONTEXT"));
        assert!(prompt.contains("staying grounded"));
    }
}
