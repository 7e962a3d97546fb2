//! Map-reduce summarization over chunked entries.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{ChatClient, ChatMessage};
use crate::pricing::estimate_cost;
use crate::prompts;
use crate::types::{ChunkFailure, Entry, PartialSummary, Result};

/// Character targets passed to the prompt templates.
const CHUNK_SUMMARY_LENGTH: usize = 1000;
const REDUCE_SUMMARY_LENGTH: usize = 2000;
const ENTRY_SUMMARY_LENGTH: usize = 300;

/// Content-type label for the reduce call, whose "entries" are the partial
/// summaries themselves.
const REDUCE_CONTENT_TYPE: &str = "summaries";

pub struct Summarizer {
    llm: Arc<dyn ChatClient>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn ChatClient>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    fn messages(&self, system: String, user: String) -> Vec<ChatMessage> {
        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    async fn chat_with_cost(&self, messages: &[ChatMessage]) -> Result<(String, f64)> {
        let completion = self.llm.chat(messages).await?;
        let cost = estimate_cost(
            self.llm.model(),
            completion.prompt_tokens,
            completion.completion_tokens,
        );
        Ok((completion.content, cost))
    }

    /// Map stage: one sequential model call per chunk. Calls are deliberately
    /// not issued concurrently so cost and ordering stay attributable.
    ///
    /// A chunk whose call fails after the client's retry budget is recorded in
    /// the failure list and skipped; the remaining chunks still run.
    pub async fn summarize_chunks(
        &self,
        chunks: &[Vec<Entry>],
        subject_area: &str,
        audience_description: &str,
        content_type: &str,
        top_k: usize,
    ) -> (Vec<PartialSummary>, Vec<ChunkFailure>) {
        let mut partials = Vec::new();
        let mut failures = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            debug!("Summarizing chunk {}/{} ({} entries)", index + 1, chunks.len(), chunk.len());
            let blocks: Vec<String> = chunk.iter().map(|e| e.render_block()).collect();
            let messages = self.messages(
                prompts::system_prompt(subject_area, audience_description),
                prompts::bulk_prompt(
                    subject_area,
                    content_type,
                    &blocks,
                    top_k,
                    CHUNK_SUMMARY_LENGTH,
                ),
            );

            match self.chat_with_cost(&messages).await {
                Ok((text, cost)) => partials.push(PartialSummary { text, cost }),
                Err(e) => {
                    warn!("Chunk {} failed: {}", index + 1, e);
                    failures.push(ChunkFailure {
                        chunk_index: index,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Map stage complete: {} summaries, {} failed chunks",
            partials.len(),
            failures.len()
        );
        (partials, failures)
    }

    /// Reduce stage: exactly one model call that consolidates the partial
    /// summaries into the overall digest with a single Top Sources section.
    pub async fn reduce_summaries(
        &self,
        partial_texts: &[String],
        subject_area: &str,
        audience_description: &str,
        top_k: usize,
    ) -> Result<(String, f64)> {
        let messages = self.messages(
            prompts::system_prompt(subject_area, audience_description),
            prompts::bulk_prompt(
                subject_area,
                REDUCE_CONTENT_TYPE,
                partial_texts,
                top_k,
                REDUCE_SUMMARY_LENGTH,
            ),
        );
        self.chat_with_cost(&messages).await
    }

    /// Detailed summary of a single entry; one model call. Also used
    /// standalone to re-summarize a previously seen entry without repeating
    /// ingestion.
    pub async fn summarize_entry(
        &self,
        entry: &Entry,
        subject_area: &str,
        audience_description: &str,
        content_type: &str,
    ) -> Result<(String, f64)> {
        let messages = self.messages(
            prompts::system_prompt(subject_area, audience_description),
            prompts::entry_prompt(
                subject_area,
                content_type,
                &entry.title,
                &entry.summary,
                &entry.link,
                ENTRY_SUMMARY_LENGTH,
            ),
        );
        self.chat_with_cost(&messages).await
    }
}
