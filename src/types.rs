use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extractor::normalize_url;

/// One article/item pulled from a feed. Identity is the normalized link;
/// entries are never mutated after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    /// Plain text, HTML already stripped.
    pub summary: String,
}

impl Entry {
    /// Identity key: scheme+host+path with the query string removed and the
    /// trailing slash stripped. Two entries with the same normalized link are
    /// the same logical article.
    pub fn normalized_link(&self) -> String {
        normalize_url(&self.link)
    }

    /// Render the entry the way it is embedded in prompts and counted against
    /// the token budget.
    pub fn render_block(&self) -> String {
        format!(
            "Title: {}\nSummary: {}\nLink: {}",
            self.title, self.summary, self.link
        )
    }
}

/// Parameters for one digest run.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub subject_area: String,
    pub content_type: String,
    pub audience: String,
    pub days_limit: u32,
    pub top_k: usize,
    pub summarize_top_entries: bool,
}

/// Output of the map stage for a single chunk.
#[derive(Debug, Clone)]
pub struct PartialSummary {
    pub text: String,
    pub cost: f64,
}

/// A chunk that failed after the client's retry budget was exhausted. The run
/// continues without it.
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub error: String,
}

/// A per-entry detail call that failed after retries; the run continues and
/// the entry is simply absent from `top_entries`.
#[derive(Debug, Clone)]
pub struct EntryFailure {
    pub link: String,
    pub error: String,
}

/// A single entry paired with its detailed summary and the cost of producing it.
#[derive(Debug, Clone)]
pub struct SummarizedEntry {
    pub entry: Entry,
    pub summary: String,
    pub cost: f64,
}

/// Terminal result of one digest run.
///
/// `bulk_summary == None` means ingestion found no new entries; that is a
/// valid terminal state, not an error. `raw_entries` is the full deduplicated
/// ingested set so callers can re-summarize any of them later without
/// re-fetching.
#[derive(Debug, Clone, Default)]
pub struct DigestResult {
    pub bulk_summary: Option<String>,
    pub bulk_cost: Option<f64>,
    pub raw_entries: Vec<Entry>,
    pub top_entries: Vec<SummarizedEntry>,
    pub total_entries: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    pub failed_entries: Vec<EntryFailure>,
}

/// Progress notifications emitted on the pipeline's event channel, one per
/// stage transition. `Done` is always the last event of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Fetching { feed_count: usize },
    NoNewEntries,
    SummarizingChunks { chunk_count: usize },
    Reducing,
    Extracting,
    SummarizingEntry { index: usize, total: usize },
    Done,
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressEvent::Fetching { feed_count } => {
                write!(f, "Fetching {} feeds...", feed_count)
            }
            ProgressEvent::NoNewEntries => write!(f, "No new entries found."),
            ProgressEvent::SummarizingChunks { chunk_count } => {
                write!(f, "Summarizing {} chunks...", chunk_count)
            }
            ProgressEvent::Reducing => write!(f, "Combining chunk summaries..."),
            ProgressEvent::Extracting => write!(f, "Extracting top sources..."),
            ProgressEvent::SummarizingEntry { index, total } => {
                write!(f, "Summarizing top entry {}/{}...", index + 1, total)
            }
            ProgressEvent::Done => write!(f, "Done."),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model error: {0}")]
    Llm(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
