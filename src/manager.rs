//! Pipeline orchestration and session state.
//!
//! A `SummaryManager` is one explicit session: it owns the seen-link set and
//! must not be shared across concurrent runs without external synchronization,
//! since `get_new_entries` both reads and mutates that set.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::chunker::chunk_entries;
use crate::config::Config;
use crate::extractor::{count_source_lines, extract_top_entries};
use crate::fetcher::FetchFeeds;
use crate::llm::ChatClient;
use crate::summarizer::Summarizer;
use crate::types::{
    DigestError, DigestRequest, DigestResult, Entry, EntryFailure, ProgressEvent, Result,
    SummarizedEntry,
};

/// Token budget for one bulk summarization call.
pub const DEFAULT_TOKEN_BUDGET: usize = 6000;
/// Simultaneous feed downloads.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 5;

pub struct SummaryManager {
    config: Config,
    fetcher: Arc<dyn FetchFeeds>,
    summarizer: Summarizer,
    seen_links: HashSet<String>,
    token_budget: usize,
    fetch_concurrency: usize,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl SummaryManager {
    pub fn new(config: Config, fetcher: Arc<dyn FetchFeeds>, llm: Arc<dyn ChatClient>) -> Self {
        Self {
            config,
            fetcher,
            summarizer: Summarizer::new(llm),
            seen_links: HashSet::new(),
            token_budget: DEFAULT_TOKEN_BUDGET,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            progress: None,
        }
    }

    /// Attach a channel that receives one event per pipeline stage; `Done` is
    /// always the last event of a run.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_token_budget(mut self, token_budget: usize) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    fn emit(&self, event: ProgressEvent) {
        debug!("{}", event);
        if let Some(sender) = &self.progress {
            // A dropped receiver just means nobody is listening.
            let _ = sender.send(event);
        }
    }

    /// Fetch recent entries from `urls` and drop anything already seen this
    /// session. Every returned entry's normalized link is recorded as seen.
    pub async fn get_new_entries(&mut self, urls: &[String], days_limit: u32) -> Vec<Entry> {
        let entries = self
            .fetcher
            .fetch_recent(urls, days_limit, self.fetch_concurrency)
            .await;

        let mut new_entries = Vec::new();
        for entry in entries {
            let key = entry.normalized_link();
            if self.seen_links.contains(&key) {
                continue;
            }
            self.seen_links.insert(key);
            new_entries.push(entry);
        }
        info!("{} new entries after session dedup", new_entries.len());
        new_entries
    }

    /// Run the full pipeline: fetch, chunk, map-reduce summarize, extract top
    /// sources, and optionally produce a detailed summary per top entry.
    ///
    /// An empty fetch terminates early with `bulk_summary = None`; that is a
    /// normal outcome, not an error.
    pub async fn summarize(&mut self, request: &DigestRequest) -> Result<DigestResult> {
        // Resolve configuration up front so bad keys fail before any fetch.
        let feeds = self
            .config
            .feeds_for(&request.subject_area, &request.content_type)?
            .to_vec();
        let audience = self
            .config
            .audience_description(&request.audience)?
            .to_string();

        self.emit(ProgressEvent::Fetching { feed_count: feeds.len() });
        let entries = self.get_new_entries(&feeds, request.days_limit).await;

        if entries.is_empty() {
            self.emit(ProgressEvent::NoNewEntries);
            self.emit(ProgressEvent::Done);
            return Ok(DigestResult::default());
        }

        let chunks = chunk_entries(&entries, self.summarizer.model(), self.token_budget);
        self.emit(ProgressEvent::SummarizingChunks { chunk_count: chunks.len() });

        let (partials, failed_chunks) = self
            .summarizer
            .summarize_chunks(
                &chunks,
                &request.subject_area,
                &audience,
                &request.content_type,
                request.top_k,
            )
            .await;

        if partials.is_empty() {
            return Err(DigestError::Llm(format!(
                "all {} chunks failed to summarize",
                chunks.len()
            )));
        }

        let mut total_cost: f64 = partials.iter().map(|p| p.cost).sum();
        let partial_texts: Vec<String> = partials.into_iter().map(|p| p.text).collect();

        self.emit(ProgressEvent::Reducing);
        let (mut bulk_summary, reduce_cost) = self
            .summarizer
            .reduce_summaries(&partial_texts, &request.subject_area, &audience, request.top_k)
            .await?;
        total_cost += reduce_cost;

        self.emit(ProgressEvent::Extracting);
        let (mut selected, mut selected_urls) =
            extract_top_entries(&bulk_summary, &entries, request.top_k);

        // Schema check on the reduce output: retry the reduce step once only
        // when no Top Sources line parsed at all, meaning the model broke the
        // section contract. Lines that parsed but matched no known entry are
        // accepted as an empty selection.
        if selected.is_empty() && count_source_lines(&bulk_summary) == 0 {
            warn!("Reduce output contained no parseable Top Sources lines, retrying reduce");
            let (retry_summary, retry_cost) = self
                .summarizer
                .reduce_summaries(&partial_texts, &request.subject_area, &audience, request.top_k)
                .await?;
            total_cost += retry_cost;
            let (retry_selected, retry_urls) =
                extract_top_entries(&retry_summary, &entries, request.top_k);
            if !retry_selected.is_empty() {
                bulk_summary = retry_summary;
                selected = retry_selected;
                selected_urls = retry_urls;
            }
        }
        info!("Selected {} top entries ({} urls)", selected.len(), selected_urls.len());

        let mut top_entries = Vec::new();
        let mut failed_entries = Vec::new();
        if request.summarize_top_entries && !selected.is_empty() {
            let total = selected.len();
            for (index, entry) in selected.iter().enumerate() {
                self.emit(ProgressEvent::SummarizingEntry { index, total });
                match self
                    .summarizer
                    .summarize_entry(entry, &request.subject_area, &audience, &request.content_type)
                    .await
                {
                    Ok((summary, cost)) => {
                        total_cost += cost;
                        top_entries.push(SummarizedEntry {
                            entry: entry.clone(),
                            summary,
                            cost,
                        });
                    }
                    Err(e) => {
                        warn!("Detailed summary failed for {}: {}", entry.link, e);
                        failed_entries.push(EntryFailure {
                            link: entry.link.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        self.emit(ProgressEvent::Done);
        Ok(DigestResult {
            bulk_summary: Some(bulk_summary),
            bulk_cost: Some(total_cost),
            total_entries: entries.len(),
            raw_entries: entries,
            top_entries,
            failed_chunks,
            failed_entries,
        })
    }

    /// Re-summarize one already-known entry without repeating ingestion;
    /// exactly one model call.
    pub async fn summarize_selected(
        &self,
        entry: &Entry,
        subject_area: &str,
        audience_key: &str,
        content_type: &str,
    ) -> Result<SummarizedEntry> {
        let audience = self.config.audience_description(audience_key)?.to_string();
        let (summary, cost) = self
            .summarizer
            .summarize_entry(entry, subject_area, &audience, content_type)
            .await?;
        Ok(SummarizedEntry {
            entry: entry.clone(),
            summary,
            cost,
        })
    }

    /// Number of distinct links seen so far in this session.
    pub fn seen_count(&self) -> usize {
        self.seen_links.len()
    }
}
