use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use feed_digest::pricing::estimate_cost;
use feed_digest::{
    ChatClient, ChatCompletion, ChatMessage, Config, DigestError, DigestRequest, Entry,
    FetchFeeds, ProgressEvent, SummaryManager,
};

const MODEL: &str = "gpt-4o-mini";
const PROMPT_TOKENS: u64 = 100;
const COMPLETION_TOKENS: u64 = 50;

/// Chat client that replays a fixed script of replies with constant token
/// usage, so per-call costs are predictable.
struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    fn model(&self) -> &str {
        MODEL
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> feed_digest::Result<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err("script exhausted".to_string()));
        match next {
            Ok(content) => Ok(ChatCompletion {
                content,
                prompt_tokens: PROMPT_TOKENS,
                completion_tokens: COMPLETION_TOKENS,
            }),
            Err(e) => Err(DigestError::Llm(e)),
        }
    }
}

/// Fetcher that serves canned entries, applying the same recency filter as the
/// real implementation.
struct StubFetcher {
    entries: Vec<Entry>,
}

#[async_trait]
impl FetchFeeds for StubFetcher {
    async fn fetch_recent(
        &self,
        _urls: &[String],
        days_limit: u32,
        _concurrency: usize,
    ) -> Vec<Entry> {
        let cutoff = Utc::now() - Duration::days(days_limit as i64);
        let mut recent: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| e.published > cutoff)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.published.cmp(&a.published));
        recent
    }
}

fn entry(link: &str, hours_ago: i64) -> Entry {
    Entry {
        title: format!("Article {}", link),
        link: link.to_string(),
        published: Utc::now() - Duration::hours(hours_ago),
        summary: "A short plain-text summary of the article body.".to_string(),
    }
}

fn request(top_k: usize, summarize_top: bool) -> DigestRequest {
    DigestRequest {
        subject_area: "astro".to_string(),
        content_type: "news".to_string(),
        audience: "general".to_string(),
        days_limit: 1,
        top_k,
        summarize_top_entries: summarize_top,
    }
}

fn per_call_cost() -> f64 {
    estimate_cost(MODEL, PROMPT_TOKENS, COMPLETION_TOKENS)
}

#[tokio::test]
async fn end_to_end_digest_with_top_entry_summaries() {
    let _ = tracing_subscriber::fmt().try_init();

    // Three feeds: two contribute only stale entries, one contributes four
    // qualifying entries with distinct links.
    let mut entries = vec![
        entry("https://stale.example.com/one", 24 * 10),
        entry("https://stale.example.com/two", 24 * 9),
    ];
    entries.extend([
        entry("https://fresh.example.com/a", 2),
        entry("https://fresh.example.com/b", 3),
        entry("https://fresh.example.com/c", 4),
        entry("https://fresh.example.com/d", 5),
    ]);

    let reduce_reply = "Overall digest text.\n\n\
        Top Sources:\n\
        1. Article B - https://fresh.example.com/b - why it matters\n\
        2. Article D - https://fresh.example.com/d - a second pick";
    let chat = ScriptedChat::new(vec![
        Ok("partial summary of the single chunk".to_string()),
        Ok(reduce_reply.to_string()),
        Ok("detailed summary of B".to_string()),
        Ok("detailed summary of D".to_string()),
    ]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = SummaryManager::new(
        Config::new(),
        Arc::new(StubFetcher { entries }),
        chat.clone(),
    )
    .with_progress(tx);

    let result = manager.summarize(&request(2, true)).await.unwrap();

    assert_eq!(result.total_entries, 4);
    assert_eq!(result.raw_entries.len(), 4);
    assert_eq!(result.top_entries.len(), 2);
    assert!(result.failed_chunks.is_empty());
    assert!(result.bulk_summary.is_some());

    // Top entries follow the model's emitted order, not feed order.
    assert_eq!(result.top_entries[0].entry.link, "https://fresh.example.com/b");
    assert_eq!(result.top_entries[1].entry.link, "https://fresh.example.com/d");

    // One chunk call + one reduce call + two per-entry calls.
    assert_eq!(chat.call_count(), 4);
    let expected_cost = 4.0 * per_call_cost();
    assert!((result.bulk_cost.unwrap() - expected_cost).abs() < 1e-9);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(ProgressEvent::Fetching { feed_count }) if *feed_count > 0));
    assert!(events.contains(&ProgressEvent::Reducing));
    assert!(events.contains(&ProgressEvent::Extracting));
    assert_eq!(events.last(), Some(&ProgressEvent::Done));
}

#[tokio::test]
async fn no_new_entries_is_a_normal_terminal_state() {
    let _ = tracing_subscriber::fmt().try_init();

    let chat = ScriptedChat::new(vec![]);
    let fetcher = StubFetcher {
        entries: vec![entry("https://stale.example.com/old", 24 * 30)],
    };
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let result = manager.summarize(&request(5, true)).await.unwrap();

    assert!(result.bulk_summary.is_none());
    assert!(result.bulk_cost.is_none());
    assert!(result.raw_entries.is_empty());
    assert!(result.top_entries.is_empty());
    assert_eq!(result.total_entries, 0);
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn session_dedup_spans_runs_and_url_variants() {
    let _ = tracing_subscriber::fmt().try_init();

    // The same logical article under query-string and trailing-slash variants.
    let fetcher = StubFetcher {
        entries: vec![
            entry("https://fresh.example.com/a", 2),
            entry("https://fresh.example.com/a/?utm_source=rss", 3),
        ],
    };
    let chat = ScriptedChat::new(vec![
        Ok("partial".to_string()),
        Ok("Top Sources:\n1. A - https://fresh.example.com/a - pick".to_string()),
    ]);
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let first = manager.summarize(&request(5, false)).await.unwrap();
    assert_eq!(first.total_entries, 1, "url variants must collapse to one entry");

    // Second run sees the same feed content; everything is already seen.
    let second = manager.summarize(&request(5, false)).await.unwrap();
    assert!(second.bulk_summary.is_none());
    assert_eq!(second.total_entries, 0);
    assert_eq!(chat.call_count(), 2);
}

#[tokio::test]
async fn failed_chunk_is_recorded_and_run_continues() {
    let _ = tracing_subscriber::fmt().try_init();

    let fetcher = StubFetcher {
        entries: vec![
            entry("https://fresh.example.com/a", 2),
            entry("https://fresh.example.com/b", 3),
        ],
    };
    let chat = ScriptedChat::new(vec![
        Err("model unavailable".to_string()),
        Ok("partial for the surviving chunk".to_string()),
        Ok("Top Sources:\n1. B - https://fresh.example.com/b - pick".to_string()),
    ]);

    // A tiny budget forces one chunk per entry.
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone())
        .with_token_budget(10);

    let result = manager.summarize(&request(5, false)).await.unwrap();

    assert_eq!(result.failed_chunks.len(), 1);
    assert_eq!(result.failed_chunks[0].chunk_index, 0);
    assert!(result.bulk_summary.is_some());
    // Only the successful map call and the reduce call are billed.
    let expected_cost = 2.0 * per_call_cost();
    assert!((result.bulk_cost.unwrap() - expected_cost).abs() < 1e-9);
}

#[tokio::test]
async fn reduce_is_retried_once_when_top_sources_do_not_parse() {
    let _ = tracing_subscriber::fmt().try_init();

    let fetcher = StubFetcher {
        entries: vec![entry("https://fresh.example.com/a", 2)],
    };
    let chat = ScriptedChat::new(vec![
        Ok("partial".to_string()),
        Ok("a digest that forgot the contract entirely".to_string()),
        Ok("Top Sources:\n1. A - https://fresh.example.com/a - pick".to_string()),
    ]);
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let result = manager.summarize(&request(3, false)).await.unwrap();

    assert_eq!(chat.call_count(), 3);
    let expected_cost = 3.0 * per_call_cost();
    assert!((result.bulk_cost.unwrap() - expected_cost).abs() < 1e-9);
    assert!(result.bulk_summary.unwrap().contains("Top Sources"));
}

#[tokio::test]
async fn unmatched_source_lines_do_not_trigger_a_reduce_retry() {
    let _ = tracing_subscriber::fmt().try_init();

    let fetcher = StubFetcher {
        entries: vec![entry("https://fresh.example.com/a", 2)],
    };
    // The section parses fine but lists a URL that matches no ingested entry;
    // that is an empty selection, not a contract violation worth a retry.
    let chat = ScriptedChat::new(vec![
        Ok("partial".to_string()),
        Ok("Top Sources:\n1. X - https://elsewhere.example.org/x - d".to_string()),
    ]);
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let result = manager.summarize(&request(3, false)).await.unwrap();

    assert_eq!(chat.call_count(), 2);
    assert!(result.top_entries.is_empty());
    assert!(result.bulk_summary.is_some());
}

#[tokio::test]
async fn all_chunks_failing_aborts_the_run() {
    let _ = tracing_subscriber::fmt().try_init();

    let fetcher = StubFetcher {
        entries: vec![entry("https://fresh.example.com/a", 2)],
    };
    let chat = ScriptedChat::new(vec![Err("boom".to_string())]);
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat);

    let result = manager.summarize(&request(3, false)).await;
    assert!(matches!(result, Err(DigestError::Llm(_))));
}

#[tokio::test]
async fn unknown_configuration_keys_fail_before_any_work() {
    let _ = tracing_subscriber::fmt().try_init();

    let chat = ScriptedChat::new(vec![]);
    let fetcher = StubFetcher {
        entries: vec![entry("https://fresh.example.com/a", 2)],
    };
    let mut manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let mut bad_subject = request(3, false);
    bad_subject.subject_area = "botany".to_string();
    assert!(matches!(
        manager.summarize(&bad_subject).await,
        Err(DigestError::Config(_))
    ));

    let mut bad_audience = request(3, false);
    bad_audience.audience = "nobody".to_string();
    assert!(matches!(
        manager.summarize(&bad_audience).await,
        Err(DigestError::Config(_))
    ));

    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn summarize_selected_makes_exactly_one_call() {
    let _ = tracing_subscriber::fmt().try_init();

    let chat = ScriptedChat::new(vec![Ok("a focused re-summary".to_string())]);
    let fetcher = StubFetcher { entries: vec![] };
    let manager = SummaryManager::new(Config::new(), Arc::new(fetcher), chat.clone());

    let target = entry("https://fresh.example.com/a", 2);
    let summarized = manager
        .summarize_selected(&target, "astro", "general", "news")
        .await
        .unwrap();

    assert_eq!(chat.call_count(), 1);
    assert_eq!(summarized.entry.link, target.link);
    assert_eq!(summarized.summary, "a focused re-summary");
    assert!((summarized.cost - per_call_cost()).abs() < 1e-9);
}
