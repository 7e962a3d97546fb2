//! Feed ingestion: bounded-concurrency fetch, parse, recency filter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::types::{DigestError, Entry, Result};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feed-digest/0.1".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Source of recent entries. The pipeline depends on this seam so tests can
/// substitute canned feeds for network I/O.
#[async_trait]
pub trait FetchFeeds: Send + Sync {
    /// Fetch all `urls` with at most `concurrency` in flight, keep entries
    /// published strictly after `now - days_limit` days, and return them
    /// sorted by published time descending. Per-feed failures contribute zero
    /// entries and never abort the whole fetch.
    async fn fetch_recent(&self, urls: &[String], days_limit: u32, concurrency: usize)
        -> Vec<Entry>;
}

pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(StdDuration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_one(&self, url: &str, cutoff: DateTime<Utc>) -> Result<Vec<Entry>> {
        debug!("Fetching feed: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Parse(format!("HTTP {} from {}", status, url)));
        }
        let content = response.text().await?;
        entries_from_feed(&content, cutoff)
    }
}

#[async_trait]
impl FetchFeeds for FeedFetcher {
    async fn fetch_recent(
        &self,
        urls: &[String],
        days_limit: u32,
        concurrency: usize,
    ) -> Vec<Entry> {
        let cutoff = Utc::now() - Duration::days(days_limit as i64);

        let results: Vec<(String, Result<Vec<Entry>>)> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let fetched = self.fetch_one(&url, cutoff).await;
                (url, fetched)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut entries = Vec::new();
        for (url, result) in results {
            match result {
                Ok(mut feed_entries) => {
                    info!("From {}, got {} recent entries", url, feed_entries.len());
                    entries.append(&mut feed_entries);
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                }
            }
        }

        entries.sort_by(|a, b| b.published.cmp(&a.published));
        entries
    }
}

/// Parse feed content and keep entries published strictly after `cutoff`.
/// Entries without a parseable published timestamp are dropped; summary bodies
/// are stripped to plain text.
pub fn entries_from_feed(content: &str, cutoff: DateTime<Utc>) -> Result<Vec<Entry>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| DigestError::Parse(format!("failed to parse feed: {}", e)))?;

    let mut entries = Vec::new();
    for item in feed.entries {
        let Some(published) = item.published.map(|dt| dt.with_timezone(&Utc)) else {
            continue;
        };
        if published <= cutoff {
            continue;
        }
        let Some(link) = item.links.first().map(|l| l.href.clone()) else {
            continue;
        };
        let title = item
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let raw_summary = item
            .summary
            .map(|s| s.content)
            .or_else(|| item.content.and_then(|c| c.body))
            .unwrap_or_default();

        entries.push(Entry {
            title,
            link,
            published,
            summary: strip_html(&raw_summary),
        });
    }
    Ok(entries)
}

/// Remove markup and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    html.chars()
        .fold((String::new(), false), |(mut text, in_tag), c| match c {
            '<' => (text, true),
            '>' => {
                text.push(' ');
                (text, false)
            }
            _ if !in_tag => {
                text.push(c);
                (text, in_tag)
            }
            _ => (text, in_tag),
        })
        .0
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
