use anyhow::Context;
use clap::Parser;
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use feed_digest::{
    Config, DigestRequest, FeedFetcher, FetchConfig, OpenAiClient, SummaryManager,
};

/// Generate a thematic digest from scientific RSS feeds.
#[derive(Parser, Debug)]
#[command(name = "feed-digest", version)]
struct Cli {
    /// Subject area (e.g. astro, ai)
    #[arg(long, default_value = "astro")]
    subject: String,

    /// Content type (news or papers)
    #[arg(long = "content-type", default_value = "news")]
    content_type: String,

    /// Target audience (general, astro_enthusiasts, ai_enthusiasts)
    #[arg(long, default_value = "general")]
    audience: String,

    /// How many days back to fetch entries
    #[arg(long, default_value_t = 1)]
    days: u32,

    /// How many top entries to extract
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Model identifier
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.5)]
    temperature: f32,

    /// Simultaneous feed downloads
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Also produce a detailed summary for each extracted top entry
    #[arg(long)]
    summarize_top: bool,

    /// API key (or set OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let api_key = cli
        .api_key
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .context("no API key: pass --api-key or set OPENAI_API_KEY")?;

    info!(
        "Generating digest for subject: {}, content type: {}, audience: {}",
        cli.subject, cli.content_type, cli.audience
    );

    let llm = Arc::new(OpenAiClient::new(api_key, cli.model, cli.temperature)?);
    let fetcher = Arc::new(FeedFetcher::new(FetchConfig::default())?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!("{}", event);
        }
    });

    let mut manager = SummaryManager::new(Config::new(), fetcher, llm)
        .with_fetch_concurrency(cli.concurrency)
        .with_progress(tx);

    let request = DigestRequest {
        subject_area: cli.subject,
        content_type: cli.content_type,
        audience: cli.audience,
        days_limit: cli.days,
        top_k: cli.top,
        summarize_top_entries: cli.summarize_top,
    };

    let result = manager.summarize(&request).await?;
    // Manager drops the last sender clone only when it is dropped; close the
    // printer by dropping the manager before awaiting it.
    drop(manager);
    let _ = printer.await;

    let Some(bulk) = result.bulk_summary else {
        println!("No new entries found.");
        return Ok(());
    };

    if let Some(cost) = result.bulk_cost {
        println!("Estimated cost for overall analysis: ${:.4}", cost);
    }
    println!("\nOVERALL SUMMARY:\n");
    println!("{}", bulk);
    println!(
        "\n({} entries ingested, {} chunk failures)",
        result.total_entries,
        result.failed_chunks.len()
    );

    if !result.top_entries.is_empty() {
        println!("\nTOP ENTRIES:");
        for (i, item) in result.top_entries.iter().enumerate() {
            println!("\n{}. {}", i + 1, item.entry.title);
            println!("Published {}", item.entry.published.format("%Y-%m-%d"));
            println!("Link {}", item.entry.link);
            println!("Cost: ${:.4}", item.cost);
            println!("Item Summary:");
            println!("{}", item.summary);
            println!("{}", "-".repeat(80));
        }
    }

    for failure in &result.failed_entries {
        println!("Detailed summary failed for {}: {}", failure.link, failure.error);
    }

    Ok(())
}
