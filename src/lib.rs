pub mod chunker;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod llm;
pub mod manager;
pub mod pricing;
pub mod prompts;
pub mod summarizer;
pub mod types;

pub use config::Config;
pub use extractor::{extract_top_entries, normalize_url};
pub use fetcher::{FeedFetcher, FetchConfig, FetchFeeds};
pub use llm::{ChatClient, ChatCompletion, ChatMessage, OpenAiClient, RetryConfig};
pub use manager::SummaryManager;
pub use summarizer::Summarizer;
pub use types::*;
