//! Token-budget chunking of ordered entry lists.

use tracing::debug;

use crate::types::Entry;

/// Rough characters-per-token ratio for a model family. The o200k-family
/// tokenizers pack text a little denser than cl100k.
fn chars_per_token(model: &str) -> usize {
    if model.starts_with("gpt-4o") {
        3
    } else {
        4
    }
}

/// Model-aware token estimate for a piece of prompt text.
pub fn estimate_tokens(model: &str, text: &str) -> usize {
    let ratio = chars_per_token(model);
    text.chars().count().div_ceil(ratio)
}

/// Partition `entries` into order-preserving chunks whose estimated token cost
/// stays within `token_budget`.
///
/// A single entry whose own estimate exceeds the budget still becomes a valid
/// one-entry chunk; content is never dropped and entries are never split.
pub fn chunk_entries(entries: &[Entry], model: &str, token_budget: usize) -> Vec<Vec<Entry>> {
    let mut chunks: Vec<Vec<Entry>> = Vec::new();
    let mut current: Vec<Entry> = Vec::new();
    let mut current_tokens = 0usize;

    for entry in entries {
        let tokens = estimate_tokens(model, &entry.render_block());
        if current_tokens + tokens > token_budget && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current.push(entry.clone());
            current_tokens = tokens;
        } else {
            current.push(entry.clone());
            current_tokens += tokens;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(
        "Chunked {} entries into {} chunks (budget {} tokens)",
        entries.len(),
        chunks.len(),
        token_budget
    );
    chunks
}
