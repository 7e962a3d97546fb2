//! Recover structured top entries from the free-text bulk summary.
//!
//! The bulk prompt instructs the model to emit a "Top Sources" section with one
//! numbered `Title - Link - one-line summary` item per line. Parsing is
//! precision-first: a line is accepted only when it contains an absolute URL
//! whose normalized form matches a known entry. There is no fuzzy title
//! matching, so a missing section or an unmatched line is silently skipped.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::types::Entry;

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Heading at the start of a line, optional leading '#'s and colon;
        // capture until a blank line, a dashed rule, or end of text. The
        // line anchor keeps a prose mention of "top sources" from hijacking
        // the capture.
        Regex::new(r"(?ims)^[ \t]*#{0,6}[ \t]*top sources:?\s*(.*?)(?:\n\s*\n|\n\s*-{3,}|\z)")
            .expect("valid section regex")
    })
}

fn item_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\d+\.\s").expect("valid item split regex"))
}

fn dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[\u{2013}\u{2014}]\s*").expect("valid dash regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"))
}

/// Normalize a link for identity comparison: drop the query string and
/// fragment, strip the trailing slash from the path. Unparseable input falls
/// back to the trimmed raw string so equality still works on exact duplicates.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Non-empty item lines of the "Top Sources" section, with en/em dashes
/// normalized. Empty when the heading is absent.
fn section_items(summary: &str) -> Vec<String> {
    let Some(caps) = section_re().captures(summary) else {
        debug!("No Top Sources section found in summary");
        return Vec::new();
    };
    let section = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    item_split_re()
        .split(section)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| dash_re().replace_all(line, " - ").into_owned())
        .collect()
}

/// Number of Top Sources lines that carry a URL, whether or not the URL
/// matches a known entry. Zero means the model broke the section contract.
pub fn count_source_lines(summary: &str) -> usize {
    section_items(summary)
        .iter()
        .filter(|line| url_re().is_match(line))
        .count()
}

/// Parse the "Top Sources" section of `summary` and map its lines back onto
/// `entries` by normalized URL.
///
/// Returns the matched entries in the order the model emitted them (not feed
/// order), deduplicated by normalized link and capped at `max_count`, plus the
/// set of normalized URLs that were accepted. A missing section yields empty
/// results, not an error.
pub fn extract_top_entries(
    summary: &str,
    entries: &[Entry],
    max_count: usize,
) -> (Vec<Entry>, HashSet<String>) {
    let entry_map: HashMap<String, &Entry> = entries
        .iter()
        .map(|e| (e.normalized_link(), e))
        .collect();

    let mut selected: Vec<Entry> = Vec::new();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for line in section_items(summary) {
        if selected.len() >= max_count {
            break;
        }
        let Some(url_match) = url_re().find(&line) else {
            // URL presence is the only acceptance criterion.
            continue;
        };

        let url = normalize_url(url_match.as_str());
        if seen_urls.contains(&url) {
            continue;
        }
        if let Some(entry) = entry_map.get(&url) {
            selected.push((*entry).clone());
            seen_urls.insert(url);
        }
    }

    debug!(
        "Extracted {} top entries from summary (cap {})",
        selected.len(),
        max_count
    );
    (selected, seen_urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(link: &str) -> Entry {
        Entry {
            title: format!("Article at {}", link),
            link: link.to_string(),
            published: Utc::now(),
            summary: "body".to_string(),
        }
    }

    #[test]
    fn normalize_strips_query_and_trailing_slash() {
        assert_eq!(
            normalize_url("http://x.com/a/?utm_source=feed"),
            normalize_url("http://x.com/a")
        );
        assert_eq!(normalize_url("http://x.com/a/"), normalize_url("http://x.com/a"));
    }

    #[test]
    fn slash_variant_urls_collapse_to_one_entry() {
        let entries = vec![entry("http://x.com/a")];
        let text = "Top Sources\n1. A - http://x.com/a - desc\n2. B - http://x.com/a/ - desc2";
        let (selected, urls) = extract_top_entries(text, &entries, 5);
        assert_eq!(selected.len(), 1);
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn cap_is_enforced_in_generation_order() {
        let entries: Vec<Entry> = (1..=5).map(|i| entry(&format!("http://x.com/{}", i))).collect();
        let text = "Top Sources:\n\
            1. E3 - http://x.com/3 - d\n\
            2. E1 - http://x.com/1 - d\n\
            3. E5 - http://x.com/5 - d\n\
            4. E2 - http://x.com/2 - d\n\
            5. E4 - http://x.com/4 - d";
        let (selected, _) = extract_top_entries(text, &entries, 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].link, "http://x.com/3");
        assert_eq!(selected[1].link, "http://x.com/1");
    }

    #[test]
    fn missing_heading_yields_empty_result() {
        let entries = vec![entry("http://x.com/a")];
        let (selected, urls) = extract_top_entries("just prose, no list", &entries, 3);
        assert!(selected.is_empty());
        assert!(urls.is_empty());
    }

    #[test]
    fn en_and_em_dashes_are_normalized() {
        let entries = vec![entry("http://x.com/a")];
        let text = "Top Sources:\n1. Title \u{2014} http://x.com/a \u{2013} summary";
        let (selected, _) = extract_top_entries(text, &entries, 3);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn lines_without_urls_are_skipped() {
        let entries = vec![entry("http://x.com/a")];
        let text = "Top Sources:\n1. No link here at all\n2. A - http://x.com/a - desc";
        let (selected, _) = extract_top_entries(text, &entries, 3);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].link, "http://x.com/a");
    }

    #[test]
    fn section_capture_stops_at_blank_line() {
        let entries = vec![entry("http://x.com/a"), entry("http://x.com/b")];
        let text = "Top Sources:\n1. A - http://x.com/a - d\n\nUnrelated: http://x.com/b";
        let (selected, _) = extract_top_entries(text, &entries, 5);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn prose_mention_before_the_heading_does_not_hijack_the_section() {
        let entries = vec![entry("http://x.com/a")];
        let text = "This week the top sources of noise were varied and loud.\n\n\
            Top Sources:\n1. A - http://x.com/a - d";
        let (selected, _) = extract_top_entries(text, &entries, 5);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].link, "http://x.com/a");
    }

    #[test]
    fn source_line_count_ignores_entry_matching() {
        let text = "Top Sources:\n\
            1. External - https://elsewhere.example.org/x - d\n\
            2. No link in this one\n\
            3. Known - http://x.com/a - d";
        assert_eq!(count_source_lines(text), 2);
        assert_eq!(count_source_lines("no heading anywhere"), 0);
        assert_eq!(count_source_lines("Top Sources:\nnothing usable"), 0);
    }

    #[test]
    fn markdown_heading_is_recognized() {
        let entries = vec![entry("http://x.com/a")];
        let text = "### Top Sources\n1. A - http://x.com/a - d";
        let (selected, _) = extract_top_entries(text, &entries, 5);
        assert_eq!(selected.len(), 1);
    }
}
