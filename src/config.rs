use std::collections::HashMap;

use crate::types::{DigestError, Result};

/// Static configuration: which feeds belong to which subject area and content
/// type, and how each audience should be described to the model.
#[derive(Debug, Clone)]
pub struct Config {
    subject_areas: HashMap<String, HashMap<String, Vec<String>>>,
    audiences: HashMap<String, String>,
    pub content_types: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        let mut subject_areas = HashMap::new();

        let mut astro = HashMap::new();
        astro.insert(
            "news".to_string(),
            vec![
                "https://www.sciencedaily.com/rss/space_time/astrophysics.xml".to_string(),
                "https://phys.org/rss-feed/space-news".to_string(),
                "https://www.esa.int/rssfeed/TopNews".to_string(),
                "https://www.esa.int/rssfeed/Our_Activities/Space_Science".to_string(),
                "https://www.nasa.gov/news-release/feed".to_string(),
                "https://www.nasa.gov/technology/feed/".to_string(),
                "https://www.nasa.gov/missions/station/feed/".to_string(),
                "https://www.space.com/feeds/all".to_string(),
                "https://www.space.com/feeds/tag/astronomy".to_string(),
                "https://skyandtelescope.org/rss".to_string(),
                "https://news.mit.edu/topic/mitastrophysics-rss.xml".to_string(),
            ],
        );
        astro.insert(
            "papers".to_string(),
            vec!["http://export.arxiv.org/rss/astro-ph".to_string()],
        );
        subject_areas.insert("astro".to_string(), astro);

        let mut ai = HashMap::new();
        ai.insert(
            "news".to_string(),
            vec![
                "https://distill.pub/rss.xml".to_string(),
                "https://news.mit.edu/topic/mitartificial-intelligence2-rss.xml".to_string(),
                "https://bair.berkeley.edu/blog/feed.xml".to_string(),
                "https://aws.amazon.com/blogs/ai/feed".to_string(),
                "https://research.google/blog/rss".to_string(),
                "https://www.deepmind.com/blog/rss.xml".to_string(),
                "https://openai.com/news/rss.xml".to_string(),
                "https://developer.nvidia.com/blog/feed/".to_string(),
                "https://spectrum.ieee.org/feeds/topic/artificial-intelligence.rss".to_string(),
            ],
        );
        ai.insert(
            "papers".to_string(),
            vec![
                "https://rss.arxiv.org/rss/cs.AI".to_string(),
                "https://rss.arxiv.org/rss/stat.ML".to_string(),
                "https://rss.arxiv.org/rss/cs.LG".to_string(),
                "https://rss.arxiv.org/rss/cs.CV".to_string(),
                "https://rss.arxiv.org/rss/cs.CL".to_string(),
            ],
        );
        subject_areas.insert("ai".to_string(), ai);

        let mut audiences = HashMap::new();
        audiences.insert(
            "general".to_string(),
            "general audience with an interest in science, non-specialists, educated laypeople"
                .to_string(),
        );
        audiences.insert(
            "astro_enthusiasts".to_string(),
            "scientifically literate readers (e.g., grad students, early career researchers), \
             readers familiar with scientific concepts but not necessarily specialists in \
             astrophysics"
                .to_string(),
        );
        audiences.insert(
            "ai_enthusiasts".to_string(),
            "AI researchers and practitioners interested in latest advancements and \
             breakthroughs, readers with a technical background in AI and machine learning"
                .to_string(),
        );

        Self {
            subject_areas,
            audiences,
            content_types: vec!["news".to_string(), "papers".to_string()],
        }
    }

    /// Feed URLs for a subject area and content type. Unknown keys are a fatal
    /// configuration error, reported before any work is attempted.
    pub fn feeds_for(&self, subject_area: &str, content_type: &str) -> Result<&[String]> {
        let by_type = self.subject_areas.get(subject_area).ok_or_else(|| {
            DigestError::Config(format!("unknown subject area: {}", subject_area))
        })?;
        let feeds = by_type.get(content_type).ok_or_else(|| {
            DigestError::Config(format!(
                "unknown content type '{}' for subject area '{}'",
                content_type, subject_area
            ))
        })?;
        Ok(feeds)
    }

    /// Audience description used in the system prompt.
    pub fn audience_description(&self, audience_key: &str) -> Result<&str> {
        self.audiences
            .get(audience_key)
            .map(|s| s.as_str())
            .ok_or_else(|| DigestError::Config(format!("unknown audience: {}", audience_key)))
    }

    pub fn subject_areas(&self) -> Vec<&str> {
        self.subject_areas.keys().map(|s| s.as_str()).collect()
    }

    pub fn audience_keys(&self) -> Vec<&str> {
        self.audiences.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
