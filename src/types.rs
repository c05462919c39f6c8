use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of items kept per refresh window by default.
pub const DEFAULT_WINDOW_SIZE: usize = 18;

/// Maximum number of characters of scraped article text handed to the
/// summarization service.
pub const DEFAULT_SCRAPE_MAX_CHARS: usize = 15_000;

/// Placeholder link for feed entries that declare neither a link nor a
/// usable guid.
pub const FALLBACK_LINK: &str = "#";

/// Placeholder title for feed entries without one.
pub const FALLBACK_TITLE: &str = "Untitled";

/// A single syndication entry, normalized from RSS or Atom, before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub link: String,
    pub title: String,
    pub published: DateTime<Utc>,
    /// Declared feed title, falling back to the source URL's host.
    pub source: String,
}

/// Structured summary attached to an item by the enrichment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub title: String,
    #[serde(default)]
    pub kicker: String,
    pub summary: String,
    #[serde(default)]
    pub headings: Vec<String>,
}

/// A raw item together with its analysis; the unit the presentation layer
/// consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub item: RawItem,
    pub analysis: Analysis,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
    /// Optional relay prefix every retrieval is routed through, e.g. a
    /// CORS-circumventing proxy: `GET <relay><url-encoded target>`.
    pub relay: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "newsdesk/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
            max_redirects: 5,
            relay: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// `generateContent` endpoint of the summarization service. The API key
    /// is appended as a `key` query parameter.
    pub endpoint: String,
    pub api_timeout_seconds: u64,
    pub scrape_max_chars: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent".to_string(),
            api_timeout_seconds: 30,
            scrape_max_chars: DEFAULT_SCRAPE_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub enrich: EnrichConfig,
    pub window_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            enrich: EnrichConfig::default(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("retrieval of {url} failed with HTTP {status}")]
    Retrieval { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no feed sources configured")]
    NoSources,

    #[error("no items found across the configured sources")]
    NoItemsFound,

    #[error("summarization failed: {0}")]
    Enrichment(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, NewsError>;
