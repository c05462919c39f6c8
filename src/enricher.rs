use crate::cache::{AnalysisCache, Begin};
use crate::fetcher::Fetcher;
use crate::types::{Analysis, EnrichConfig, EnrichedItem, NewsError, RawItem, Result};
use ego_tree::NodeRef;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Summary shown when no API key is configured.
pub const MISSING_KEY_NOTICE: &str =
    "Provide a Google AI Studio API key to see the summary and details for this story.";

/// Summary shown when the article body could not be scraped.
pub const SCRAPE_FAILED_NOTICE: &str =
    "The body of this story could not be analyzed automatically.";

/// Summary shown when the summarization service call failed.
pub const SERVICE_FAILED_NOTICE: &str =
    "A summary could not be generated for this story right now.";

/// Elements whose text is never article content.
const NON_CONTENT_TAGS: [&str; 6] = ["script", "style", "header", "footer", "nav", "aside"];

/// Enrichment pipeline: derives an `Analysis` for each raw item by scraping
/// the article body and asking the summarization service for a structured
/// result. Never fails outward: every path terminates in a cached, possibly
/// degraded, `EnrichedItem`.
pub struct Enricher {
    fetcher: Arc<Fetcher>,
    cache: Arc<AnalysisCache>,
    client: reqwest::Client,
    api_key: RwLock<Option<String>>,
    config: EnrichConfig,
}

impl Enricher {
    pub fn new(fetcher: Arc<Fetcher>, cache: Arc<AnalysisCache>, config: EnrichConfig) -> Self {
        Self {
            fetcher,
            cache,
            client: reqwest::Client::new(),
            api_key: RwLock::new(None),
            config,
        }
    }

    /// Set or replace the summarization credential. The cache is cleared in
    /// the same step: entries produced under the previous credential (or the
    /// no-credential degraded path) would otherwise mask real enrichment.
    pub async fn set_api_key(&self, key: Option<String>) {
        {
            let mut api_key = self.api_key.write().await;
            *api_key = key;
        }
        info!("Summarization credential changed, invalidating cache");
        self.cache.clear().await;
    }

    /// Enrich one item. Cache hits short-circuit all network work; a second
    /// concurrent call for the same uncached link awaits the first call's
    /// in-flight result instead of duplicating it.
    pub async fn enrich(&self, item: RawItem) -> EnrichedItem {
        loop {
            match self.cache.begin(&item.link).await {
                Begin::Hit(cached) => return cached,
                Begin::Wait(mut rx) => {
                    if rx.changed().await.is_ok() {
                        if let Some(cached) = rx.borrow().clone() {
                            return cached;
                        }
                    }
                    // The in-flight producer was invalidated by a cache
                    // clear; loop and claim the slot ourselves.
                }
                Begin::Claimed => break,
            }
        }

        let enriched = self.analyze(item).await;
        let link = enriched.item.link.clone();
        self.cache.complete(&link, &enriched).await;
        enriched
    }

    async fn analyze(&self, item: RawItem) -> EnrichedItem {
        let api_key = self.api_key.read().await.clone();
        let Some(api_key) = api_key else {
            debug!("No API key configured, degrading {}", item.link);
            return degraded(item, MISSING_KEY_NOTICE);
        };

        let article_text = match self.scrape_article(&item.link).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                warn!("Article scrape for {} yielded no text", item.link);
                return degraded(item, SCRAPE_FAILED_NOTICE);
            }
            Err(e) => {
                warn!("Article scrape for {} failed: {}", item.link, e);
                return degraded(item, SCRAPE_FAILED_NOTICE);
            }
        };

        match self.request_analysis(&api_key, &article_text).await {
            Ok(analysis) => {
                debug!("Summarization succeeded for {}", item.link);
                EnrichedItem { item, analysis }
            }
            Err(e) => {
                warn!("Summarization for {} failed: {}", item.link, e);
                degraded(item, SERVICE_FAILED_NOTICE)
            }
        }
    }

    /// Retrieve the article and reduce it to bare text: non-content subtrees
    /// stripped, whitespace collapsed, bounded to `scrape_max_chars` for the
    /// downstream payload limit.
    async fn scrape_article(&self, link: &str) -> Result<String> {
        let url = Url::parse(link)?;
        let html = self.fetcher.fetch_text(&url).await?;
        Ok(extract_readable_text(&html, self.config.scrape_max_chars))
    }

    async fn request_analysis(&self, api_key: &str, article_text: &str) -> Result<Analysis> {
        let prompt = format!(
            "Analyze the following news article text and extract the information as JSON. \
             The text may be badly formatted; ignore anything that is not the body of the story.\n\
             Article text: \"{article_text}\"\n\
             Extract:\n\
             - title: the story's main headline.\n\
             - kicker: the short lead-in line preceding the headline, or \"\" if there is none.\n\
             - summary: a concise one-paragraph summary of the story.\n\
             - headings: a list of the main subheadings found in the text."
        );

        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: analysis_schema(),
            },
        };

        let request_url = format!("{}?key={}", self.config.endpoint, api_key);
        let response = tokio::time::timeout(
            Duration::from_secs(self.config.api_timeout_seconds),
            self.client.post(&request_url).json(&payload).send(),
        )
        .await
        .map_err(|_| NewsError::Enrichment("summarization request timed out".to_string()))??;

        if !response.status().is_success() {
            return Err(NewsError::Enrichment(format!(
                "summarization service returned HTTP {}",
                response.status()
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                NewsError::Enrichment("summarization response carried no candidates".to_string())
            })?;

        // The candidate text is itself a JSON-encoded Analysis.
        let analysis: Analysis = serde_json::from_str(text)?;
        Ok(analysis)
    }
}

fn degraded(item: RawItem, notice: &str) -> EnrichedItem {
    let analysis = Analysis {
        title: item.title.clone(),
        kicker: String::new(),
        summary: notice.to_string(),
        headings: Vec::new(),
    };
    EnrichedItem { item, analysis }
}

fn extract_readable_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.tree.root(), &mut raw);

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            Node::Element(element) => {
                if !NON_CONTENT_TAGS.contains(&element.name()) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Response schema requested from the summarization service, mirroring the
/// `Analysis` shape.
fn analysis_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "kicker": { "type": "STRING" },
            "summary": { "type": "STRING" },
            "headings": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    })
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}
