use crate::types::{RawItem, FALLBACK_LINK, FALLBACK_TITLE};
use chrono::Utc;
use feed_rs::model::{Entry, Feed, FeedType};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Anchors that look like feed links on an HTML "subscribe" page.
const FEED_ANCHOR_SELECTOR: &str =
    r#"a[href*="rss"], a[type="application/rss+xml"], a[type="application/atom+xml"]"#;

/// Outcome of parsing one retrieved document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The document was a parseable RSS/Atom feed.
    Items(Vec<RawItem>),
    /// The document was HTML linking to a feed; the caller performs the
    /// single follow-up retrieval.
    DiscoveredFeed(Url),
    /// Neither a feed nor a page with a discoverable feed link.
    Empty,
}

/// Format-adaptive parser: tries RSS/Atom first and falls back to scanning
/// the payload as HTML for a feed link.
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str, source_url: &Url) -> ParseOutcome {
        match feed_rs::parser::parse(raw.as_bytes()) {
            Ok(feed) => {
                let items = self.extract_items(feed, source_url);
                debug!("Parsed {} as a feed with {} items", source_url, items.len());
                ParseOutcome::Items(items)
            }
            Err(e) => {
                debug!("{} is not a parseable feed ({}), scanning as HTML", source_url, e);
                self.discover_feed_link(raw, source_url)
            }
        }
    }

    fn extract_items(&self, feed: Feed, source_url: &Url) -> Vec<RawItem> {
        let source = feed
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| host_label(source_url));

        let feed_type = feed.feed_type;
        feed.entries
            .into_iter()
            .map(|entry| self.extract_item(entry, &feed_type, &source))
            .collect()
    }

    fn extract_item(&self, entry: Entry, feed_type: &FeedType, source: &str) -> RawItem {
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone())
            .or_else(|| permalink_guid(&entry.id))
            .unwrap_or_else(|| FALLBACK_LINK.to_string());

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());

        // Atom's primary timestamp is <updated>; RSS has only pubDate, which
        // feed-rs maps to `published`.
        let published = match feed_type {
            FeedType::Atom => entry.updated.or(entry.published),
            _ => entry.published.or(entry.updated),
        }
        .unwrap_or_else(Utc::now);

        RawItem {
            link,
            title,
            published,
            source: source.to_string(),
        }
    }

    fn discover_feed_link(&self, raw: &str, source_url: &Url) -> ParseOutcome {
        let document = Html::parse_document(raw);
        let selector = Selector::parse(FEED_ANCHOR_SELECTOR).expect("static selector");

        let Some(anchor) = document.select(&selector).next() else {
            warn!("No feed link found on {}", source_url);
            return ParseOutcome::Empty;
        };

        let href = anchor.value().attr("href").unwrap_or_default();
        match source_url.join(href) {
            Ok(resolved) => {
                info!("Discovered feed link {} on {}", resolved, source_url);
                ParseOutcome::DiscoveredFeed(resolved)
            }
            Err(e) => {
                warn!("Could not resolve feed link {:?} on {}: {}", href, source_url, e);
                ParseOutcome::Empty
            }
        }
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

fn host_label(url: &Url) -> String {
    url.host_str()
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

// A guid only doubles as the item link when it is itself an absolute
// http(s) URL (a permalink guid).
fn permalink_guid(id: &str) -> Option<String> {
    let url = Url::parse(id).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| id.to_string())
}
