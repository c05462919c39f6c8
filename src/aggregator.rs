use crate::fetcher::Fetcher;
use crate::parser::{FeedParser, ParseOutcome};
use crate::types::{NewsError, RawItem, Result};
use futures::future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Fans the fetch-and-parse step out over all configured sources, merges the
/// results and keeps the most recent window. Per-source failures are
/// contained: a broken source contributes an empty list, never an error.
pub struct FeedAggregator {
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
    window_size: usize,
}

impl FeedAggregator {
    pub fn new(fetcher: Arc<Fetcher>, window_size: usize) -> Self {
        Self {
            fetcher,
            parser: FeedParser::new(),
            window_size,
        }
    }

    /// Fetch and parse every source concurrently, then merge, sort by
    /// publication date descending and truncate to the display window.
    /// Fails only when no source is configured or every source contributed
    /// zero items.
    pub async fn refresh(&self, sources: &[Url]) -> Result<Vec<RawItem>> {
        if sources.is_empty() {
            return Err(NewsError::NoSources);
        }

        info!("Refreshing {} sources", sources.len());
        let collected =
            future::join_all(sources.iter().map(|url| self.collect_source(url))).await;
        let mut items: Vec<RawItem> = collected.into_iter().flatten().collect();

        if items.is_empty() {
            return Err(NewsError::NoItemsFound);
        }

        // Stable sort: items with equal dates keep concatenation order.
        items.sort_by(|a, b| b.published.cmp(&a.published));
        items.truncate(self.window_size);

        info!("Refresh produced {} items", items.len());
        Ok(items)
    }

    async fn collect_source(&self, url: &Url) -> Vec<RawItem> {
        let text = match self.fetcher.fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping source {}: {}", url, e);
                return Vec::new();
            }
        };

        match self.parser.parse(&text, url) {
            ParseOutcome::Items(items) => {
                debug!("Source {} contributed {} items", url, items.len());
                items
            }
            ParseOutcome::DiscoveredFeed(feed_url) => self.collect_discovered(&feed_url).await,
            ParseOutcome::Empty => {
                warn!("Source {} yielded no feed content", url);
                Vec::new()
            }
        }
    }

    /// Second stage of fallback discovery, bounded to one hop: a discovered
    /// document that is itself not a feed contributes nothing.
    async fn collect_discovered(&self, url: &Url) -> Vec<RawItem> {
        let text = match self.fetcher.fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Discovered feed {} could not be retrieved: {}", url, e);
                return Vec::new();
            }
        };

        match self.parser.parse(&text, url) {
            ParseOutcome::Items(items) => {
                debug!("Discovered feed {} contributed {} items", url, items.len());
                items
            }
            outcome => {
                warn!("Discovered feed {} was not parseable: {:?}", url, outcome);
                Vec::new()
            }
        }
    }
}
