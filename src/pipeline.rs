use crate::aggregator::FeedAggregator;
use crate::cache::AnalysisCache;
use crate::enricher::Enricher;
use crate::fetcher::Fetcher;
use crate::sources::SourceList;
use crate::types::{EnrichedItem, PipelineConfig, Result};
use futures::future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

/// The ingestion-merge-enrich pipeline: configured sources in, an ordered
/// window of enriched items out. Owns the enrichment cache for its own
/// lifetime; nothing outside the pipeline writes to it.
pub struct NewsPipeline {
    sources: RwLock<SourceList>,
    aggregator: FeedAggregator,
    enricher: Enricher,
}

impl NewsPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let fetcher = Arc::new(Fetcher::new(config.fetch));
        let cache = Arc::new(AnalysisCache::new());
        let aggregator = FeedAggregator::new(fetcher.clone(), config.window_size);
        let enricher = Enricher::new(fetcher, cache, config.enrich);

        Self {
            sources: RwLock::new(SourceList::new()),
            aggregator,
            enricher,
        }
    }

    /// Add a feed source. Returns false if it was already configured.
    pub async fn add_source(&self, url: Url) -> bool {
        self.sources.write().await.add(url)
    }

    /// Remove a feed source. Returns false if it was not configured.
    pub async fn remove_source(&self, url: &Url) -> bool {
        self.sources.write().await.remove(url)
    }

    pub async fn sources(&self) -> Vec<Url> {
        self.sources.read().await.to_vec()
    }

    /// Set or clear the summarization credential; invalidates the cache.
    pub async fn set_api_key(&self, key: Option<String>) {
        self.enricher.set_api_key(key).await;
    }

    /// Run one refresh cycle: aggregate all sources, then enrich the window
    /// concurrently with join-all semantics. Enrichment never fails an item,
    /// so the only batch-level failures are `NoSources` and `NoItemsFound`.
    pub async fn refresh(&self) -> Result<Vec<EnrichedItem>> {
        let sources = self.sources.read().await.to_vec();
        let items = self.aggregator.refresh(&sources).await?;

        info!("Enriching {} items", items.len());
        let enriched =
            future::join_all(items.into_iter().map(|item| self.enricher.enrich(item))).await;
        Ok(enriched)
    }
}
