pub mod aggregator;
pub mod cache;
pub mod enricher;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod sources;
pub mod types;

pub use aggregator::FeedAggregator;
pub use cache::AnalysisCache;
pub use enricher::{Enricher, MISSING_KEY_NOTICE, SCRAPE_FAILED_NOTICE, SERVICE_FAILED_NOTICE};
pub use fetcher::Fetcher;
pub use parser::{FeedParser, ParseOutcome};
pub use pipeline::NewsPipeline;
pub use sources::SourceList;
pub use types::*;
