use clap::Parser;
use newsdesk::{FetchConfig, NewsPipeline, PipelineConfig, DEFAULT_WINDOW_SIZE};
use tracing::{info, warn};
use url::Url;

/// Feeds used when no --feed argument is given.
const DEFAULT_FEEDS: [&str; 3] = [
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://rss.cnn.com/rss/edition.rss",
    "https://feeds.npr.org/1001/rss.xml",
];

#[derive(Parser)]
#[command(
    name = "newsdesk",
    about = "Aggregates RSS/Atom feeds and enriches each story with an LLM-produced summary"
)]
struct Args {
    /// Feed URL to ingest; repeat for multiple sources
    #[arg(long = "feed")]
    feeds: Vec<Url>,

    /// Google AI Studio API key for summarization
    #[arg(long, env = "GEMINI_API_KEY")]
    api_key: Option<String>,

    /// Number of most recent items to keep per refresh
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window: usize,

    /// Relay prefix every retrieval is routed through,
    /// e.g. "https://corsproxy.io/?"
    #[arg(long)]
    relay: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = PipelineConfig {
        fetch: FetchConfig {
            relay: args.relay,
            ..FetchConfig::default()
        },
        window_size: args.window,
        ..PipelineConfig::default()
    };
    let pipeline = NewsPipeline::new(config);

    let feeds = if args.feeds.is_empty() {
        info!("No feeds given, using the default source list");
        DEFAULT_FEEDS
            .iter()
            .map(|url| Url::parse(url))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        args.feeds
    };

    for feed in feeds {
        if !pipeline.add_source(feed.clone()).await {
            warn!("Ignoring duplicate feed {}", feed);
        }
    }

    if args.api_key.is_none() {
        info!("No API key configured; summaries will be placeholders");
    }
    pipeline.set_api_key(args.api_key).await;

    let items = pipeline.refresh().await?;
    info!("Refresh finished with {} items", items.len());

    for (index, enriched) in items.iter().enumerate() {
        println!("\n--- {} | {} ---", index + 1, enriched.item.source);
        if !enriched.analysis.kicker.is_empty() {
            println!("{}", enriched.analysis.kicker.to_uppercase());
        }
        println!("{}", enriched.analysis.title);
        println!("{}", enriched.analysis.summary);
        for heading in &enriched.analysis.headings {
            println!("  - {}", heading);
        }
        println!(
            "{} | {}",
            enriched.item.published.format("%Y-%m-%d %H:%M UTC"),
            enriched.item.link
        );
    }

    Ok(())
}
