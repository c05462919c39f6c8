use mockito::{Matcher, Server};
use newsdesk::{
    EnrichConfig, FetchConfig, NewsError, NewsPipeline, PipelineConfig, MISSING_KEY_NOTICE,
    SCRAPE_FAILED_NOTICE, SERVICE_FAILED_NOTICE,
};
use url::Url;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn test_config(server_url: &str) -> PipelineConfig {
    PipelineConfig {
        fetch: FetchConfig {
            max_retries: 0,
            timeout_seconds: 5,
            ..FetchConfig::default()
        },
        enrich: EnrichConfig {
            endpoint: format!("{server_url}/v1beta/generate"),
            api_timeout_seconds: 5,
            ..EnrichConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn rss_feed(channel_title: &str, items: &[(&str, &str, &str)]) -> String {
    let mut body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel><title>{}</title>",
        channel_title
    );
    for (title, link, pub_date) in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>",
            title, link, pub_date
        ));
    }
    body.push_str("</channel></rss>");
    body
}

fn gemini_response(analysis: &serde_json::Value) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": analysis.to_string() }] } }]
    })
    .to_string()
}

fn feed_url(server: &Server, path: &str) -> Url {
    Url::parse(&format!("{}{}", server.url(), path)).unwrap()
}

#[tokio::test]
async fn refresh_without_sources_fails_immediately() {
    init_tracing();
    let pipeline = NewsPipeline::new(PipelineConfig::default());
    let err = pipeline.refresh().await.unwrap_err();
    assert!(matches!(err, NewsError::NoSources));
}

#[tokio::test]
async fn rss_items_without_api_key_get_placeholder_analyses() {
    init_tracing();
    let mut server = Server::new_async().await;
    let feed = rss_feed(
        "Tribunal Wire",
        &[
            ("First ruling", "https://example.org/news/1", "Wed, 03 Jan 2024 12:00:00 GMT"),
            ("Second ruling", "https://example.org/news/2", "Tue, 02 Jan 2024 12:00:00 GMT"),
            ("Third ruling", "https://example.org/news/3", "Mon, 01 Jan 2024 12:00:00 GMT"),
        ],
    );
    server
        .mock("GET", "/feed.xml")
        .with_body(&feed)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    assert!(pipeline.add_source(feed_url(&server, "/feed.xml")).await);

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items.len(), 3);
    for enriched in &items {
        assert_eq!(enriched.analysis.summary, MISSING_KEY_NOTICE);
        assert_eq!(enriched.analysis.title, enriched.item.title);
        assert_eq!(enriched.item.source, "Tribunal Wire");
    }
    assert_eq!(items[0].item.title, "First ruling");
}

#[tokio::test]
async fn html_subscribe_page_falls_back_to_the_discovered_feed() {
    init_tracing();
    let mut server = Server::new_async().await;

    let page = server
        .mock("GET", "/about-rss")
        .with_body(r#"<html><body><p>Feeds:</p><a href="/feed/rss" type="application/rss+xml">Subscribe</a></body></html>"#)
        .expect(1)
        .create_async()
        .await;
    let feed = server
        .mock("GET", "/feed/rss")
        .with_body(&rss_feed(
            "Discovered Wire",
            &[("Hidden story", "https://example.org/news/9", "Wed, 03 Jan 2024 12:00:00 GMT")],
        ))
        .expect(1)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/about-rss")).await;

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item.title, "Hidden story");
    assert_eq!(items[0].item.source, "Discovered Wire");
    page.assert_async().await;
    feed.assert_async().await;
}

#[tokio::test]
async fn failing_source_does_not_poison_the_batch() {
    init_tracing();
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/broken.xml")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/good.xml")
        .with_body(&rss_feed(
            "Good Wire",
            &[
                ("Story A", "https://example.org/a", "Wed, 03 Jan 2024 12:00:00 GMT"),
                ("Story B", "https://example.org/b", "Tue, 02 Jan 2024 12:00:00 GMT"),
            ],
        ))
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/broken.xml")).await;
    pipeline.add_source(feed_url(&server, "/good.xml")).await;

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|e| e.item.source == "Good Wire"));
}

#[tokio::test]
async fn all_sources_empty_is_a_batch_failure() {
    init_tracing();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/broken.xml")
        .with_status(500)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/broken.xml")).await;

    let err = pipeline.refresh().await.unwrap_err();
    assert!(matches!(err, NewsError::NoItemsFound));
}

#[tokio::test]
async fn merged_items_are_sorted_descending_and_truncated_to_the_window() {
    init_tracing();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/feed.xml")
        .with_body(&rss_feed(
            "Wire",
            &[
                ("Oldest", "https://example.org/1", "Mon, 01 Jan 2024 08:00:00 GMT"),
                ("Newest", "https://example.org/2", "Thu, 04 Jan 2024 08:00:00 GMT"),
                ("Middle", "https://example.org/3", "Tue, 02 Jan 2024 08:00:00 GMT"),
                ("Newer", "https://example.org/4", "Wed, 03 Jan 2024 08:00:00 GMT"),
            ],
        ))
        .create_async()
        .await;

    let config = PipelineConfig {
        window_size: 2,
        ..test_config(&server.url())
    };
    let pipeline = NewsPipeline::new(config);
    pipeline.add_source(feed_url(&server, "/feed.xml")).await;

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item.title, "Newest");
    assert_eq!(items[1].item.title, "Newer");
    assert!(items[0].item.published >= items[1].item.published);
}

#[tokio::test]
async fn enrichment_is_idempotent_per_link() {
    init_tracing();
    let mut server = Server::new_async().await;

    let article_link = format!("{}/article/1", server.url());
    let feed_mock = server
        .mock("GET", "/feed.xml")
        .with_body(&rss_feed(
            "Wire",
            &[("Big ruling", &article_link, "Wed, 03 Jan 2024 12:00:00 GMT")],
        ))
        .expect(2)
        .create_async()
        .await;
    let article_mock = server
        .mock("GET", "/article/1")
        .with_body("<html><body><p>The court ruled on the case today.</p></body></html>")
        .expect(1)
        .create_async()
        .await;
    let analysis = serde_json::json!({
        "title": "Big ruling explained",
        "kicker": "Justice",
        "summary": "The court ruled on the case.",
        "headings": ["Background", "What changes"]
    });
    let gemini_mock = server
        .mock("POST", "/v1beta/generate")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_header("content-type", "application/json")
        .with_body(&gemini_response(&analysis))
        .expect(1)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/feed.xml")).await;
    pipeline.set_api_key(Some("test-key".to_string())).await;

    let first = pipeline.refresh().await.unwrap();
    let second = pipeline.refresh().await.unwrap();

    assert_eq!(first[0].analysis.title, "Big ruling explained");
    assert_eq!(first[0].analysis.kicker, "Justice");
    assert_eq!(first[0].analysis.headings.len(), 2);
    assert_eq!(first[0].analysis, second[0].analysis);

    feed_mock.assert_async().await;
    article_mock.assert_async().await;
    gemini_mock.assert_async().await;
}

#[tokio::test]
async fn setting_the_api_key_invalidates_degraded_cache_entries() {
    init_tracing();
    let mut server = Server::new_async().await;

    let article_link = format!("{}/article/1", server.url());
    server
        .mock("GET", "/feed.xml")
        .with_body(&rss_feed(
            "Wire",
            &[("Big ruling", &article_link, "Wed, 03 Jan 2024 12:00:00 GMT")],
        ))
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/feed.xml")).await;

    // First pass without a credential: placeholder analysis, cached.
    let degraded = pipeline.refresh().await.unwrap();
    assert_eq!(degraded[0].analysis.summary, MISSING_KEY_NOTICE);

    let article_mock = server
        .mock("GET", "/article/1")
        .with_body("<html><body><p>The court ruled on the case today.</p></body></html>")
        .expect(1)
        .create_async()
        .await;
    let analysis = serde_json::json!({
        "title": "Big ruling explained",
        "kicker": "",
        "summary": "The court ruled on the case.",
        "headings": []
    });
    let gemini_mock = server
        .mock("POST", "/v1beta/generate")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_header("content-type", "application/json")
        .with_body(&gemini_response(&analysis))
        .expect(1)
        .create_async()
        .await;

    // The credential change clears the cache, so the stale degraded entry
    // must not mask real enrichment.
    pipeline.set_api_key(Some("test-key".to_string())).await;
    let enriched = pipeline.refresh().await.unwrap();
    assert_eq!(enriched[0].analysis.summary, "The court ruled on the case.");

    article_mock.assert_async().await;
    gemini_mock.assert_async().await;
}

#[tokio::test]
async fn empty_article_body_degrades_without_calling_the_service() {
    init_tracing();
    let mut server = Server::new_async().await;

    let article_link = format!("{}/article/1", server.url());
    server
        .mock("GET", "/feed.xml")
        .with_body(&rss_feed(
            "Wire",
            &[("Big ruling", &article_link, "Wed, 03 Jan 2024 12:00:00 GMT")],
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/article/1")
        .with_body("<html><body><script>track();</script><nav>Home | About</nav></body></html>")
        .create_async()
        .await;
    let gemini_mock = server
        .mock("POST", "/v1beta/generate")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/feed.xml")).await;
    pipeline.set_api_key(Some("test-key".to_string())).await;

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items[0].analysis.summary, SCRAPE_FAILED_NOTICE);
    assert_eq!(items[0].analysis.title, "Big ruling");
    gemini_mock.assert_async().await;
}

#[tokio::test]
async fn service_failure_degrades_instead_of_erroring() {
    init_tracing();
    let mut server = Server::new_async().await;

    let article_link = format!("{}/article/1", server.url());
    server
        .mock("GET", "/feed.xml")
        .with_body(&rss_feed(
            "Wire",
            &[("Big ruling", &article_link, "Wed, 03 Jan 2024 12:00:00 GMT")],
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/article/1")
        .with_body("<html><body><p>The court ruled on the case today.</p></body></html>")
        .create_async()
        .await;
    server
        .mock("POST", "/v1beta/generate")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let pipeline = NewsPipeline::new(test_config(&server.url()));
    pipeline.add_source(feed_url(&server, "/feed.xml")).await;
    pipeline.set_api_key(Some("test-key".to_string())).await;

    let items = pipeline.refresh().await.unwrap();
    assert_eq!(items[0].analysis.summary, SERVICE_FAILED_NOTICE);
    assert_eq!(items[0].analysis.title, "Big ruling");
}
