use crate::types::{FetchConfig, NewsError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

/// Retrieval channel: fetches a URL's body as text, optionally through a
/// relay. Every failure is a returned error, never a panic; callers treat
/// a failed retrieval as a first-class outcome.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Fetch the body of `url` as text. Transient failures are retried with
    /// exponential backoff up to `max_retries`; the client-level timeout is
    /// the per-call deadline.
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        let request_url = self.request_url(url);
        debug!("Fetching {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 8),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = NewsError::General(format!("retrieval of {} failed", url));

        for attempt in 0..=self.config.max_retries {
            match self.client.get(&request_url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await?;
                        debug!("Fetched {} ({} bytes)", url, body.len());
                        return Ok(body);
                    }
                    last_error = NewsError::Retrieval {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                }
                Err(e) => {
                    last_error = NewsError::Http(e);
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "Attempt {} failed for {}, retrying in {:?}",
                        attempt + 1,
                        url,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(
            "Failed to fetch {} after {} attempts: {}",
            url,
            self.config.max_retries + 1,
            last_error
        );
        Err(last_error)
    }

    fn request_url(&self, target: &Url) -> String {
        match &self.config.relay {
            Some(relay) => {
                let encoded: String =
                    form_urlencoded::byte_serialize(target.as_str().as_bytes()).collect();
                format!("{}{}", relay, encoded)
            }
            None => target.to_string(),
        }
    }
}
