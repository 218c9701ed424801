use crate::{
    config::CrawlSettings,
    http::{HttpClient, HttpResponse},
    robots::RobotsCache,
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    NotFound,
    Error,
    RobotsDisallowed,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: Url,
    pub status: FetchStatus,
    pub html: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl FetchResult {
    fn new(url: &Url, status: FetchStatus) -> Self {
        FetchResult {
            url: url.clone(),
            status,
            html: None,
            fetched_at: Utc::now(),
            http_status: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub get_calls: u64,
    pub bytes_downloaded: u64,
    pub robots_skipped: u64,
    pub failures: u64,
}

/// Retrieves pages politely: robots.txt first, then per-host spacing, then
/// bounded retries.
pub struct Fetcher<C> {
    client: C,
    robots_agent: String,
    request_delay: Duration,
    retry: RetryPolicy,
    robots: RobotsCache,
    last_request: HashMap<String, Instant>,
    stats: FetchStats,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C, settings: &CrawlSettings) -> Self {
        Fetcher {
            client,
            robots_agent: settings.robots_agent.clone(),
            request_delay: settings.request_delay,
            retry: settings.retry.clone(),
            robots: RobotsCache::new(),
            last_request: HashMap::new(),
            stats: FetchStats::default(),
        }
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&mut self, url: &Url) -> FetchResult {
        let rules = self.robots.rules_for(&self.client, url).await;
        if !rules.is_allowed(&self.robots_agent, url) {
            debug!("robots.txt disallows {}", url);
            self.stats.robots_skipped += 1;
            return FetchResult::new(url, FetchStatus::RobotsDisallowed);
        }

        let delay = rules
            .crawl_delay
            .map_or(self.request_delay, |d| d.max(self.request_delay));

        let max_attempts = self.retry.max_attempts.max(1);
        let mut result = FetchResult::new(url, FetchStatus::Error);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = self.retry.backoff(attempt - 1);
                debug!("Retry {} for {} in {:?}", attempt - 1, url, backoff);
                tokio::time::sleep(backoff).await;
            }

            self.wait_turn(url, delay).await;

            debug!("Visit {}", url);
            self.stats.get_calls += 1;
            result.attempts = attempt;
            result.fetched_at = Utc::now();

            match self.client.get(url).await {
                Ok(response) => {
                    self.stats.bytes_downloaded += response.downloaded_bytes();
                    result.http_status = Some(response.status);
                    let retry = is_retryable_status(response.status);
                    classify(&mut result, response);
                    if !retry {
                        break;
                    }
                }
                Err(e) => {
                    result.status = FetchStatus::Error;
                    result.error = Some(e.to_string());
                    if !e.is_transient() {
                        break;
                    }
                }
            }
        }

        if !result.is_ok() {
            self.stats.failures += 1;
            if result.status == FetchStatus::Error {
                warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    url,
                    result.attempts,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        result
    }

    async fn wait_turn(&mut self, url: &Url, delay: Duration) {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        if let Some(last) = self.last_request.get(&host) {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        self.last_request.insert(host, Instant::now());
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn classify(result: &mut FetchResult, response: HttpResponse) {
    if response.is_success() {
        result.status = FetchStatus::Ok;
        result.html = Some(response.body);
        result.error = None;
    } else if matches!(response.status, 404 | 410) {
        result.status = FetchStatus::NotFound;
        result.error = Some(format!("HTTP {}", response.status));
    } else {
        result.status = FetchStatus::Error;
        result.error = Some(format!("HTTP {}", response.status));
    }
}
