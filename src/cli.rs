use clap::Parser;
use recipe_crawler::{
    config::{CrawlSettings, DEFAULT_CONFIG_FILE, DEFAULT_RECIPE_LIMIT},
    dedup::DedupStrategy,
    fetcher::RetryPolicy,
    http::Compression,
};
use std::{path::PathBuf, time::Duration};

/// Crawls recipe websites for schema.org/Recipe data and saves it as a JSON cookbook.
#[derive(Parser, Debug)]
#[command(name = "recipe-crawler", version, about)]
pub struct Cli {
    /// YAML file listing the websites to crawl
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Only crawl websites whose title, url or filter tag contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Stop after this many recipes
    #[arg(long, default_value_t = DEFAULT_RECIPE_LIMIT)]
    pub limit: usize,

    /// Cookbook file name; `.json` is appended when missing
    #[arg(short, long, default_value = "cookbook.json")]
    pub output: PathBuf,

    /// How two recipes are recognised as the same
    #[arg(long, value_enum, default_value_t = DedupStrategy::Both)]
    pub dedup: DedupStrategy,

    /// Content-encoding offered to servers
    #[arg(long, value_enum, default_value_t = Compression::Brotli)]
    pub compression: Compression,

    /// Minimum delay between two requests to the same host
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,

    /// Attempts per page, including the first one
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
}

impl Cli {
    pub fn settings(&self) -> CrawlSettings {
        CrawlSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            compression: self.compression,
            request_delay: Duration::from_millis(self.delay_ms),
            retry: RetryPolicy {
                max_attempts: self.retries.max(1),
                ..RetryPolicy::default()
            },
            recipe_limit: self.limit,
            dedup: self.dedup,
            ..CrawlSettings::default()
        }
    }
}
