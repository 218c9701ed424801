use crate::http::HttpClient;
use lazy_regex::regex_captures;
use robotstxt::DefaultMatcher;
use std::{collections::HashMap, time::Duration};
use tracing::debug;
use url::Url;

/// robots.txt policy for one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// `None` when the host has no usable robots.txt; everything is allowed.
    content: Option<String>,
    pub crawl_delay: Option<Duration>,
}

impl RobotsRules {
    pub fn allow_all() -> Self {
        RobotsRules::default()
    }

    pub fn parse(content: &str) -> Self {
        RobotsRules {
            crawl_delay: parse_crawl_delay(content),
            content: Some(content.to_string()),
        }
    }

    pub fn is_allowed(&self, agent: &str, url: &Url) -> bool {
        match &self.content {
            Some(content) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(content, agent, url.as_str())
            }
            None => true,
        }
    }
}

fn parse_crawl_delay(content: &str) -> Option<Duration> {
    content.lines().find_map(|line| {
        let (_, secs) = regex_captures!(r"(?i)^\s*crawl-delay\s*:\s*([0-9]+(?:\.[0-9]+)?)", line)?;
        secs.parse::<f64>().ok().map(Duration::from_secs_f64)
    })
}

/// Per-run cache keyed by scheme and authority. Never persisted.
#[derive(Debug, Default)]
pub struct RobotsCache {
    rules: HashMap<String, RobotsRules>,
}

impl RobotsCache {
    pub fn new() -> Self {
        RobotsCache::default()
    }

    fn key(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_lowercase();
        Some(match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        })
    }

    /// Returns the rules for the URL's host, downloading robots.txt the first time.
    pub async fn rules_for<C: HttpClient>(&mut self, client: &C, url: &Url) -> RobotsRules {
        let key = match Self::key(url) {
            Some(key) => key,
            None => return RobotsRules::allow_all(),
        };

        if let Some(rules) = self.rules.get(&key) {
            return rules.clone();
        }

        let rules = match url.join("/robots.txt") {
            Ok(robots_url) => {
                debug!("Reading robots.txt at: {}", robots_url);
                match client.get(&robots_url).await {
                    Ok(response) if response.is_success() => RobotsRules::parse(&response.body),
                    Ok(response) => {
                        debug!("No robots.txt for {} (HTTP {})", key, response.status);
                        RobotsRules::allow_all()
                    }
                    Err(e) => {
                        debug!("Could not fetch robots.txt for {}: {}", key, e);
                        RobotsRules::allow_all()
                    }
                }
            }
            Err(_) => RobotsRules::allow_all(),
        };

        self.rules.insert(key, rules.clone());
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "User-agent: *\nDisallow: /private/\nCrawl-delay: 2\n\nUser-agent: BadBot\nDisallow: /\n";

    #[test]
    fn test_disallowed_path() {
        let rules = RobotsRules::parse(ROBOTS);
        let private = Url::parse("https://example.com/private/soup").unwrap();
        let public = Url::parse("https://example.com/recipes/soup").unwrap();
        assert!(!rules.is_allowed("RecipeCrawlerRS", &private));
        assert!(rules.is_allowed("RecipeCrawlerRS", &public));
        assert!(!rules.is_allowed("BadBot", &public));
    }

    #[test]
    fn test_crawl_delay() {
        let rules = RobotsRules::parse(ROBOTS);
        assert_eq!(rules.crawl_delay, Some(Duration::from_secs(2)));
        assert_eq!(RobotsRules::parse("User-agent: *\n").crawl_delay, None);
    }

    #[test]
    fn test_allow_all_without_robots() {
        let url = Url::parse("https://example.com/anything").unwrap();
        assert!(RobotsRules::allow_all().is_allowed("RecipeCrawlerRS", &url));
    }
}
