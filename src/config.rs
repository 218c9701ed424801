use crate::{dedup::DedupStrategy, fetcher::RetryPolicy, http::Compression, CrawlerError};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, time::Duration};
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "website_sources.yaml";
pub const DEFAULT_RECIPE_LIMIT: usize = 20;
pub const ROBOTS_AGENT: &str = "RecipeCrawlerRS";

/// Hosts whose recipes are not published as schema.org markup.
const HEURISTIC_HOSTS: [&str; 2] = ["myplate.gov", "healthyeating.nhlbi.nih.gov"];

#[derive(Debug, Deserialize)]
struct SourceDocument {
    site: SiteEntry,
}

#[derive(Debug, Deserialize)]
struct SiteEntry {
    url: String,
    title: Option<String>,
    start_url: Option<String>,
    #[serde(default)]
    start_urls: Vec<String>,
    recipe_url: Option<String>,
    license: Option<String>,
    filter_tag: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, serde_yaml::Value>,
}

/// One crawl target. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub name: String,
    pub url: Url,
    /// Seeds, in the order they are visited.
    pub base_urls: Vec<Url>,
    pub license: Option<Url>,
    pub filter_tag: Option<String>,
    /// Links under this prefix are likely recipe pages and are visited first.
    pub recipe_url: Option<String>,
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        SiteConfig {
            name: name.into(),
            base_urls: vec![url.clone()],
            url,
            license: None,
            filter_tag: None,
            recipe_url: None,
            options: BTreeMap::new(),
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<Url>) -> Self {
        if !seeds.is_empty() {
            self.base_urls = seeds;
        }
        self
    }

    pub fn with_license(mut self, license: &str) -> Self {
        self.license = parse_license(license);
        self
    }

    pub fn with_recipe_url(mut self, prefix: impl Into<String>) -> Self {
        self.recipe_url = Some(prefix.into());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options
            .insert(key.to_string(), serde_yaml::Value::String(value.to_string()));
        self
    }

    fn from_entry(entry: SiteEntry) -> Result<Self, CrawlerError> {
        let url = parse_url(&entry.url)?;

        let mut seeds = vec![];
        for s in entry.start_urls.iter().chain(entry.start_url.iter()) {
            let seed = parse_url(s)?;
            if !seeds.contains(&seed) {
                seeds.push(seed);
            }
        }

        let name = entry
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| url.host_str().map(ToString::to_string))
            .ok_or_else(|| CrawlerError::Config(format!("site '{}' has no host", entry.url)))?;

        let recipe_url = entry
            .recipe_url
            .filter(|r| !r.trim().is_empty())
            .map(|r| url.join(r.trim()).map(String::from).unwrap_or(r));

        Ok(SiteConfig {
            name,
            base_urls: if seeds.is_empty() { vec![url.clone()] } else { seeds },
            license: entry.license.as_deref().and_then(parse_license),
            filter_tag: entry.filter_tag,
            recipe_url,
            options: entry.options,
            url,
        })
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(serde_yaml::Value::as_str)
    }

    /// Case-insensitive match against the site name, base URL, or filter tag.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.to_lowercase();
        self.name.to_lowercase().contains(&filter)
            || self.url.as_str().to_lowercase().contains(&filter)
            || self
                .filter_tag
                .as_ref()
                .map_or(false, |t| t.to_lowercase().contains(&filter))
    }

    pub fn uses_heuristic_extractor(&self) -> bool {
        match self.option_str("extractor") {
            Some(e) => e.eq_ignore_ascii_case("heuristic"),
            None => self.host().map_or(false, |host| {
                let host = host.to_lowercase();
                HEURISTIC_HOSTS
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
            }),
        }
    }
}

fn parse_url(s: &str) -> Result<Url, CrawlerError> {
    let url = Url::parse(s.trim()).map_err(|source| CrawlerError::InvalidUrl {
        url: s.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CrawlerError::Config(format!(
            "unsupported scheme '{}' in '{}'",
            other, s
        ))),
    }
}

/// A license is only kept when it is an absolute http(s) URL.
pub fn parse_license(s: &str) -> Option<Url> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("proprietary") {
        return None;
    }
    match Url::parse(s) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        _ => {
            warn!("Ignoring license that is not an absolute URL: {}", s);
            None
        }
    }
}

/// Parses a stream of YAML documents, one `site:` mapping each.
pub fn parse_sites(yaml: &str) -> Result<Vec<SiteConfig>, CrawlerError> {
    let mut sites = vec![];
    for document in serde_yaml::Deserializer::from_str(yaml) {
        if let Some(doc) = Option::<SourceDocument>::deserialize(document)? {
            sites.push(SiteConfig::from_entry(doc.site)?);
        }
    }
    Ok(sites)
}

pub fn load_sites(path: &Path) -> Result<Vec<SiteConfig>, CrawlerError> {
    let yaml = fs::read_to_string(path).map_err(|source| CrawlerError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let sites = parse_sites(&yaml)?;
    info!("Loaded {} site(s) from {}", sites.len(), path.display());
    Ok(sites)
}

pub fn filter_sites(
    sites: Vec<SiteConfig>,
    filter: Option<&str>,
) -> Result<Vec<SiteConfig>, CrawlerError> {
    let sites = match filter {
        Some(f) => {
            let filtered: Vec<_> = sites.into_iter().filter(|s| s.matches_filter(f)).collect();
            info!("Filter '{}' kept {} site(s)", f, filtered.len());
            filtered
        }
        None => sites,
    };

    if sites.is_empty() {
        return Err(CrawlerError::Config(
            "website list is empty, the filter is too narrow".to_string(),
        ));
    }
    Ok(sites)
}

/// Run-wide parameters shared by every site.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub user_agent: String,
    pub robots_agent: String,
    pub timeout: Duration,
    pub compression: Compression,
    /// Minimum spacing between two requests to the same host.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    pub recipe_limit: usize,
    pub dedup: DedupStrategy,
    pub resolve_license_titles: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            user_agent: format!("{}/{}", ROBOTS_AGENT, env!("CARGO_PKG_VERSION")),
            robots_agent: ROBOTS_AGENT.to_string(),
            timeout: Duration::from_secs(5),
            compression: Compression::Brotli,
            request_delay: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
            recipe_limit: DEFAULT_RECIPE_LIMIT,
            dedup: DedupStrategy::Both,
            resolve_license_titles: true,
        }
    }
}
