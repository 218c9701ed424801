use chrono::Utc;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use url::Url;

pub mod config;
pub mod cookbook;
pub mod dedup;
pub mod fetcher;
pub mod frontier;
pub mod http;
pub mod links;
pub mod recipe;
pub mod robots;
pub mod schema;

mod error;
mod utils;

pub use error::{CrawlerError, TransportError};
pub use utils::normalize_url;

use config::{CrawlSettings, SiteConfig};
use cookbook::{Cookbook, RunStats, SiteSummary};
use dedup::Deduplicator;
use fetcher::{FetchStatus, Fetcher};
use frontier::{Frontier, Priority};
use http::HttpClient;
use recipe::{RecipeExtractor, RecipeRecord};

/// One way of reading schema.org/Recipe data out of a page.
pub trait Scraper {
    fn name(&self) -> &'static str;
    fn can_be_scrapped(&self, doc: &Html) -> bool;
    /// Raw schema.org properties of the first recipe on the page.
    fn scrap(&self, doc: &Html) -> Option<Map<String, Value>>;
}

pub enum CrawlerResult {
    Links(Vec<Url>),
    RecipeAndLinks(RecipeRecord, Vec<Url>),
}

const E: &str = "Invalid selector";
lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect(E);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Seeded,
    Fetching,
    Extracting,
    Expanding,
    Done,
    LimitReached,
}

/// Crawl state of one configured site.
pub struct SiteCrawler {
    config: SiteConfig,
    frontier: Frontier,
    extractor: RecipeExtractor,
    state: SiteState,
    pages_visited: usize,
    /// Positions of this site's accepted recipes in the run's list.
    recipes: Vec<usize>,
}

impl SiteCrawler {
    pub fn new(config: SiteConfig) -> Self {
        SiteCrawler {
            frontier: Frontier::seeded(&config.base_urls),
            extractor: RecipeExtractor::for_site(&config),
            state: SiteState::Seeded,
            pages_visited: 0,
            recipes: vec![],
            config,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn state(&self) -> SiteState {
        self.state
    }

    pub fn pages_visited(&self) -> usize {
        self.pages_visited
    }

    pub fn recipes(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SiteState::Done | SiteState::LimitReached)
    }

    pub fn extract_links(&self, doc: &Html, url: &Url) -> Vec<Url> {
        links::extract_links(doc, url)
            .into_iter()
            .filter(|link| !self.frontier.is_visited(link))
            .collect()
    }

    pub fn crawl(&self, doc: &Html, url: &Url) -> CrawlerResult {
        let links = self.extract_links(doc, url);
        match self.extractor.extract_document(doc, url) {
            Some(record) => CrawlerResult::RecipeAndLinks(record, links),
            None => CrawlerResult::Links(links),
        }
    }

    /// Queues unseen links; returns how many were new.
    fn expand(&mut self, links: Vec<Url>) -> usize {
        let recipe_url = self.config.recipe_url.as_deref();
        let mut added = 0;
        for link in links {
            let priority = links::rank(&link, recipe_url);
            if self.frontier.push(link, priority) {
                added += 1;
            }
        }
        added
    }
}

/// One crawl run over all configured sites. Owns every piece of mutable state
/// for the run.
pub struct Crawl<C> {
    fetcher: Fetcher<C>,
    settings: CrawlSettings,
    sites: Vec<SiteCrawler>,
    dedup: Deduplicator,
    recipes: Vec<RecipeRecord>,
}

impl<C: HttpClient> Crawl<C> {
    pub fn new(
        client: C,
        settings: CrawlSettings,
        sites: Vec<SiteConfig>,
    ) -> Result<Self, CrawlerError> {
        if sites.is_empty() {
            return Err(CrawlerError::Config("no sites to crawl".to_string()));
        }
        if let Some(site) = sites.iter().find(|s| s.base_urls.is_empty()) {
            return Err(CrawlerError::Config(format!(
                "site '{}' has no seed URL",
                site.name
            )));
        }

        Ok(Crawl {
            fetcher: Fetcher::new(client, &settings),
            dedup: Deduplicator::new(settings.dedup),
            sites: sites.into_iter().map(SiteCrawler::new).collect(),
            recipes: vec![],
            settings,
        })
    }

    pub fn sites(&self) -> &[SiteCrawler] {
        &self.sites
    }

    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }

    fn limit_reached(&self) -> bool {
        self.recipes.len() >= self.settings.recipe_limit
    }

    /// Visits the sites round-robin, one page per turn, until every frontier is
    /// exhausted or the recipe limit is hit.
    pub async fn run(&mut self) -> Cookbook {
        let crawled_at = Utc::now();
        info!(
            "Crawling {} site(s) for up to {} recipe(s)",
            self.sites.len(),
            self.settings.recipe_limit
        );

        loop {
            if self.limit_reached() {
                info!("Recipe limit of {} reached", self.settings.recipe_limit);
                self.sites
                    .iter_mut()
                    .filter(|s| s.is_active())
                    .for_each(|s| s.state = SiteState::LimitReached);
                break;
            }

            let mut progressed = false;
            for i in 0..self.sites.len() {
                if self.limit_reached() {
                    break;
                }
                if self.sites[i].is_active() {
                    self.step(i).await;
                    progressed = true;
                }
            }

            if !progressed {
                info!("Every site has been crawled");
                break;
            }
        }

        let license_titles = if self.settings.resolve_license_titles {
            self.resolve_license_titles().await
        } else {
            BTreeMap::new()
        };

        let pages_visited = self.sites.iter().map(SiteCrawler::pages_visited).sum();
        Cookbook {
            recipes: std::mem::take(&mut self.recipes),
            crawled_at,
            sites: self
                .sites
                .iter()
                .map(|s| SiteSummary {
                    name: s.config.name.clone(),
                    url: s.config.url.clone(),
                    license: s.config.license.clone(),
                    recipes: s.recipes.clone(),
                })
                .collect(),
            license_titles,
            stats: RunStats {
                fetch: self.fetcher.stats(),
                pages_visited,
            },
        }
    }

    /// Fetch, extract and expand one page of site `i`.
    async fn step(&mut self, i: usize) {
        let url = match self.sites[i].frontier.pop() {
            Some(url) => url,
            None => {
                info!("No more pages to visit for {}", self.sites[i].config.name);
                self.sites[i].state = SiteState::Done;
                return;
            }
        };

        self.sites[i].state = SiteState::Fetching;
        self.sites[i].pages_visited += 1;
        let result = self.fetcher.fetch(&url).await;

        let html = match (result.status, result.html) {
            (FetchStatus::Ok, Some(html)) => html,
            (FetchStatus::RobotsDisallowed, _) => {
                debug!("Skipping {}, disallowed by robots.txt", url);
                self.finish_step(i);
                return;
            }
            (status, _) => {
                warn!(
                    "Skipping {} ({:?}): {}",
                    url,
                    status,
                    result.error.as_deref().unwrap_or("no content")
                );
                self.finish_step(i);
                return;
            }
        };

        self.sites[i].state = SiteState::Extracting;
        let crawled = {
            let doc = Html::parse_document(&html);
            self.sites[i].crawl(&doc, &url)
        };

        let links = match crawled {
            CrawlerResult::Links(links) => links,
            CrawlerResult::RecipeAndLinks(record, links) => {
                self.accept(i, record);
                links
            }
        };

        self.sites[i].state = SiteState::Expanding;
        let added = self.sites[i].expand(links);
        debug!(
            "{} new link(s) from {}, {} pending",
            added,
            url,
            self.sites[i].frontier.len()
        );
        self.finish_step(i);
    }

    fn finish_step(&mut self, i: usize) {
        let site = &mut self.sites[i];
        if site.frontier.is_empty() {
            info!("No more pages to visit for {}", site.config.name);
            site.state = SiteState::Done;
        }
    }

    fn accept(&mut self, i: usize, record: RecipeRecord) {
        if self.dedup.is_duplicate(&record) {
            debug!("Duplicate recipe '{}' at {}", record.name(), record.source_url);
            return;
        }

        self.dedup.register(&record);
        self.sites[i].recipes.push(self.recipes.len());
        info!(
            "[{}] Insert Recipe '{}' {}",
            self.recipes.len() + 1,
            record.name(),
            record.source_url
        );
        self.recipes.push(record);
    }

    /// Page `<title>` of every distinct license URL. Failures are skipped.
    async fn resolve_license_titles(&mut self) -> BTreeMap<Url, String> {
        let mut licenses: Vec<Url> = self
            .recipes
            .iter()
            .filter_map(|r| r.license_url.clone())
            .collect();
        licenses.sort();
        licenses.dedup();

        let mut titles = BTreeMap::new();
        for license in licenses {
            let result = self.fetcher.fetch(&license).await;
            let title = result.html.as_deref().and_then(page_title);
            match title {
                Some(title) => {
                    debug!("License {} is '{}'", license, title);
                    titles.insert(license, title);
                }
                None => debug!("No title for license {}", license),
            }
        }
        titles
    }
}

fn page_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let title = doc.select(&TITLE).next()?.text().collect::<String>();
    let title = utils::clean_text(&title);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}
