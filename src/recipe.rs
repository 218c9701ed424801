use crate::{
    config::SiteConfig,
    schema::{HeuristicScraper, JsonLdScraper, MicrodataScraper, RecipeSchema},
    Scraper,
};
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// One extracted recipe plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    #[serde(flatten)]
    pub schema: RecipeSchema,
    pub source_url: Url,
    #[serde(rename = "license", default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<Url>,
    pub site: String,
    pub discovered_at: DateTime<Utc>,
}

impl RecipeRecord {
    pub fn name(&self) -> &str {
        self.schema.name.as_deref().unwrap_or("Untitled recipe")
    }

    /// The page's canonical URL when it declares one, else the URL it was fetched from.
    pub fn canonical_url(&self) -> Url {
        self.schema
            .url
            .as_deref()
            .and_then(|u| self.source_url.join(u).ok())
            .unwrap_or_else(|| self.source_url.clone())
    }
}

/// Runs the scrapers configured for a site in order; the first hit wins.
pub struct RecipeExtractor {
    site: String,
    license: Option<Url>,
    scrapers: Vec<Box<dyn Scraper + Send + Sync>>,
}

impl RecipeExtractor {
    pub fn for_site(site: &SiteConfig) -> Self {
        let mut scrapers: Vec<Box<dyn Scraper + Send + Sync>> =
            vec![Box::new(JsonLdScraper), Box::new(MicrodataScraper)];
        if site.uses_heuristic_extractor() {
            scrapers.push(Box::new(HeuristicScraper::from_site(site)));
        }

        RecipeExtractor {
            site: site.name.clone(),
            license: site.license.clone(),
            scrapers,
        }
    }

    pub fn extract(&self, html: &str, source_url: &Url) -> Option<RecipeRecord> {
        let doc = Html::parse_document(html);
        self.extract_document(&doc, source_url)
    }

    pub fn extract_document(&self, doc: &Html, source_url: &Url) -> Option<RecipeRecord> {
        let (scraper, mut raw) = self
            .scrapers
            .iter()
            .filter(|s| s.can_be_scrapped(doc))
            .find_map(|s| s.scrap(doc).map(|raw| (s.name(), raw)))?;

        let page_license = take_license(&mut raw, source_url);
        let schema = RecipeSchema::from(raw);
        if !schema.is_recipe_like() {
            debug!("Discarding {} data without name or ingredients", scraper);
            return None;
        }
        debug!("Recipe found by {} scraper at {}", scraper, source_url);

        Some(RecipeRecord {
            schema,
            source_url: source_url.clone(),
            license_url: page_license.or_else(|| self.license.clone()),
            site: self.site.clone(),
            discovered_at: Utc::now(),
        })
    }
}

/// Pulls a `license` property out of the raw data. An absolute URL (string, or
/// an object's `url`/`@id`) is returned. Any other value is appended to
/// `copyrightNotice`, which becomes a list when the page already has one.
fn take_license(raw: &mut Map<String, Value>, base: &Url) -> Option<Url> {
    let value = raw.remove("license")?;
    let candidate = match &value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(o) => o
            .get("url")
            .or_else(|| o.get("@id"))
            .and_then(Value::as_str),
        _ => None,
    };

    let url = candidate
        .filter(|s| s.starts_with("http://") || s.starts_with("https://") || s.starts_with('/'))
        .and_then(|s| base.join(s.trim()).ok());

    if url.is_none() {
        let notice = match raw.remove("copyrightNotice") {
            None => value,
            Some(Value::Array(mut notices)) => {
                notices.push(value);
                Value::Array(notices)
            }
            Some(existing) => Value::Array(vec![existing, value]),
        };
        raw.insert("copyrightNotice".into(), notice);
    }
    url
}
