use recipe_crawler::{
    config::CrawlSettings,
    fetcher::RetryPolicy,
    http::{HttpClient, HttpResponse},
    TransportError,
};
use std::{
    collections::HashMap,
    fs,
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

/// Serves canned pages; anything unknown is a 404.
#[derive(Clone, Default)]
pub struct FakeWeb {
    pages: HashMap<String, HttpResponse>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        FakeWeb::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), HttpResponse::new(200, html));
        self
    }

    pub fn fixture(self, url: &str, file: &str) -> Self {
        let html = fs::read_to_string(format!("tests/htmls/{}", file)).unwrap();
        self.page(url, &html)
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages
            .insert(url.to_string(), HttpResponse::new(status, ""));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requested().iter().any(|u| u == url)
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeWeb {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self
            .pages
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, "")))
    }
}

pub fn settings(limit: usize) -> CrawlSettings {
    CrawlSettings {
        request_delay: Duration::ZERO,
        retry: RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..RetryPolicy::default()
        },
        recipe_limit: limit,
        resolve_license_titles: false,
        ..CrawlSettings::default()
    }
}

pub fn recipe_page(name: &str, ingredients: &[&str], links: &[&str]) -> String {
    let ingredients = ingredients
        .iter()
        .map(|i| format!("\"{}\"", i))
        .collect::<Vec<_>>()
        .join(", ");
    let links = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a>"#, l))
        .collect::<String>();
    format!(
        r#"<html><head><script type="application/ld+json">
{{"@context": "https://schema.org", "@type": "Recipe", "name": "{}", "recipeIngredient": [{}]}}
</script></head><body>{}</body></html>"#,
        name, ingredients, links
    )
}

pub fn link_page(links: &[&str]) -> String {
    let links = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a>"#, l))
        .collect::<String>();
    format!("<html><body>{}</body></html>", links)
}
