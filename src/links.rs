use crate::{frontier::Priority, utils::normalize_url};
use itertools::Itertools;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

const E: &str = "Invalid selector";
lazy_static! {
    static ref A: Selector = Selector::parse("a[href]").expect(E);
}

pub fn discover_links(html: &str, source_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    extract_links(&doc, source_url)
}

/// Same-host http(s) links of a page, fragments stripped, sorted and unique.
pub fn extract_links(doc: &Html, source_url: &Url) -> Vec<Url> {
    let host = source_url.host_str().unwrap_or_default().to_lowercase();
    let page = normalize_url(source_url);

    doc.select(&A)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter_map(|href| resolve_link(source_url, href))
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| {
            url.host_str()
                .map_or(false, |h| h.eq_ignore_ascii_case(&host))
        })
        .filter(|url| normalize_url(url) != page)
        .sorted()
        .unique_by(normalize_url)
        .collect()
}

fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || ["javascript:", "mailto:", "tel:", "data:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Links under the site's recipe prefix are visited first.
pub fn rank(url: &Url, recipe_url: Option<&str>) -> Priority {
    match recipe_url {
        Some(prefix) if !prefix.is_empty() && url.as_str().starts_with(prefix) => Priority::High,
        _ => Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r##"
<html><body>
  <a href="/recipes/soup">Soup</a>
  <a href="https://EXAMPLE.com/recipes/soup#comments">Soup again</a>
  <a href="stew?x=1">Stew</a>
  <a href="#top">Top</a>
  <a href="JavaScript:void(0)">Nothing</a>
  <a href="mailto:cook@example.com">Mail</a>
  <a href="tel:+100">Call</a>
  <a href="https://other.example/recipes/pie">Elsewhere</a>
  <a href="ftp://example.com/file">FTP</a>
  <a href="/recipes/">Self</a>
  <a>No href</a>
</body></html>
"##;

    #[test]
    fn test_discover_links() {
        let source = Url::parse("https://example.com/recipes/").unwrap();
        let links: Vec<String> = discover_links(PAGE, &source)
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            links,
            vec![
                "https://example.com/recipes/soup".to_string(),
                "https://example.com/recipes/stew?x=1".to_string(),
            ]
        );
    }

    #[test]
    fn test_rank() {
        let recipe = Url::parse("https://example.com/recipe/pho").unwrap();
        let about = Url::parse("https://example.com/about").unwrap();
        let prefix = Some("https://example.com/recipe/");

        assert_eq!(rank(&recipe, prefix), Priority::High);
        assert_eq!(rank(&about, prefix), Priority::Low);
        assert_eq!(rank(&recipe, None), Priority::Low);
    }
}
