use super::{is_recipe_type, SCHEMA_CONTEXT};
use crate::Scraper;
use lazy_regex::regex;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

const E: &str = "Invalid selector";
lazy_static! {
    static ref LD_JSON: Selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect(E);
}

/// Reads recipes out of `<script type="application/ld+json">` blocks.
#[derive(Debug, Default)]
pub struct JsonLdScraper;

impl JsonLdScraper {
    fn blocks(doc: &Html) -> Vec<Value> {
        doc.select(&LD_JSON)
            .filter_map(|script| {
                let raw = script.text().collect::<String>();
                let raw = strip_wrappers(&raw);
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!("Skipping malformed JSON-LD block: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl Scraper for JsonLdScraper {
    fn name(&self) -> &'static str {
        "json-ld"
    }

    fn can_be_scrapped(&self, doc: &Html) -> bool {
        doc.select(&LD_JSON).next().is_some()
    }

    fn scrap(&self, doc: &Html) -> Option<Map<String, Value>> {
        let mut found = vec![];
        for block in Self::blocks(doc) {
            collect_recipes(&block, None, &mut found);
            if !found.is_empty() {
                break;
            }
        }

        let mut recipe = found.into_iter().next()?;
        if !recipe.contains_key("@context") {
            recipe.insert("@context".into(), Value::String(SCHEMA_CONTEXT.into()));
        }
        Some(recipe)
    }
}

/// Blanks raw control characters and strips HTML comment or CDATA wrappers.
fn strip_wrappers(raw: &str) -> String {
    let raw = regex!(r"[\x00-\x1f]").replace_all(raw, " ");
    let raw = raw.trim();
    let raw = raw.strip_prefix("<!--").unwrap_or(raw);
    let raw = raw.strip_suffix("-->").unwrap_or(raw);
    let raw = raw.trim();
    let raw = raw.strip_prefix("//<![CDATA[").unwrap_or(raw);
    let raw = raw.strip_suffix("//]]>").unwrap_or(raw);
    raw.trim().to_string()
}

/// Depth-first walk over arrays, `@graph` and `mainEntity` looking for Recipe
/// nodes. Nodes inherit the nearest enclosing `@context`.
fn collect_recipes(value: &Value, context: Option<&Value>, found: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Array(items) => items
            .iter()
            .for_each(|v| collect_recipes(v, context, found)),
        Value::Object(map) => {
            let context = map.get("@context").or(context);
            if map.get("@type").map_or(false, is_recipe_type) {
                let mut recipe = map.clone();
                if let (false, Some(context)) = (recipe.contains_key("@context"), context) {
                    recipe.insert("@context".into(), context.clone());
                }
                found.push(recipe);
                return;
            }
            for key in ["@graph", "mainEntity", "mainEntityOfPage"] {
                if let Some(nested) = map.get(key) {
                    collect_recipes(nested, context, found);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    fn page(ld: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json">{}</script></head><body></body></html>"#,
            ld
        ))
    }

    #[test]
    fn test_graph_fixture() {
        let html = fs::read_to_string("tests/htmls/tomato_soup.html").unwrap();
        let doc = Html::parse_document(&html);
        let scraper = JsonLdScraper;
        assert!(scraper.can_be_scrapped(&doc));

        let recipe = scraper.scrap(&doc).expect("recipe in @graph");
        assert_eq!(recipe["name"], json!("Tomato Soup"));
        assert_eq!(recipe["@context"], json!("https://schema.org"));
    }

    #[test]
    fn test_main_entity_and_type_list() {
        let doc = page(
            r#"{"@type": "WebPage", "mainEntity": {"@type": ["Recipe", "NewsArticle"], "name": "Dal"}}"#,
        );
        let recipe = JsonLdScraper.scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Dal"));
        assert_eq!(recipe["@context"], json!(SCHEMA_CONTEXT));
    }

    #[test]
    fn test_control_characters_and_comment_wrapper() {
        let doc = page("<!--{\"@type\": \"Recipe\", \"name\": \"Line\nBreak\"}-->");
        let recipe = JsonLdScraper.scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Line Break"));
    }

    #[test]
    fn test_no_recipe() {
        let doc = page(r#"{"@type": "Organization", "name": "Acme"}"#);
        assert_eq!(JsonLdScraper.scrap(&doc), None);

        let doc = page("{ this is not json");
        assert_eq!(JsonLdScraper.scrap(&doc), None);
    }
}
