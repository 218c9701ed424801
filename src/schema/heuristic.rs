use super::SCHEMA_CONTEXT;
use crate::{
    config::SiteConfig,
    utils::{clean_text, minutes_to_iso_duration, parse_minutes},
    Scraper,
};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::warn;

const E: &str = "Invalid selector";
lazy_static! {
    static ref OG_IMAGE: Selector = Selector::parse(r#"meta[property="og:image"]"#).expect(E);
    static ref DESCRIPTION: Selector =
        Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#)
            .expect(E);
}

const DEFAULT_TITLE: &str = "h1";
const DEFAULT_INGREDIENTS: &str = r#"[class*="ingredient"] li"#;
const DEFAULT_INSTRUCTIONS: &str =
    r#"[class*="instruction"] li, [class*="direction"] li, [class*="preparation"] li"#;
const DEFAULT_TOTAL_TIME: &str = r#"[class*="total-time"], [class*="totalTime"]"#;
const DEFAULT_YIELD: &str = r#"[class*="yield"], [class*="serving"]"#;

/// Fallback for sites that publish recipes as plain HTML. Selectors come from
/// the site options `title_selector`, `ingredient_selector`,
/// `instruction_selector`, `total_time_selector` and `yield_selector`.
#[derive(Debug)]
pub struct HeuristicScraper {
    title: Selector,
    ingredients: Selector,
    instructions: Selector,
    total_time: Selector,
    recipe_yield: Selector,
}

impl HeuristicScraper {
    pub fn from_site(site: &SiteConfig) -> Self {
        let selector = |key: &str, default: &str| -> Selector {
            site.option_str(key)
                .and_then(|s| match Selector::parse(s) {
                    Ok(selector) => Some(selector),
                    Err(_) => {
                        warn!("Invalid {} '{}' for {}, using default", key, s, site.name);
                        None
                    }
                })
                .unwrap_or_else(|| Selector::parse(default).expect(E))
        };

        HeuristicScraper {
            title: selector("title_selector", DEFAULT_TITLE),
            ingredients: selector("ingredient_selector", DEFAULT_INGREDIENTS),
            instructions: selector("instruction_selector", DEFAULT_INSTRUCTIONS),
            total_time: selector("total_time_selector", DEFAULT_TOTAL_TIME),
            recipe_yield: selector("yield_selector", DEFAULT_YIELD),
        }
    }

    fn texts(doc: &Html, selector: &Selector) -> Vec<String> {
        doc.select(selector)
            .map(|el| clean_text(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
        Self::texts(doc, selector).into_iter().next()
    }
}

impl Scraper for HeuristicScraper {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn can_be_scrapped(&self, doc: &Html) -> bool {
        doc.select(&self.ingredients).next().is_some()
    }

    fn scrap(&self, doc: &Html) -> Option<Map<String, Value>> {
        let ingredients = Self::texts(doc, &self.ingredients);
        if ingredients.is_empty() {
            return None;
        }

        let mut recipe = Map::new();
        recipe.insert("@context".into(), Value::String(SCHEMA_CONTEXT.into()));
        recipe.insert("@type".into(), Value::String("Recipe".into()));

        if let Some(name) = Self::first_text(doc, &self.title) {
            recipe.insert("name".into(), Value::String(name));
        }
        recipe.insert("recipeIngredient".into(), ingredients.into());

        let instructions = Self::texts(doc, &self.instructions);
        if !instructions.is_empty() {
            recipe.insert("recipeInstructions".into(), instructions.into());
        }

        if let Some(minutes) = Self::first_text(doc, &self.total_time)
            .as_deref()
            .and_then(parse_minutes)
            .filter(|m| *m > 0)
        {
            recipe.insert(
                "totalTime".into(),
                Value::String(minutes_to_iso_duration(minutes)),
            );
        }

        if let Some(recipe_yield) = Self::first_text(doc, &self.recipe_yield) {
            recipe.insert("recipeYield".into(), Value::String(recipe_yield));
        }

        let meta = |selector: &Selector| {
            doc.select(selector)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(clean_text)
                .filter(|s| !s.is_empty())
        };
        if let Some(image) = meta(&OG_IMAGE) {
            recipe.insert("image".into(), Value::String(image));
        }
        if let Some(description) = meta(&DESCRIPTION) {
            recipe.insert("description".into(), Value::String(description));
        }

        Some(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use url::Url;

    fn nih() -> SiteConfig {
        SiteConfig::new(
            "Healthy Eating",
            Url::parse("https://healthyeating.nhlbi.nih.gov/").unwrap(),
        )
    }

    #[test]
    fn test_nih_fixture() {
        let html = fs::read_to_string("tests/htmls/nih.html").unwrap();
        let doc = Html::parse_document(&html);
        let scraper = HeuristicScraper::from_site(&nih());
        assert!(scraper.can_be_scrapped(&doc));

        let recipe = scraper.scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Black Bean Salad"));
        assert_eq!(
            recipe["recipeIngredient"],
            json!(["1 can black beans", "1 cup corn", "1 lime, juiced"])
        );
        assert_eq!(
            recipe["recipeInstructions"],
            json!(["Rinse the beans.", "Mix everything."])
        );
        assert_eq!(recipe["totalTime"], json!("PT1H15M"));
        assert_eq!(recipe["recipeYield"], json!("4 servings"));
        assert_eq!(recipe["image"], json!("https://healthyeating.nhlbi.nih.gov/images/salad.jpg"));
    }

    #[test]
    fn test_custom_selectors() {
        let site = nih()
            .with_option("title_selector", "h2.title")
            .with_option("ingredient_selector", "ul.stuff > li");
        let doc = Html::parse_document(
            r#"<h1>Site</h1><h2 class="title">Toast</h2><ul class="stuff"><li>bread</li></ul>"#,
        );
        let recipe = HeuristicScraper::from_site(&site).scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Toast"));
        assert_eq!(recipe["recipeIngredient"], json!(["bread"]));
        assert!(!recipe.contains_key("totalTime"));
    }

    #[test]
    fn test_page_without_ingredients() {
        let doc = Html::parse_document("<h1>About us</h1><p>We cook.</p>");
        let scraper = HeuristicScraper::from_site(&nih());
        assert!(!scraper.can_be_scrapped(&doc));
        assert_eq!(scraper.scrap(&doc), None);
    }

    #[test]
    fn test_invalid_selector_falls_back() {
        let site = nih().with_option("title_selector", "h1[");
        let doc = Html::parse_document(r#"<h1>Rice</h1><div class="ingredients"><li>rice</li></div>"#);
        let recipe = HeuristicScraper::from_site(&site).scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Rice"));
    }
}
