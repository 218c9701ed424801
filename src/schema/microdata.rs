use super::SCHEMA_CONTEXT;
use crate::{utils::clean_text, Scraper};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

const E: &str = "Invalid selector";
lazy_static! {
    static ref ITEM_SCOPE: Selector = Selector::parse("[itemscope][itemtype]").expect(E);
    static ref ITEM_PROP: Selector = Selector::parse("[itemprop]").expect(E);
}

/// Reads recipes marked up with `itemscope`/`itemprop` attributes.
#[derive(Debug, Default)]
pub struct MicrodataScraper;

impl MicrodataScraper {
    fn recipe_scope(doc: &Html) -> Option<ElementRef<'_>> {
        doc.select(&ITEM_SCOPE).find(|el| {
            el.value()
                .attr("itemtype")
                .map_or(false, |t| t.split_whitespace().any(is_recipe_itemtype))
        })
    }
}

impl Scraper for MicrodataScraper {
    fn name(&self) -> &'static str {
        "microdata"
    }

    fn can_be_scrapped(&self, doc: &Html) -> bool {
        Self::recipe_scope(doc).is_some()
    }

    fn scrap(&self, doc: &Html) -> Option<Map<String, Value>> {
        let scope = Self::recipe_scope(doc)?;
        let mut recipe = read_item(scope);

        if !recipe.contains_key("recipeIngredient") {
            if let Some(ingredients) = recipe.remove("ingredients") {
                recipe.insert("recipeIngredient".into(), ingredients);
            }
        }
        recipe.insert("@context".into(), Value::String(SCHEMA_CONTEXT.into()));
        recipe.insert("@type".into(), Value::String("Recipe".into()));
        Some(recipe)
    }
}

fn is_recipe_itemtype(itemtype: &str) -> bool {
    let t = itemtype.trim_end_matches('/');
    t.ends_with("schema.org/Recipe") || t.ends_with("data-vocabulary.org/Recipe")
}

/// True when `scope` is the nearest enclosing `itemscope` of `el`.
fn owned_by(el: ElementRef, scope: ElementRef) -> bool {
    el.ancestors()
        .find(|n| {
            n.value()
                .as_element()
                .map_or(false, |e| e.attr("itemscope").is_some())
        })
        .map_or(false, |n| n.id() == scope.id())
}

fn read_item(scope: ElementRef) -> Map<String, Value> {
    let mut item = Map::new();

    for prop in scope.select(&ITEM_PROP) {
        if !owned_by(prop, scope) {
            continue;
        }

        let value = if prop.value().attr("itemscope").is_some() {
            let mut nested = read_item(prop);
            if let Some(t) = prop.value().attr("itemtype") {
                let t = t.trim().trim_end_matches('/');
                let t = t.rsplit('/').next().unwrap_or(t);
                nested.insert("@type".into(), Value::String(t.to_string()));
            }
            Value::Object(nested)
        } else {
            match property_value(prop) {
                Some(v) => Value::String(v),
                None => continue,
            }
        };

        let names = prop.value().attr("itemprop").unwrap_or_default();
        for name in names.split_whitespace() {
            append(&mut item, name, value.clone());
        }
    }

    item
}

fn property_value(prop: ElementRef) -> Option<String> {
    let el = prop.value();
    let value = match el.name() {
        "meta" => el.attr("content").map(ToString::to_string),
        "a" | "link" | "area" => el.attr("href").map(ToString::to_string),
        "img" | "audio" | "video" | "source" | "iframe" | "embed" => {
            el.attr("src").map(ToString::to_string)
        }
        "time" => el
            .attr("datetime")
            .map(ToString::to_string)
            .or_else(|| Some(prop.text().collect())),
        "data" | "meter" => el.attr("value").map(ToString::to_string),
        _ => Some(
            el.attr("content")
                .map(ToString::to_string)
                .unwrap_or_else(|| prop.text().collect()),
        ),
    }?;

    let value = clean_text(&value);
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Repeated properties collect into a list.
fn append(item: &mut Map<String, Value>, name: &str, value: Value) {
    match item.get_mut(name) {
        None => {
            item.insert(name.to_string(), value);
        }
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_microdata_fixture() {
        let html = fs::read_to_string("tests/htmls/microdata.html").unwrap();
        let doc = Html::parse_document(&html);
        assert!(MicrodataScraper.can_be_scrapped(&doc));

        let recipe = MicrodataScraper.scrap(&doc).unwrap();
        assert_eq!(recipe["name"], json!("Lentil Stew"));
        assert_eq!(
            recipe["recipeIngredient"],
            json!(["1 cup lentils", "2 carrots", "1 onion"])
        );
        assert_eq!(recipe["totalTime"], json!("PT45M"));
        assert_eq!(recipe["image"], json!("https://example.org/img/stew.jpg"));
        assert_eq!(
            recipe["author"],
            json!({"@type": "Person", "name": "Grace Hopper", "url": "https://example.org/grace"})
        );
        assert_eq!(recipe["@type"], json!("Recipe"));
    }

    #[test]
    fn test_nested_props_stay_in_their_scope() {
        let doc = Html::parse_document(
            r#"<div itemscope itemtype="http://data-vocabulary.org/Recipe">
                 <span itemprop="name">Flatbread</span>
                 <span itemprop="ingredients">flour</span>
                 <div itemprop="nutrition" itemscope itemtype="http://schema.org/NutritionInformation">
                   <span itemprop="calories">200</span>
                 </div>
               </div>"#,
        );
        let recipe = MicrodataScraper.scrap(&doc).unwrap();
        assert_eq!(recipe["recipeIngredient"], json!("flour"));
        assert_eq!(
            recipe["nutrition"],
            json!({"@type": "NutritionInformation", "calories": "200"})
        );
        assert!(!recipe.contains_key("calories"));
    }

    #[test]
    fn test_legacy_ingredients_kept_next_to_recipe_ingredient() {
        let doc = Html::parse_document(
            r#"<div itemscope itemtype="https://schema.org/Recipe">
                 <span itemprop="name">Porridge</span>
                 <span itemprop="recipeIngredient">oats</span>
                 <span itemprop="ingredients">milk</span>
               </div>"#,
        );
        let recipe = MicrodataScraper.scrap(&doc).unwrap();
        assert_eq!(recipe["recipeIngredient"], json!("oats"));
        assert_eq!(recipe["ingredients"], json!("milk"));
    }

    #[test]
    fn test_other_itemtypes_are_ignored() {
        let doc = Html::parse_document(
            r#"<div itemscope itemtype="https://schema.org/Product"><span itemprop="name">Pan</span></div>"#,
        );
        assert!(!MicrodataScraper.can_be_scrapped(&doc));
        assert_eq!(MicrodataScraper.scrap(&doc), None);
    }
}
