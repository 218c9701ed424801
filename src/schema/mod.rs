//! schema.org/Recipe data model and the scrapers that produce it.

mod heuristic;
mod jsonld;
mod microdata;

pub use heuristic::HeuristicScraper;
pub use jsonld::JsonLdScraper;
pub use microdata::MicrodataScraper;

use crate::utils::clean_text;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA_CONTEXT: &str = "https://schema.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v.as_slice(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    /// Outside the vocabulary, but some sites publish the author as a bare string.
    Name(String),
    Person(Person),
}

impl Author {
    pub fn name(&self) -> Option<&str> {
        match self {
            Author::Name(name) => Some(name.as_str()),
            Author::Person(p) => p.name.as_deref(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Author::Name(_) => None,
            Author::Person(p) => p.url.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Image {
    Url(String),
    Object(ImageObject),
}

impl Image {
    pub fn url(&self) -> Option<&str> {
        match self {
            Image::Url(url) => Some(url.as_str()),
            Image::Object(o) => o.url.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instruction {
    Text(String),
    Step(HowToStep),
}

/// HowToStep or HowToSection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HowToStep {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_list_element: Vec<Instruction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instruction {
    /// Flattens sections into their step texts.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Instruction::Text(text) => vec![text.clone()],
            Instruction::Step(step) if !step.item_list_element.is_empty() => step
                .item_list_element
                .iter()
                .flat_map(Instruction::lines)
                .collect(),
            Instruction::Step(step) => step
                .text
                .as_ref()
                .or(step.name.as_ref())
                .map(|t| vec![t.clone()])
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Yield {
    Text(String),
    Count(serde_json::Number),
}

/// A schema.org/Recipe with every commonly used property typed and optional.
/// Properties without a typed slot, or whose value did not fit the typed
/// shape, are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct RecipeSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<OneOrMany<Author>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<OneOrMany<Image>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_ingredient: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_instructions: Option<OneOrMany<Instruction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_yield: Option<OneOrMany<Yield>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_category: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_cuisine: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecipeSchema {
    pub fn ingredients(&self) -> &[String] {
        self.recipe_ingredient.as_deref().unwrap_or_default()
    }

    pub fn instruction_lines(&self) -> Vec<String> {
        self.recipe_instructions
            .as_ref()
            .map(|i| i.as_slice().iter().flat_map(Instruction::lines).collect())
            .unwrap_or_default()
    }

    pub fn authors(&self) -> &[Author] {
        self.author.as_ref().map(OneOrMany::as_slice).unwrap_or_default()
    }

    /// A recipe needs at least a name or an ingredient list to count.
    pub fn is_recipe_like(&self) -> bool {
        self.name.as_ref().map_or(false, |n| !n.is_empty()) || !self.ingredients().is_empty()
    }
}

/// Removes `key` and converts it; a value that does not fit goes back untouched.
fn take<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(_) => {
            map.insert(key.to_string(), value);
            None
        }
    }
}

fn take_text(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    let text = match map.get(key)? {
        Value::String(s) => clean_text(s),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => match items.first() {
            Some(Value::String(s)) if items.len() == 1 => clean_text(s),
            _ => return None,
        },
        _ => return None,
    };
    map.remove(key);
    Some(text)
}

impl From<Map<String, Value>> for RecipeSchema {
    fn from(mut map: Map<String, Value>) -> Self {
        let recipe_ingredient = take::<OneOrMany<String>>(&mut map, "recipeIngredient").map(|i| {
            i.into_vec()
                .iter()
                .map(|s| clean_text(s))
                .filter(|s| !s.is_empty())
                .collect()
        });

        RecipeSchema {
            name: take_text(&mut map, "name"),
            description: take_text(&mut map, "description"),
            url: take(&mut map, "url"),
            author: take(&mut map, "author"),
            image: take(&mut map, "image"),
            recipe_ingredient,
            recipe_instructions: take(&mut map, "recipeInstructions"),
            recipe_yield: take(&mut map, "recipeYield"),
            total_time: take(&mut map, "totalTime"),
            prep_time: take(&mut map, "prepTime"),
            cook_time: take(&mut map, "cookTime"),
            recipe_category: take(&mut map, "recipeCategory"),
            recipe_cuisine: take(&mut map, "recipeCuisine"),
            keywords: take(&mut map, "keywords"),
            date_published: take(&mut map, "datePublished"),
            extra: map,
        }
    }
}

/// True for `Recipe`, `schema:Recipe` and `http(s)://schema.org/Recipe`, alone
/// or inside a type list.
pub(crate) fn is_recipe_type(value: &Value) -> bool {
    match value {
        Value::String(t) => {
            let t = t.trim().trim_end_matches('/');
            t == "Recipe" || t.ends_with("/Recipe") || t.ends_with(":Recipe")
        }
        Value::Array(types) => types.iter().any(is_recipe_type),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema(value: Value) -> RecipeSchema {
        match value {
            Value::Object(map) => RecipeSchema::from(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_typed_fields() {
        let recipe = schema(json!({
            "@context": "https://schema.org",
            "@type": "Recipe",
            "name": "Tomato  Soup",
            "author": {"@type": "Person", "name": "Ada", "url": "https://example.com/ada"},
            "recipeIngredient": ["4 tomatoes", " 1 onion "],
            "recipeInstructions": [
                {"@type": "HowToSection", "name": "Soup", "itemListElement": [
                    {"@type": "HowToStep", "text": "Chop."},
                    {"@type": "HowToStep", "text": "Simmer."}
                ]},
                "Serve."
            ],
            "recipeYield": 4,
            "nutrition": {"calories": "120 kcal"}
        }));

        assert_eq!(recipe.name.as_deref(), Some("Tomato Soup"));
        assert_eq!(recipe.ingredients(), ["4 tomatoes", "1 onion"]);
        assert_eq!(recipe.instruction_lines(), ["Chop.", "Simmer.", "Serve."]);
        assert_eq!(recipe.authors()[0].name(), Some("Ada"));
        assert_eq!(recipe.authors()[0].url(), Some("https://example.com/ada"));
        assert!(recipe.extra.contains_key("nutrition"));
        assert!(recipe.extra.contains_key("@type"));
    }

    #[test]
    fn test_mistyped_field_is_kept() {
        let recipe = schema(json!({
            "name": "Bread",
            "totalTime": {"minutes": 90}
        }));
        assert_eq!(recipe.total_time, None);
        assert_eq!(recipe.extra.get("totalTime"), Some(&json!({"minutes": 90})));

        let out = serde_json::to_value(&recipe).unwrap();
        assert_eq!(out["totalTime"], json!({"minutes": 90}));
    }

    #[test]
    fn test_single_string_ingredient() {
        let recipe = schema(json!({"recipeIngredient": "1 cup rice"}));
        assert_eq!(recipe.ingredients(), ["1 cup rice"]);
        assert!(recipe.is_recipe_like());
        assert!(!schema(json!({"description": "nothing"})).is_recipe_like());
    }

    #[test]
    fn test_recipe_types() {
        assert!(is_recipe_type(&json!("Recipe")));
        assert!(is_recipe_type(&json!("http://schema.org/Recipe")));
        assert!(is_recipe_type(&json!(["NewsArticle", "schema:Recipe"])));
        assert!(!is_recipe_type(&json!("WebPage")));
    }

    #[test]
    fn test_serialize_then_parse_keeps_fields() {
        let recipe = schema(json!({
            "@type": "Recipe",
            "name": "Pancakes",
            "image": ["https://example.com/a.jpg", {"url": "https://example.com/b.jpg"}],
            "keywords": "breakfast, sweet",
            "recipeYield": ["4", "4 servings"]
        }));
        let text = serde_json::to_string(&recipe).unwrap();
        let parsed: RecipeSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, recipe);
        assert_eq!(
            parsed.image.as_ref().and_then(|i| i.as_slice()[1].url()),
            Some("https://example.com/b.jpg")
        );
    }
}
