use crate::{recipe::RecipeRecord, utils::normalize_url};
use clap::ValueEnum;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DedupStrategy {
    /// Same normalized source or canonical URL
    Url,
    /// Same name and ingredient list
    Content,
    /// Either of the above
    #[default]
    Both,
}

impl DedupStrategy {
    fn by_url(self) -> bool {
        matches!(self, DedupStrategy::Url | DedupStrategy::Both)
    }

    fn by_content(self) -> bool {
        matches!(self, DedupStrategy::Content | DedupStrategy::Both)
    }
}

/// Remembers every accepted recipe for one run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    strategy: DedupStrategy,
    urls: HashSet<String>,
    hashes: HashSet<String>,
}

impl Deduplicator {
    pub fn new(strategy: DedupStrategy) -> Self {
        Deduplicator {
            strategy,
            ..Default::default()
        }
    }

    pub fn strategy(&self) -> DedupStrategy {
        self.strategy
    }

    pub fn is_duplicate(&self, record: &RecipeRecord) -> bool {
        (self.strategy.by_url() && url_keys(record).iter().any(|k| self.urls.contains(k)))
            || (self.strategy.by_content()
                && content_key(record).map_or(false, |k| self.hashes.contains(&k)))
    }

    pub fn register(&mut self, record: &RecipeRecord) {
        self.urls.extend(url_keys(record));
        if let Some(key) = content_key(record) {
            self.hashes.insert(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.hashes.is_empty()
    }
}

fn url_keys(record: &RecipeRecord) -> Vec<String> {
    let mut keys = vec![normalize_url(&record.source_url)];
    let canonical = normalize_url(&record.canonical_url());
    if !keys.contains(&canonical) {
        keys.push(canonical);
    }
    keys
}

/// SHA-256 over the case-folded name and ingredients. `None` for a recipe with
/// neither, which never matches anything.
fn content_key(record: &RecipeRecord) -> Option<String> {
    let name = record.schema.name.as_deref().unwrap_or_default().trim().to_lowercase();
    let ingredients = record.schema.ingredients();
    if name.is_empty() && ingredients.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    for ingredient in ingredients {
        hasher.update(b"\n");
        hasher.update(ingredient.trim().to_lowercase().as_bytes());
    }
    Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecipeSchema;
    use chrono::Utc;
    use url::Url;

    fn record(url: &str, name: &str, ingredients: &[&str]) -> RecipeRecord {
        RecipeRecord {
            schema: RecipeSchema {
                name: Some(name.to_string()),
                recipe_ingredient: Some(ingredients.iter().map(ToString::to_string).collect()),
                ..Default::default()
            },
            source_url: Url::parse(url).unwrap(),
            license_url: None,
            site: "Example".to_string(),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_content_key_is_sha256_hex() {
        let key = content_key(&record("https://example.com/soup", " Soup ", &["Water"]));
        assert_eq!(
            key.as_deref(),
            Some("b071cde676bc01924deeebac8a03f893d7c608d520c98f9ad5a1705795334794")
        );
        assert_eq!(content_key(&record("https://example.com/x", "", &[])), None);
    }

    #[test]
    fn test_url_variants_are_duplicates() {
        let mut dedup = Deduplicator::new(DedupStrategy::Url);
        dedup.register(&record("https://example.com/soup/", "Soup", &["water"]));

        assert!(dedup.is_duplicate(&record("http://EXAMPLE.com/soup#top", "Other", &[])));
        assert!(!dedup.is_duplicate(&record("https://example.com/stew", "Soup", &["water"])));
    }

    #[test]
    fn test_canonical_url_is_a_key() {
        let mut dedup = Deduplicator::new(DedupStrategy::Url);
        let mut print = record("https://example.com/soup/print", "Soup", &["water"]);
        print.schema.url = Some("https://example.com/soup".to_string());
        dedup.register(&print);

        assert!(dedup.is_duplicate(&record("https://example.com/soup", "Soup", &[])));
    }

    #[test]
    fn test_content_hash() {
        let mut dedup = Deduplicator::new(DedupStrategy::Content);
        dedup.register(&record("https://a.example/soup", "Soup", &["Water", "Salt"]));

        assert!(dedup.is_duplicate(&record("https://b.example/x", "SOUP ", &["water", "salt"])));
        assert!(!dedup.is_duplicate(&record("https://a.example/soup", "Soup", &["water"])));
    }

    #[test]
    fn test_both() {
        let mut dedup = Deduplicator::new(DedupStrategy::default());
        assert_eq!(dedup.strategy(), DedupStrategy::Both);
        assert!(dedup.is_empty());

        dedup.register(&record("https://a.example/soup", "Soup", &["water"]));
        assert!(dedup.is_duplicate(&record("https://a.example/soup", "Stew", &[])));
        assert!(dedup.is_duplicate(&record("https://b.example/soup", "Soup", &["water"])));
        assert!(!dedup.is_duplicate(&record("https://b.example/stew", "Stew", &["beef"])));
    }
}
