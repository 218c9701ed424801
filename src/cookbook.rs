use crate::{fetcher::FetchStats, recipe::RecipeRecord, CrawlerError};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct SiteSummary {
    pub name: String,
    pub url: Url,
    pub license: Option<Url>,
    /// Indices into [`Cookbook::recipes`].
    pub recipes: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetch: FetchStats,
    pub pages_visited: usize,
}

/// The result of one run.
#[derive(Debug, Clone)]
pub struct Cookbook {
    pub recipes: Vec<RecipeRecord>,
    pub crawled_at: DateTime<Utc>,
    pub sites: Vec<SiteSummary>,
    /// Page titles of license URLs, when they could be fetched.
    pub license_titles: BTreeMap<Url, String>,
    pub stats: RunStats,
}

impl Cookbook {
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn license_urls(&self) -> Vec<&Url> {
        self.recipes
            .iter()
            .filter_map(|r| r.license_url.as_ref())
            .sorted()
            .dedup()
            .collect()
    }

    fn license_link(&self, url: &Url) -> String {
        match self.license_titles.get(url) {
            Some(title) => format!("[{}]({})", title, url),
            None => format!("<{}>", url),
        }
    }

    /// Markdown attribution for every recipe, grouped by site.
    pub fn license_report(&self) -> String {
        let mut lines = vec![
            "# Recipe licenses".to_string(),
            String::new(),
            format!(
                "Crawled on {}, {} recipe(s).",
                self.crawled_at.format("%Y-%m-%d %H:%M UTC"),
                self.len()
            ),
            String::new(),
            "## Licenses".to_string(),
            String::new(),
        ];

        let licenses = self.license_urls();
        if licenses.is_empty() {
            lines.push("No license information was found.".to_string());
        }
        lines.extend(licenses.into_iter().map(|l| format!(" * {}", self.license_link(l))));

        for site in &self.sites {
            let recipes: Vec<_> = site
                .recipes
                .iter()
                .filter_map(|&i| self.recipes.get(i))
                .sorted_by_key(|r| r.name().to_lowercase())
                .collect();
            if recipes.is_empty() {
                continue;
            }

            let license = site
                .license
                .as_ref()
                .map(|l| self.license_link(l))
                .unwrap_or_else(|| "not specified".to_string());
            lines.extend([
                String::new(),
                format!("## {}", site.name),
                String::new(),
                format!("Website: <{}>", site.url),
                String::new(),
                format!("License: {}", license),
                String::new(),
                "Recipes:".to_string(),
                String::new(),
            ]);
            lines.extend(recipes.into_iter().map(|r| format!(" * {}", attribution(r))));
        }

        lines.push(String::new());
        lines.join("\n")
    }

    /// Writes the recipes as a JSON array. Never overwrites: the returned path
    /// is where the file actually went.
    pub fn write(&self, requested: &Path) -> Result<PathBuf, CrawlerError> {
        let json = serde_json::to_string_pretty(&self.recipes)?;
        let path = write_new_file(&json_filename(requested), json.as_bytes())?;
        info!("Wrote {} recipe(s) to {}", self.len(), path.display());
        Ok(path)
    }

    /// Writes `license-<stem>.md` next to the cookbook.
    pub fn write_license_summary(&self, cookbook_path: &Path) -> Result<PathBuf, CrawlerError> {
        let stem = cookbook_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "cookbook".to_string());
        let path = write_new_file(
            &cookbook_path.with_file_name(format!("license-{}.md", stem)),
            self.license_report().as_bytes(),
        )?;
        info!("Wrote license summary to {}", path.display());
        Ok(path)
    }
}

fn attribution(recipe: &RecipeRecord) -> String {
    let authors = recipe
        .schema
        .authors()
        .iter()
        .filter_map(|a| match (a.name(), a.url()) {
            (Some(name), Some(url)) => Some(format!("[{}]({})", name, url)),
            (Some(name), None) => Some(name.to_string()),
            _ => None,
        })
        .join(", ");

    let link = format!("[{}]({})", recipe.name(), recipe.source_url);
    if authors.is_empty() {
        link
    } else {
        format!("{} by {}", link, authors)
    }
}

/// Appends `.json` unless the name already ends with it.
pub fn json_filename(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("json") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".json");
            PathBuf::from(name)
        }
    }
}

/// `path` for 0, else `<stem>-N.<ext>`.
fn numbered(path: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{}-{}{}", stem, n, ext))
}

/// Writes `contents` to a temp file in the target directory, then links it to
/// `path` or the first free `<stem>-N.<ext>`. An existing file is never
/// replaced, even one created while the run was writing.
fn write_new_file(path: &Path, contents: &[u8]) -> Result<PathBuf, CrawlerError> {
    let error = |source: io::Error| CrawlerError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(error)?;
    file.write_all(contents).map_err(error)?;
    file.flush().map_err(error)?;

    let mut n = 0;
    loop {
        let candidate = numbered(path, n);
        match file.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                file = e.file;
                n += 1;
            }
            Err(e) => return Err(error(e.error)),
        }
    }
}
