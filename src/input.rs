//! Reading article clusters and story lists from JSON files.
//!
//! A file holds either a bare JSON array or an object carrying the list
//! under a well-known key, so a `story` envelope can be fed straight into
//! `classify` or `link`.
use crate::model::{Article, StoryNode};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

fn read_value(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse JSON {}", path.display()))
}

fn decode_list<T: DeserializeOwned>(value: Value, what: &str, path: &Path) -> Result<Vec<T>> {
    serde_json::from_value(value).with_context(|| format!("parse {what} in {}", path.display()))
}

/// Load a cluster of articles: `[...]` or `{"articles": [...]}`.
pub fn load_articles(path: &Path) -> Result<Vec<Article>> {
    let value = match read_value(path)? {
        Value::Object(mut object) => object
            .remove("articles")
            .ok_or_else(|| anyhow!("{} has no \"articles\" array", path.display()))?,
        other => other,
    };
    decode_list(value, "articles", path)
}

/// Load stories: `[...]`, `{"stories": [...]}`, `{"classified_stories": [...]}`
/// or a single story envelope `{"story": {...}}`.
pub fn load_stories(path: &Path) -> Result<Vec<StoryNode>> {
    let value = match read_value(path)? {
        Value::Object(mut object) => {
            if let Some(stories) = object
                .remove("stories")
                .or_else(|| object.remove("classified_stories"))
            {
                stories
            } else if let Some(story) = object.remove("story") {
                Value::Array(vec![story])
            } else {
                return Err(anyhow!(
                    "{} has no \"stories\", \"classified_stories\" or \"story\" entry",
                    path.display()
                ));
            }
        }
        other => other,
    };
    decode_list(value, "stories", path)
}

/// Name a cluster after its file stem.
pub fn cluster_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
