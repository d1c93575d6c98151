//! Core data model: input articles and the synthesized story tree.
//!
//! Articles are read-only inputs supplied fresh per pipeline run. A
//! `StoryNode` is built bottom-up (sub-stories before the parent) and is
//! never mutated after it is returned.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;

/// A single news article belonging to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub text: String,
    pub source: String,
    /// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
}

/// A direct quote attributed to a speaker in one of the cluster's articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default)]
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub speaker_title: Option<String>,
    #[serde(default)]
    pub speaker_org: Option<String>,
    /// ISO3 country code of the speaker.
    #[serde(default)]
    pub speaker_nation: Option<String>,
    pub article_id: String,
}

/// Primary geographic location of a story. Every level is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// ISO3 country code.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// A collaborator-proposed sub-event within a cluster.
///
/// Lives only for the duration of one pipeline run; ids may overlap with
/// sibling sub-groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubGroup {
    pub theme: String,
    pub article_ids: Vec<String>,
}

/// A structured story synthesized from a cluster of articles.
///
/// `article_ids` and `noise_article_ids` are disjoint and both drawn from the
/// ids of the articles passed into the run that produced the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryNode {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub sub_stories: Vec<StoryNode>,
    #[serde(default)]
    pub article_ids: Vec<String>,
    #[serde(default)]
    pub noise_article_ids: Vec<String>,
}

impl StoryNode {
    /// The canonical empty story returned when there is nothing to synthesize.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty story for a cluster in which every article was judged noise.
    pub fn all_noise<A: Borrow<Article>>(articles: &[A]) -> Self {
        Self {
            noise_article_ids: unique_ids(articles.iter().map(Borrow::<Article>::borrow)),
            ..Self::default()
        }
    }
}

/// A story with the topics assigned to it by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedStory {
    #[serde(flatten)]
    pub story: StoryNode,
    pub topics: Vec<String>,
}

/// Topics assigned to one story, keyed by its position in the classifier input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub story_index: usize,
    pub topics: Vec<String>,
}

/// A match between two stories describing the same real-world event.
///
/// Indices are positions within each input group, not global ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryLink {
    pub group_a_index: usize,
    pub group_b_index: usize,
}

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a publication timestamp; values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp {raw:?}")))
}

/// Article ids in input order, each reported once.
pub(crate) fn unique_ids<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(article.id.as_str()))
        .map(|article| article.id.clone())
        .collect()
}
