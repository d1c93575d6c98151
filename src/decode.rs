//! Decoding of collaborator responses into typed story records.
//!
//! The response is an untrusted JSON object. A disabled capability never has
//! its field read; an enabled capability whose field is absent or mis-shaped
//! resolves to the descriptor's default. Nothing in here returns an error.
use crate::capability::{descriptor, Capability, FieldValue, PipelineConfig};
use crate::model::{unique_ids, Article, Location, Quote, StoryNode, SubGroup};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::BTreeSet;

/// Articles split by the noise filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseSplit<'a> {
    /// Articles kept for synthesis, in input order.
    pub kept: Vec<&'a Article>,
    /// Ids of input articles judged noise, in input order.
    pub noise_ids: Vec<String>,
}

/// Read one capability's field, honoring the configuration.
fn field(raw: &Map<String, Value>, config: &PipelineConfig, capability: Capability) -> FieldValue {
    let descriptor = descriptor(capability);
    if config.enables(capability) {
        descriptor.decode(raw)
    } else {
        descriptor.default_value()
    }
}

/// Noise ids reported by the collaborator, or none when filtering is off.
fn reported_noise(raw: &Map<String, Value>, config: &PipelineConfig) -> BTreeSet<String> {
    match field(raw, config, Capability::FilterNoise) {
        FieldValue::Strings(ids) => ids.into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

/// Split input articles into kept articles and noise ids.
///
/// Runs whether or not filtering is enabled; with filtering off every article
/// is kept. Noise ids that do not name an input article are dropped.
pub fn split_noise<'a, A: Borrow<Article>>(
    raw: &Map<String, Value>,
    config: &PipelineConfig,
    articles: &'a [A],
) -> NoiseSplit<'a> {
    let reported = reported_noise(raw, config);
    let (noise, kept): (Vec<&Article>, Vec<&Article>) = articles
        .iter()
        .map(Borrow::<Article>::borrow)
        .partition(|article| reported.contains(&article.id));
    let noise_ids = unique_ids(noise);
    let unknown = reported
        .iter()
        .filter(|id| !noise_ids.contains(id))
        .count();
    if unknown > 0 {
        tracing::warn!(unknown, "ignoring noise ids that match no input article");
    }
    NoiseSplit { kept, noise_ids }
}

/// Sub-groups proposed by the collaborator, or none when grouping is off.
pub fn subgroups(raw: &Map<String, Value>, config: &PipelineConfig) -> Vec<SubGroup> {
    match field(raw, config, Capability::GroupArticles) {
        FieldValue::SubGroups(groups) => groups,
        _ => Vec::new(),
    }
}

/// Decode a response into a story without sub-stories.
///
/// `articles` are the articles sent with the request; `article_ids` and
/// `noise_article_ids` are derived from them and the reported noise ids.
pub fn decode<A: Borrow<Article>>(
    raw: &Map<String, Value>,
    config: &PipelineConfig,
    articles: &[A],
) -> StoryNode {
    let split = split_noise(raw, config, articles);
    let article_ids = unique_ids(split.kept.iter().copied());

    let title = text(field(raw, config, Capability::GenerateTitle));
    let summary = text(field(raw, config, Capability::GenerateSummary));
    let key_points = strings(field(raw, config, Capability::GenerateKeyPoints));
    let quotes = resolvable_quotes(
        quotes(field(raw, config, Capability::ExtractQuotes)),
        &article_ids,
    );
    let location = location(field(raw, config, Capability::ResolveLocation));

    StoryNode {
        title,
        summary,
        key_points,
        quotes,
        location,
        sub_stories: Vec::new(),
        article_ids,
        noise_article_ids: split.noise_ids,
    }
}

/// Drop quotes attributed to articles outside the story.
fn resolvable_quotes(quotes: Vec<Quote>, article_ids: &[String]) -> Vec<Quote> {
    let total = quotes.len();
    let kept: Vec<Quote> = quotes
        .into_iter()
        .filter(|quote| article_ids.contains(&quote.article_id))
        .collect();
    if kept.len() < total {
        tracing::warn!(
            dropped = total - kept.len(),
            "dropping quotes attributed to unknown articles"
        );
    }
    kept
}

fn text(value: FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text,
        _ => String::new(),
    }
}

fn strings(value: FieldValue) -> Vec<String> {
    match value {
        FieldValue::Strings(items) => items,
        _ => Vec::new(),
    }
}

fn quotes(value: FieldValue) -> Vec<Quote> {
    match value {
        FieldValue::Quotes(quotes) => quotes,
        _ => Vec::new(),
    }
}

fn location(value: FieldValue) -> Option<Location> {
    match value {
        FieldValue::Location(location) => location,
        _ => None,
    }
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
