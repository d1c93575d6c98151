//! Story orchestration: one collaborator call per cluster, then bounded
//! expansion of sub-groups into sub-stories.
//!
//! A run walks a straight line: compose the instruction, call the
//! collaborator once, apply the noise filter, decode the response, expand
//! sub-groups, return. Two inputs end the run early: an empty cluster (no
//! call at all) and a cluster in which every article was judged noise.
//!
//! Sub-stories are produced by `synthesize` alone, which never expands
//! anything, and always with `PipelineConfig::leaf()`. Depth is therefore
//! bounded at two no matter what the collaborator returns.
//!
//! In `CallMode::Split` the single call is replaced by one call per active
//! capability. Noise filtering runs first, on records without article text,
//! and every later call only sees the articles it kept.
use crate::capability::{descriptor, Capability, PipelineConfig};
use crate::collaborator::{call_json, Collaborator};
use crate::compose::compose;
use crate::decode::{decode, split_noise, subgroups};
use crate::model::{unique_ids, Article, StoryNode, SubGroup};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::BTreeSet;

const STORY_STAGE: &str = "story";
const SUB_STORY_STAGE: &str = "sub_story";

/// Default model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// How a story run talks to the collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallMode {
    /// One call carrying every active capability.
    #[default]
    Unified,
    /// One call per active capability, noise filtering first.
    Split,
}

/// Entry point for every pipeline stage: story generation, classification
/// and cross-group linking all go through one collaborator and model.
#[derive(Debug, Clone)]
pub struct Pipeline<C> {
    collaborator: C,
    model: String,
    parallel_expansion: bool,
    call_mode: CallMode,
}

/// Article fields sent to the collaborator.
#[derive(Serialize)]
struct ArticleRecord<'a> {
    id: &'a str,
    title: &'a str,
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    source: &'a str,
    published_at: String,
}

/// Result of one call-filter-decode pass, before any expansion.
enum Synthesis<'a> {
    /// No articles were supplied; no call was made.
    Empty,
    /// Every article was judged noise.
    AllNoise(StoryNode),
    /// A decoded story plus what expansion needs from the call.
    Story {
        story: StoryNode,
        raw: Map<String, Value>,
        kept: Vec<&'a Article>,
    },
}

impl<C: Collaborator> Pipeline<C> {
    pub fn new(collaborator: C, model: impl Into<String>) -> Self {
        Self {
            collaborator,
            model: model.into(),
            parallel_expansion: true,
            call_mode: CallMode::Unified,
        }
    }

    pub fn with_call_mode(mut self, call_mode: CallMode) -> Self {
        self.call_mode = call_mode;
        self
    }

    /// Expand sibling sub-groups one at a time instead of on the rayon pool.
    ///
    /// Sub-story order is the sub-group order either way.
    pub fn with_parallel_expansion(mut self, parallel: bool) -> Self {
        self.parallel_expansion = parallel;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub(crate) fn call(
        &self,
        stage: &'static str,
        instruction: &str,
        payload: &Value,
    ) -> Result<Map<String, Value>> {
        call_json(&self.collaborator, stage, &self.model, instruction, payload)
    }

    /// Turn a cluster of articles into a story tree.
    ///
    /// Fails only when a top-level collaborator call fails or its response
    /// is not a JSON object. A failing sub-story call degrades that sub-story
    /// to its sub-group theme and leaves its siblings untouched.
    pub fn generate_story(&self, articles: &[Article], config: &PipelineConfig) -> Result<StoryNode> {
        match self.synthesize(STORY_STAGE, articles, config)? {
            Synthesis::Empty => {
                tracing::debug!("empty cluster, skipping collaborator call");
                Ok(StoryNode::empty())
            }
            Synthesis::AllNoise(story) => {
                tracing::info!(
                    articles = articles.len(),
                    "every article judged noise, returning empty story"
                );
                Ok(story)
            }
            Synthesis::Story {
                mut story,
                raw,
                kept,
            } => {
                if config.generate_substories {
                    let groups = subgroups(&raw, config);
                    story.sub_stories = self.expand_all(&groups, &kept);
                }
                tracing::info!(
                    articles = articles.len(),
                    kept = story.article_ids.len(),
                    noise = story.noise_article_ids.len(),
                    quotes = story.quotes.len(),
                    sub_stories = story.sub_stories.len(),
                    "story generated"
                );
                Ok(story)
            }
        }
    }

    /// Compose, call, filter and decode. Never expands sub-groups.
    fn synthesize<'a, A: Borrow<Article>>(
        &self,
        stage: &'static str,
        articles: &'a [A],
        config: &PipelineConfig,
    ) -> Result<Synthesis<'a>> {
        if articles.is_empty() {
            return Ok(Synthesis::Empty);
        }

        let raw = match self.call_mode {
            CallMode::Unified => {
                let payload = article_payload(articles, ArticleText::Include)?;
                self.call(stage, &compose(config), &payload)?
            }
            CallMode::Split => self.noise_call(config, articles)?,
        };

        let split = split_noise(&raw, config, articles);
        if split.kept.is_empty() {
            return Ok(Synthesis::AllNoise(StoryNode::all_noise(articles)));
        }

        let raw = match self.call_mode {
            CallMode::Unified => raw,
            CallMode::Split => self.capability_calls(raw, config, &split.kept)?,
        };
        let story = decode(&raw, config, articles);
        Ok(Synthesis::Story {
            story,
            raw,
            kept: split.kept,
        })
    }

    /// Split mode: the noise filter on its own, without article text.
    fn noise_call<A: Borrow<Article>>(
        &self,
        config: &PipelineConfig,
        articles: &[A],
    ) -> Result<Map<String, Value>> {
        let mut raw = Map::new();
        if config.enables(Capability::FilterNoise) {
            let payload = article_payload(articles, ArticleText::Omit)?;
            self.capability_call(Capability::FilterNoise, &payload, &mut raw)?;
        }
        Ok(raw)
    }

    /// Split mode: every other active capability over the kept articles.
    fn capability_calls(
        &self,
        mut raw: Map<String, Value>,
        config: &PipelineConfig,
        kept: &[&Article],
    ) -> Result<Map<String, Value>> {
        let payload = article_payload(kept, ArticleText::Include)?;
        for entry in config.active() {
            if entry.capability != Capability::FilterNoise {
                self.capability_call(entry.capability, &payload, &mut raw)?;
            }
        }
        Ok(raw)
    }

    /// Issue one single-capability call and keep only that capability's field.
    fn capability_call(
        &self,
        capability: Capability,
        payload: &Value,
        raw: &mut Map<String, Value>,
    ) -> Result<()> {
        let entry = descriptor(capability);
        tracing::debug!(capability = %capability, "split-mode call");
        let instruction = compose(&PipelineConfig::only(capability));
        let mut response = self.call(entry.name(), &instruction, payload)?;
        if let Some(value) = response.remove(entry.output_field) {
            raw.insert(entry.output_field.to_string(), value);
        }
        Ok(())
    }

    /// Title and summary for a resolved sub-group, under the leaf configuration.
    fn generate_leaf_story(&self, articles: &[&Article]) -> Result<StoryNode> {
        match self.synthesize(SUB_STORY_STAGE, articles, &PipelineConfig::leaf())? {
            Synthesis::Story { story, .. } => Ok(story),
            Synthesis::Empty | Synthesis::AllNoise(_) => Ok(StoryNode::empty()),
        }
    }

    fn expand_all(&self, groups: &[SubGroup], filtered: &[&Article]) -> Vec<StoryNode> {
        if !self.parallel_expansion || groups.len() < 2 {
            return groups
                .iter()
                .map(|group| self.expand(group, filtered))
                .collect();
        }

        groups
            .par_iter()
            .map(|group| self.expand(group, filtered))
            .collect()
    }

    /// Build one sub-story from a sub-group and the parent's kept articles.
    ///
    /// Ids the parent did not keep are dropped; an empty resolution yields a
    /// theme-only stub without calling the collaborator.
    fn expand(&self, group: &SubGroup, filtered: &[&Article]) -> StoryNode {
        let wanted: BTreeSet<&str> = group.article_ids.iter().map(String::as_str).collect();
        let resolved: Vec<&Article> = filtered
            .iter()
            .copied()
            .filter(|article| wanted.contains(article.id.as_str()))
            .collect();
        if resolved.len() < wanted.len() {
            tracing::debug!(
                theme = %group.theme,
                requested = wanted.len(),
                resolved = resolved.len(),
                "sub-group references articles outside the story"
            );
        }

        let stub = StoryNode {
            title: group.theme.clone(),
            ..StoryNode::empty()
        };
        if resolved.is_empty() {
            return stub;
        }

        let article_ids = unique_ids(resolved.iter().copied());
        match self.generate_leaf_story(&resolved) {
            Ok(leaf) => StoryNode {
                title: if leaf.title.is_empty() {
                    group.theme.clone()
                } else {
                    leaf.title
                },
                summary: leaf.summary,
                article_ids,
                ..StoryNode::empty()
            },
            Err(err) => {
                tracing::warn!(
                    theme = %group.theme,
                    error = %format!("{err:#}"),
                    "sub-story generation failed, keeping theme only"
                );
                StoryNode {
                    article_ids,
                    ..stub
                }
            }
        }
    }
}

/// Whether article records carry the full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArticleText {
    Include,
    Omit,
}

/// Serialize the minimal article records sent with a story request.
fn article_payload<A: Borrow<Article>>(articles: &[A], text: ArticleText) -> Result<Value> {
    let records: Vec<ArticleRecord<'_>> = articles
        .iter()
        .map(Borrow::<Article>::borrow)
        .map(|article| ArticleRecord {
            id: &article.id,
            title: &article.title,
            summary: &article.summary,
            text: (text == ArticleText::Include).then_some(article.text.as_str()),
            source: &article.source,
            published_at: article.published_at.to_rfc3339(),
        })
        .collect();
    serde_json::to_value(records).context("serialize articles for collaborator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            summary: format!("Summary {id}"),
            text: format!("Text {id}"),
            source: "Wire".to_string(),
            published_at: chrono::Utc
                .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[test]
    fn payload_contains_minimal_article_records() {
        let articles = vec![article("a")];
        let payload = article_payload(&articles, ArticleText::Include).expect("payload");
        assert_eq!(
            payload,
            json!([{
                "id": "a",
                "title": "Title a",
                "summary": "Summary a",
                "text": "Text a",
                "source": "Wire",
                "published_at": "2024-05-01T12:00:00+00:00",
            }])
        );
    }

    #[test]
    fn noise_payload_omits_article_text() {
        let articles = vec![article("a")];
        let payload = article_payload(&articles, ArticleText::Omit).expect("payload");
        let record = payload[0].as_object().expect("record");
        assert!(!record.contains_key("text"));
        assert_eq!(record.get("summary"), Some(&json!("Summary a")));
    }

    #[test]
    fn expand_without_resolvable_ids_returns_theme_stub() {
        let pipeline = Pipeline::new(
            |_: &crate::collaborator::CollaboratorRequest<'_>| -> Result<String> {
                panic!("no call expected")
            },
            "m",
        );
        let articles = [article("x")];
        let filtered: Vec<&Article> = articles.iter().collect();
        let group = SubGroup {
            theme: "Unrelated".to_string(),
            article_ids: vec!["missing".to_string()],
        };
        let story = pipeline.expand(&group, &filtered);
        assert_eq!(story.title, "Unrelated");
        assert!(story.summary.is_empty());
        assert!(story.article_ids.is_empty());
    }

    #[test]
    fn leaf_title_falls_back_to_theme() {
        let pipeline = Pipeline::new(
            |_: &crate::collaborator::CollaboratorRequest<'_>| -> Result<String> {
                Ok(r#"{"summary": "Leaf summary"}"#.to_string())
            },
            "m",
        );
        let articles = [article("x"), article("y")];
        let filtered: Vec<&Article> = articles.iter().collect();
        let group = SubGroup {
            theme: "Theme".to_string(),
            article_ids: vec!["y".to_string(), "y".to_string()],
        };
        let story = pipeline.expand(&group, &filtered);
        assert_eq!(story.title, "Theme");
        assert_eq!(story.summary, "Leaf summary");
        assert_eq!(story.article_ids, vec!["y"]);
    }
}
