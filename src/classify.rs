//! Topic classification of already-built stories.
use crate::capability::string_items;
use crate::collaborator::Collaborator;
use crate::compose::{compose_task, OutputField};
use crate::model::{Classification, ClassifiedStory, StoryNode};
use crate::story::Pipeline;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const CLASSIFY_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/classify_stories.md"
));

const CLASSIFY_STAGE: &str = "classify";

const CLASSIFICATIONS_FIELD: OutputField<'static> = OutputField {
    name: "classifications",
    output_type: "array of objects",
    description: "Array of classification objects, one per story, each containing the story index and assigned topics",
    example: r#"[{"story_index": 0, "topics": ["Politics", "Conflict & Security"]}, {"story_index": 1, "topics": ["Technology", "Business"]}]"#,
};

/// The closed topic vocabulary offered to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Politics,
    ConflictAndSecurity,
    Crime,
    Business,
    Economy,
    Technology,
    Health,
    Environment,
    Society,
    Sports,
    Entertainment,
}

impl Topic {
    pub const ALL: [Topic; 11] = [
        Topic::Politics,
        Topic::ConflictAndSecurity,
        Topic::Crime,
        Topic::Business,
        Topic::Economy,
        Topic::Technology,
        Topic::Health,
        Topic::Environment,
        Topic::Society,
        Topic::Sports,
        Topic::Entertainment,
    ];

    /// Exact label the collaborator is asked to use.
    pub fn label(self) -> &'static str {
        match self {
            Self::Politics => "Politics",
            Self::ConflictAndSecurity => "Conflict & Security",
            Self::Crime => "Crime",
            Self::Business => "Business",
            Self::Economy => "Economy",
            Self::Technology => "Technology",
            Self::Health => "Health",
            Self::Environment => "Environment",
            Self::Society => "Society",
            Self::Sports => "Sports",
            Self::Entertainment => "Entertainment",
        }
    }

    pub fn scope(self) -> &'static str {
        match self {
            Self::Politics => "elections, government, policy, diplomacy",
            Self::ConflictAndSecurity => "wars, terrorism, military, defense",
            Self::Crime => "crime, policing, public safety, corruption, criminal trials",
            Self::Business => "companies, markets, earnings, trade",
            Self::Economy => "inflation, jobs, GDP, interest rates, public finance",
            Self::Technology => "AI, software, hardware, cybersecurity, space, research",
            Self::Health => "public health, outbreaks, healthcare systems",
            Self::Environment => "climate, energy, disasters, conservation",
            Self::Society => "culture, education, demographics, social issues",
            Self::Sports => "all competitive sport",
            Self::Entertainment => "film, TV, music, celebrities",
        }
    }

    /// Match a label exactly (labels are case-sensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.label() == label)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How returned topic strings are checked against the vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopicPolicy {
    /// Keep whatever the collaborator returned.
    #[default]
    Permissive,
    /// Drop topics that are not vocabulary labels.
    Strict,
}

/// Story fields sent for classification and linking.
#[derive(Serialize)]
pub(crate) struct StoryRecord<'a> {
    index: usize,
    title: &'a str,
    summary: &'a str,
    key_points: &'a [String],
}

pub(crate) fn story_records(stories: &[StoryNode]) -> Vec<StoryRecord<'_>> {
    stories
        .iter()
        .enumerate()
        .map(|(index, story)| StoryRecord {
            index,
            title: &story.title,
            summary: &story.summary,
            key_points: &story.key_points,
        })
        .collect()
}

/// Full classification instruction, including the rendered vocabulary.
pub fn classify_instruction() -> String {
    let topics = Topic::ALL
        .iter()
        .map(|topic| format!("- **{}** - {}", topic.label(), topic.scope()))
        .collect::<Vec<_>>()
        .join("\n");
    compose_task(&CLASSIFY_TASK.replace("{topics}", &topics), CLASSIFICATIONS_FIELD)
}

/// Read `classifications` into a story-index → topics map.
///
/// Entries without an integer index or a topics array are skipped, as are
/// non-string topics; a repeated index keeps its last entry.
pub fn parse_classifications(raw: &Map<String, Value>) -> BTreeMap<usize, Vec<String>> {
    let Some(entries) = raw.get(CLASSIFICATIONS_FIELD.name).and_then(Value::as_array) else {
        tracing::debug!("response has no classifications array");
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(classification)
        .map(|entry| (entry.story_index, entry.topics))
        .collect()
}

fn classification(entry: &Value) -> Option<Classification> {
    let story_index = usize::try_from(entry.get("story_index")?.as_u64()?).ok()?;
    let topics = string_items(entry.get("topics")?)?;
    Some(Classification { story_index, topics })
}

fn apply_policy(topics: Vec<String>, policy: TopicPolicy) -> Vec<String> {
    match policy {
        TopicPolicy::Permissive => topics,
        TopicPolicy::Strict => topics
            .into_iter()
            .filter(|topic| {
                let known = Topic::from_label(topic).is_some();
                if !known {
                    tracing::warn!(topic = %topic, "dropping topic outside the vocabulary");
                }
                known
            })
            .collect(),
    }
}

impl<C: Collaborator> Pipeline<C> {
    /// Attach topics to each story with one collaborator call.
    ///
    /// Output has the input's order and length; a story the collaborator did
    /// not classify gets no topics.
    pub fn classify(&self, stories: &[StoryNode], policy: TopicPolicy) -> Result<Vec<ClassifiedStory>> {
        if stories.is_empty() {
            return Ok(Vec::new());
        }

        let payload = serde_json::to_value(story_records(stories))
            .context("serialize stories for classification")?;
        let raw = self.call(CLASSIFY_STAGE, &classify_instruction(), &payload)?;
        let mut classifications = parse_classifications(&raw);

        let classified: Vec<ClassifiedStory> = stories
            .iter()
            .enumerate()
            .map(|(index, story)| ClassifiedStory {
                story: story.clone(),
                topics: apply_policy(classifications.remove(&index).unwrap_or_default(), policy),
            })
            .collect();
        if !classifications.is_empty() {
            tracing::warn!(
                ignored = classifications.len(),
                "ignoring classifications for unknown story indices"
            );
        }
        tracing::info!(stories = stories.len(), "stories classified");
        Ok(classified)
    }
}
