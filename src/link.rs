//! Cross-group linking of stories that describe the same real-world event.
use crate::classify::story_records;
use crate::collaborator::Collaborator;
use crate::compose::{compose_task, OutputField};
use crate::model::{StoryLink, StoryNode};
use crate::story::Pipeline;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

const LINK_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/link_stories.md"
));

const LINK_STAGE: &str = "link";

const LINKS_FIELD: OutputField<'static> = OutputField {
    name: "links",
    output_type: "array of objects",
    description: "Array of link objects, each containing the index of a story in group_a and the index of a matching story in group_b",
    example: r#"[{"group_a_index": 0, "group_b_index": 2}, {"group_a_index": 1, "group_b_index": 0}]"#,
};

pub fn link_instruction() -> String {
    compose_task(LINK_TASK, LINKS_FIELD)
}

/// Read `links` as returned. Entries without two non-negative integer
/// indices are skipped; nothing is deduplicated or range-checked.
pub fn parse_links(raw: &Map<String, Value>) -> Vec<StoryLink> {
    let Some(entries) = raw.get(LINKS_FIELD.name).and_then(Value::as_array) else {
        tracing::debug!("response has no links array");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<StoryLink>(entry.clone()).ok())
        .collect()
}

impl<C: Collaborator> Pipeline<C> {
    /// Match stories across two independently produced groups.
    ///
    /// The relation is many-to-many and decided entirely by the collaborator.
    pub fn link(&self, group_a: &[StoryNode], group_b: &[StoryNode]) -> Result<Vec<StoryLink>> {
        if group_a.is_empty() || group_b.is_empty() {
            return Ok(Vec::new());
        }

        let payload = json!({
            "group_a": serde_json::to_value(story_records(group_a)).context("serialize group_a")?,
            "group_b": serde_json::to_value(story_records(group_b)).context("serialize group_b")?,
        });
        let raw = self.call(LINK_STAGE, &link_instruction(), &payload)?;
        let links = parse_links(&raw);
        tracing::info!(
            group_a = group_a.len(),
            group_b = group_b.len(),
            links = links.len(),
            "stories linked"
        );
        Ok(links)
    }
}
