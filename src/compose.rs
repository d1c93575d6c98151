//! Instruction composition for collaborator calls.
//!
//! An instruction is a preamble, the prompt fragment of every active
//! capability in registry order, and an output-schema section listing the
//! expected fields. Output depends only on the configuration, so composing
//! twice with the same configuration yields identical bytes.
use crate::capability::{CapabilityDescriptor, PipelineConfig};

const PREAMBLE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/preamble.md"));

/// Instruction shown when no capability is active.
pub const EMPTY_SCHEMA: &str = "Return an empty JSON object: {}";

/// One field of the expected JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputField<'a> {
    pub name: &'a str,
    pub output_type: &'a str,
    pub description: &'a str,
    pub example: &'a str,
}

impl From<&CapabilityDescriptor> for OutputField<'static> {
    fn from(descriptor: &CapabilityDescriptor) -> Self {
        Self {
            name: descriptor.output_field,
            output_type: descriptor.output_type,
            description: descriptor.output_description,
            example: descriptor.output_example,
        }
    }
}

/// Build the story instruction for a configuration.
pub fn compose(config: &PipelineConfig) -> String {
    let active: Vec<&CapabilityDescriptor> = config.active().collect();
    let mut sections = Vec::with_capacity(active.len() + 2);
    sections.push(PREAMBLE.trim_end().to_string());
    for descriptor in &active {
        sections.push(descriptor.prompt_fragment.trim_end().to_string());
    }
    let fields: Vec<OutputField<'_>> = active.into_iter().map(OutputField::from).collect();
    sections.push(render_schema(&fields));
    sections.join("\n\n")
}

/// Build a single-task instruction (classification, linking) around one output field.
pub(crate) fn compose_task(task: &str, field: OutputField<'_>) -> String {
    [task.trim_end().to_string(), render_schema(&[field])].join("\n\n")
}

/// Render the expected-output section for the given fields, in order.
pub fn render_schema(fields: &[OutputField<'_>]) -> String {
    if fields.is_empty() {
        return EMPTY_SCHEMA.to_string();
    }

    let mut lines = vec![
        "## Expected Output".to_string(),
        String::new(),
        "Return a JSON object with the following structure:".to_string(),
        "{".to_string(),
    ];
    let entries: Vec<String> = fields
        .iter()
        .map(|field| format!("    \"{}\": ...  // {}", field.name, field.description))
        .collect();
    lines.push(entries.join(",\n"));
    lines.push("}".to_string());
    lines.push(String::new());
    lines.push("Field details:".to_string());
    for field in fields {
        lines.push(format!(
            "- {} ({}): e.g., {}",
            field.name, field.output_type, field.example
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::REGISTRY;

    #[test]
    fn compose_is_deterministic() {
        let config = PipelineConfig::full();
        assert_eq!(compose(&config), compose(&config));
    }

    #[test]
    fn compose_orders_sections_by_registry() {
        let text = compose(&PipelineConfig::full());
        let positions: Vec<usize> = REGISTRY
            .iter()
            .map(|descriptor| {
                let heading = descriptor.prompt_fragment.lines().next().unwrap_or_default();
                text.find(heading).expect("fragment present")
            })
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn compose_includes_only_active_fragments() {
        let config = PipelineConfig {
            generate_title: true,
            ..PipelineConfig::none()
        };
        let text = compose(&config);
        assert!(text.contains("## Generate Title"));
        assert!(!text.contains("## Generate Summary"));
        assert!(!text.contains("## Filter Noise"));
        assert!(text.contains("- title (string): e.g., \"Gaza Humanitarian Crisis\""));
        assert!(!text.contains("\"summary\": ..."));
    }

    #[test]
    fn compose_without_capabilities_requests_empty_object() {
        let text = compose(&PipelineConfig::none());
        assert!(text.starts_with(PREAMBLE.trim_end()));
        assert!(text.ends_with(EMPTY_SCHEMA));
        assert!(!text.contains("## Expected Output"));
    }

    #[test]
    fn schema_lists_fields_in_given_order() {
        let schema = render_schema(&[
            OutputField::from(&REGISTRY[2]),
            OutputField::from(&REGISTRY[3]),
        ]);
        let title = schema.find("\"title\": ...").expect("title entry");
        let summary = schema.find("\"summary\": ...").expect("summary entry");
        assert!(title < summary);
        assert!(schema.contains("\"title\": ...  // Short neutral event label (2-6 words),\n"));
    }

    #[test]
    fn leaf_instruction_requests_title_and_summary_only() {
        let text = compose(&PipelineConfig::leaf());
        assert!(text.contains("- title (string)"));
        assert!(text.contains("- summary (string)"));
        assert!(!text.contains("subgroups"));
        assert!(!text.contains("noise_article_ids"));
    }
}
