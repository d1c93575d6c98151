//! Capability registry and pipeline configuration.
//!
//! The registry is a fixed, ordered list of descriptors. Its order decides
//! both the order of prompt sections and the order of the output schema, so
//! composing and decoding only ever walk `REGISTRY` front to back. Each
//! descriptor carries its own default and decoder; there is no parallel
//! lookup table keyed by field name.
use crate::model::{Location, Quote, SubGroup};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FILTER_NOISE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/filter_noise.md"
));
const GROUP_ARTICLES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/group_articles.md"
));
const GENERATE_TITLE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/generate_title.md"
));
const GENERATE_SUMMARY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/generate_summary.md"
));
const GENERATE_KEY_POINTS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/generate_key_points.md"
));
const EXTRACT_QUOTES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/extract_quotes.md"
));
const RESOLVE_LOCATION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/resolve_location.md"
));

/// One independently toggleable pipeline behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    FilterNoise,
    GroupArticles,
    GenerateTitle,
    GenerateSummary,
    GenerateKeyPoints,
    ExtractQuotes,
    ResolveLocation,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Self::FilterNoise => "filter_noise",
            Self::GroupArticles => "group_articles",
            Self::GenerateTitle => "generate_title",
            Self::GenerateSummary => "generate_summary",
            Self::GenerateKeyPoints => "generate_key_points",
            Self::ExtractQuotes => "extract_quotes",
            Self::ResolveLocation => "resolve_location",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value for one capability's output field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Strings(Vec<String>),
    SubGroups(Vec<SubGroup>),
    Quotes(Vec<Quote>),
    Location(Option<Location>),
}

/// Static description of a capability: prompt fragment, output field, and
/// the default substituted whenever the field is disabled or unusable.
pub struct CapabilityDescriptor {
    pub capability: Capability,
    pub prompt_fragment: &'static str,
    pub output_field: &'static str,
    pub output_type: &'static str,
    pub output_description: &'static str,
    pub output_example: &'static str,
    default_value: fn() -> FieldValue,
    decode_value: fn(&Value) -> Option<FieldValue>,
}

impl CapabilityDescriptor {
    pub fn name(&self) -> &'static str {
        self.capability.name()
    }

    pub fn default_value(&self) -> FieldValue {
        (self.default_value)()
    }

    /// Read this descriptor's field from an untrusted response object.
    ///
    /// Absent or mis-shaped values resolve to the bound default.
    pub fn decode(&self, raw: &Map<String, Value>) -> FieldValue {
        match raw.get(self.output_field).and_then(self.decode_value) {
            Some(value) => value,
            None => {
                tracing::debug!(
                    field = self.output_field,
                    present = raw.contains_key(self.output_field),
                    "response field unusable, using default"
                );
                self.default_value()
            }
        }
    }
}

impl std::fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("capability", &self.capability)
            .field("output_field", &self.output_field)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

/// Every capability in prompt order.
pub static REGISTRY: [CapabilityDescriptor; 7] = [
    CapabilityDescriptor {
        capability: Capability::FilterNoise,
        prompt_fragment: FILTER_NOISE,
        output_field: "noise_article_ids",
        output_type: "array of strings",
        output_description: "Array of article IDs to filter out as noise",
        output_example: r#"["article-id-1", "article-id-2"]"#,
        default_value: empty_strings,
        decode_value: decode_strings,
    },
    CapabilityDescriptor {
        capability: Capability::GroupArticles,
        prompt_fragment: GROUP_ARTICLES,
        output_field: "subgroups",
        output_type: "array of objects",
        output_description: "Array of sub-group objects, each with 'theme' (string) and 'article_ids' (array of strings). Empty array if no sub-grouping is needed.",
        output_example: r#"[{"theme": "Hospital strike in northern region", "article_ids": ["id1", "id2"]}]"#,
        default_value: empty_subgroups,
        decode_value: decode_subgroups,
    },
    CapabilityDescriptor {
        capability: Capability::GenerateTitle,
        prompt_fragment: GENERATE_TITLE,
        output_field: "title",
        output_type: "string",
        output_description: "Short neutral event label (2-6 words)",
        output_example: r#""Gaza Humanitarian Crisis""#,
        default_value: empty_text,
        decode_value: decode_text,
    },
    CapabilityDescriptor {
        capability: Capability::GenerateSummary,
        prompt_fragment: GENERATE_SUMMARY,
        output_field: "summary",
        output_type: "string",
        output_description: "Condensed single-paragraph summary (150-200 words)",
        output_example: r#""Summary text here...""#,
        default_value: empty_text,
        decode_value: decode_text,
    },
    CapabilityDescriptor {
        capability: Capability::GenerateKeyPoints,
        prompt_fragment: GENERATE_KEY_POINTS,
        output_field: "key_points",
        output_type: "array of strings",
        output_description: "Array of 3-6 key point sentences",
        output_example: r#"["Key point 1.", "Key point 2.", "Key point 3."]"#,
        default_value: empty_strings,
        decode_value: decode_strings,
    },
    CapabilityDescriptor {
        capability: Capability::ExtractQuotes,
        prompt_fragment: EXTRACT_QUOTES,
        output_field: "quotes",
        output_type: "array of objects",
        output_description: "Array of quote objects with text, speaker_name, speaker_title, speaker_org, speaker_nation, article_id",
        output_example: r#"[{"text": "Quote here", "speaker_name": "John Smith", "speaker_title": "Director", "speaker_org": "FBI", "speaker_nation": "USA", "article_id": "article-1"}]"#,
        default_value: empty_quotes,
        decode_value: decode_quotes,
    },
    CapabilityDescriptor {
        capability: Capability::ResolveLocation,
        prompt_fragment: RESOLVE_LOCATION,
        output_field: "location",
        output_type: "object",
        output_description: "Object with country (ISO3), region, and city fields (null if unknown)",
        output_example: r#"{"country": "USA", "region": "California", "city": "Los Angeles"}"#,
        default_value: no_location,
        decode_value: decode_location,
    },
];

/// Look up the descriptor for a capability.
pub fn descriptor(capability: Capability) -> &'static CapabilityDescriptor {
    match capability {
        Capability::FilterNoise => &REGISTRY[0],
        Capability::GroupArticles => &REGISTRY[1],
        Capability::GenerateTitle => &REGISTRY[2],
        Capability::GenerateSummary => &REGISTRY[3],
        Capability::GenerateKeyPoints => &REGISTRY[4],
        Capability::ExtractQuotes => &REGISTRY[5],
        Capability::ResolveLocation => &REGISTRY[6],
    }
}

/// Switches selecting which capabilities run for one invocation.
///
/// All combinations are legal. `generate_substories` has no descriptor of its
/// own: it only controls whether sub-groups returned under `group_articles`
/// are expanded into child stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub filter_noise: bool,
    pub group_articles: bool,
    pub generate_title: bool,
    pub generate_summary: bool,
    pub generate_key_points: bool,
    pub extract_quotes: bool,
    pub resolve_location: bool,
    pub generate_substories: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl PipelineConfig {
    /// Every capability and sub-story expansion enabled.
    pub const fn full() -> Self {
        Self {
            filter_noise: true,
            group_articles: true,
            generate_title: true,
            generate_summary: true,
            generate_key_points: true,
            extract_quotes: true,
            resolve_location: true,
            generate_substories: true,
        }
    }

    /// Every switch off. Useful as a base for struct-update syntax.
    pub const fn none() -> Self {
        Self {
            filter_noise: false,
            group_articles: false,
            generate_title: false,
            generate_summary: false,
            generate_key_points: false,
            extract_quotes: false,
            resolve_location: false,
            generate_substories: false,
        }
    }

    /// Fixed configuration for sub-story runs: title and summary only.
    pub const fn leaf() -> Self {
        Self {
            generate_title: true,
            generate_summary: true,
            ..Self::none()
        }
    }

    /// A single capability on its own, for one call of a split-call run.
    pub fn only(capability: Capability) -> Self {
        let mut config = Self::none();
        *config.switch_mut(capability) = true;
        config
    }

    fn switch_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::FilterNoise => &mut self.filter_noise,
            Capability::GroupArticles => &mut self.group_articles,
            Capability::GenerateTitle => &mut self.generate_title,
            Capability::GenerateSummary => &mut self.generate_summary,
            Capability::GenerateKeyPoints => &mut self.generate_key_points,
            Capability::ExtractQuotes => &mut self.extract_quotes,
            Capability::ResolveLocation => &mut self.resolve_location,
        }
    }

    pub fn enables(&self, capability: Capability) -> bool {
        match capability {
            Capability::FilterNoise => self.filter_noise,
            Capability::GroupArticles => self.group_articles,
            Capability::GenerateTitle => self.generate_title,
            Capability::GenerateSummary => self.generate_summary,
            Capability::GenerateKeyPoints => self.generate_key_points,
            Capability::ExtractQuotes => self.extract_quotes,
            Capability::ResolveLocation => self.resolve_location,
        }
    }

    /// Active descriptors in registry order.
    pub fn active(&self) -> impl Iterator<Item = &'static CapabilityDescriptor> + '_ {
        REGISTRY
            .iter()
            .filter(move |descriptor| self.enables(descriptor.capability))
    }
}

fn empty_text() -> FieldValue {
    FieldValue::Text(String::new())
}

fn empty_strings() -> FieldValue {
    FieldValue::Strings(Vec::new())
}

fn empty_subgroups() -> FieldValue {
    FieldValue::SubGroups(Vec::new())
}

fn empty_quotes() -> FieldValue {
    FieldValue::Quotes(Vec::new())
}

fn no_location() -> FieldValue {
    FieldValue::Location(None)
}

fn decode_text(value: &Value) -> Option<FieldValue> {
    value.as_str().map(|text| FieldValue::Text(text.to_string()))
}

fn decode_strings(value: &Value) -> Option<FieldValue> {
    Some(FieldValue::Strings(string_items(value)?))
}

fn decode_subgroups(value: &Value) -> Option<FieldValue> {
    let groups = value
        .as_array()?
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let article_ids = string_items(object.get("article_ids")?)?;
            let theme = object
                .get("theme")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(SubGroup { theme, article_ids })
        })
        .collect();
    Some(FieldValue::SubGroups(groups))
}

fn decode_quotes(value: &Value) -> Option<FieldValue> {
    let quotes = value
        .as_array()?
        .iter()
        .filter_map(|item| serde_json::from_value::<Quote>(item.clone()).ok())
        .collect();
    Some(FieldValue::Quotes(quotes))
}

fn decode_location(value: &Value) -> Option<FieldValue> {
    if !value.is_object() {
        return None;
    }
    let location = serde_json::from_value::<Location>(value.clone()).ok()?;
    Some(FieldValue::Location(Some(location)))
}

/// String elements of a JSON array; non-string elements are skipped.
pub(crate) fn string_items(value: &Value) -> Option<Vec<String>> {
    let items = value
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    Some(items)
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
