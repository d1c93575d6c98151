//! Result envelopes written by the CLI.
//!
//! Each envelope records what was processed, which model produced it, and
//! when, alongside the stage's result.
use crate::model::{ClassifiedStory, StoryLink, StoryNode};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEnvelope {
    pub cluster_name: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub story: StoryNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyEnvelope {
    pub cluster_name: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub classified_stories: Vec<ClassifiedStory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEnvelope {
    pub cluster_names: [String; 2],
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub links: Vec<StoryLink>,
}

/// Write a value as pretty JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize output JSON")?;
    bytes.push(b'\n');
    fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write a value as pretty JSON to `path`, or to stdout when no path is given.
pub fn emit_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            write_json(path, value)?;
            tracing::info!(path = %path.display(), "output written");
            Ok(())
        }
        None => {
            let text = serde_json::to_string_pretty(value).context("serialize output JSON")?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}").context("write output to stdout")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_envelope_uses_documented_keys() {
        let envelope = StoryEnvelope {
            cluster_name: "harbor_fire".to_string(),
            model: "gpt-4o".to_string(),
            generated_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            story: StoryNode::empty(),
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        let object = value.as_object().expect("object");
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["cluster_name", "model", "generated_at", "story"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["generated_at"], "2024-05-01T12:00:00Z");
        assert_eq!(object["story"]["location"], serde_json::Value::Null);
    }

    #[test]
    fn write_json_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("out/links.json");
        let envelope = LinkEnvelope {
            cluster_names: ["a".to_string(), "b".to_string()],
            model: "m".to_string(),
            generated_at: Utc::now(),
            links: vec![StoryLink {
                group_a_index: 0,
                group_b_index: 1,
            }],
        };
        write_json(&path, &envelope).expect("write envelope");
        let text = std::fs::read_to_string(&path).expect("read back");
        let parsed: LinkEnvelope = serde_json::from_str(&text).expect("parse back");
        assert_eq!(parsed.links, envelope.links);
        assert_eq!(parsed.cluster_names, envelope.cluster_names);
    }
}
