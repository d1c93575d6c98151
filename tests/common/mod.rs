//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Mutex;
use storyline::compose::compose;
use storyline::{
    Article, Capability, Collaborator, CollaboratorRequest, PipelineConfig, StoryNode,
};

/// One request observed by the mock collaborator.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub instruction: String,
    pub payload: Value,
}

impl RecordedCall {
    /// Whether this call carried the fixed sub-story instruction.
    pub fn is_leaf(&self) -> bool {
        self.instruction == compose(&PipelineConfig::leaf())
    }

    /// Whether this call carried the instruction for one capability alone.
    pub fn is_only(&self, capability: Capability) -> bool {
        self.instruction == compose(&PipelineConfig::only(capability))
    }

    /// Article ids sent with a story request, in payload order.
    pub fn article_ids(&self) -> Vec<String> {
        payload_ids(&self.payload)
    }
}

type Responder = dyn Fn(&CollaboratorRequest<'_>) -> Result<String> + Send + Sync;

/// Mock collaborator that records every request and answers from a closure.
pub struct RecordingCollaborator {
    calls: Mutex<Vec<RecordedCall>>,
    responder: Box<Responder>,
}

impl RecordingCollaborator {
    pub fn new(
        responder: impl Fn(&CollaboratorRequest<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Answer every request with the same JSON value.
    pub fn fixed(response: Value) -> Self {
        let text = response.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Fail the test if the collaborator is ever called.
    pub fn unreachable() -> Self {
        Self::new(|request| panic!("unexpected collaborator call: {:?}", request.user_payload))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

impl Collaborator for RecordingCollaborator {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            model: request.model.to_string(),
            instruction: request.system_instruction.to_string(),
            payload: request.user_payload.clone(),
        });
        (self.responder)(request)
    }
}

/// Ids of the article records in a story request payload.
pub fn payload_ids(payload: &Value) -> Vec<String> {
    payload
        .as_array()
        .map(|records| {
            records
                .iter()
                .filter_map(|record| record.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn article(id: &str) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Headline {id}"),
        summary: format!("Summary of {id}."),
        text: format!("Full text of {id}."),
        source: "Wire Service".to_string(),
        published_at: Utc
            .with_ymd_and_hms(2024, 3, 14, 9, 30, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub fn articles(ids: &[&str]) -> Vec<Article> {
    ids.iter().map(|id| article(id)).collect()
}

pub fn story(title: &str) -> StoryNode {
    StoryNode {
        title: title.to_string(),
        summary: format!("{title} summary."),
        key_points: vec![format!("{title} happened.")],
        ..StoryNode::empty()
    }
}
