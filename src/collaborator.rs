//! The text-generation collaborator boundary.
//!
//! A collaborator receives `(model, system instruction, JSON payload)` and
//! returns raw text that should hold a JSON object. Two backends are
//! provided: a local command that reads the prompt on stdin and writes the
//! response on stdout, and an OpenAI-compatible chat completions endpoint.
//! Timeouts and retries belong to the backend; the pipeline treats one call
//! as an atomic request/response unit and never retries.
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Bytes of response text kept in a `MalformedResponse` preview.
const PREVIEW_BYTES: usize = 500;

/// One request to the collaborator.
#[derive(Debug, Clone, Copy)]
pub struct CollaboratorRequest<'a> {
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub user_payload: &'a Value,
}

/// Anything that can answer a collaborator request with raw text.
///
/// Implementations must be shareable across threads because sibling
/// sub-stories may be expanded concurrently.
pub trait Collaborator: Sync {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String>;
}

impl<F> Collaborator for F
where
    F: Fn(&CollaboratorRequest<'_>) -> Result<String> + Sync,
{
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String> {
        self(request)
    }
}

/// The collaborator's text could not be read as a JSON object.
#[derive(Debug, thiserror::Error)]
#[error("{stage}: collaborator response is not a JSON object ({reason}); response starts with: {preview}")]
pub struct MalformedResponse {
    pub stage: &'static str,
    pub reason: String,
    pub preview: String,
}

/// Parse response text into a JSON object, tolerating surrounding code fences.
pub fn parse_object(stage: &'static str, text: &str) -> Result<Map<String, Value>, MalformedResponse> {
    let cleaned = strip_code_fences(text);
    let malformed = |reason: String| MalformedResponse {
        stage,
        reason,
        preview: truncate(text, PREVIEW_BYTES),
    };
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(malformed(format!("got {}", json_kind(&other)))),
        Err(err) => Err(malformed(err.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|first| first.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|last| last.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Issue one call and parse the answer as a JSON object.
pub(crate) fn call_json(
    collaborator: &dyn Collaborator,
    stage: &'static str,
    model: &str,
    instruction: &str,
    payload: &Value,
) -> Result<Map<String, Value>> {
    let start = Instant::now();
    let request = CollaboratorRequest {
        model,
        system_instruction: instruction,
        user_payload: payload,
    };
    let text = collaborator
        .complete(&request)
        .with_context(|| format!("{stage}: collaborator call failed"))?;
    tracing::info!(
        stage,
        model,
        elapsed_ms = start.elapsed().as_millis() as u64,
        instruction_bytes = instruction.len(),
        response_bytes = text.len(),
        "collaborator call complete"
    );
    Ok(parse_object(stage, &text)?)
}

/// Render a request as a single text prompt for command backends.
pub fn render_prompt(request: &CollaboratorRequest<'_>) -> Result<String> {
    let payload =
        serde_json::to_string_pretty(request.user_payload).context("serialize collaborator payload")?;
    Ok(format!(
        "{}\n\n# Input\n\n{}\n\nRespond with a single JSON object only. No prose or code fences.\n",
        request.system_instruction.trim_end(),
        payload
    ))
}

/// Collaborator backed by a local command (prompt on stdin, JSON on stdout).
///
/// The command line is split with shell rules; a `{model}` argument is
/// replaced with the request's model identifier.
#[derive(Debug, Clone)]
pub struct CommandCollaborator {
    argv: Vec<String>,
}

impl CommandCollaborator {
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv })
    }

    fn resolved_argv(&self, model: &str) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.replace("{model}", model))
            .collect()
    }
}

impl Collaborator for CommandCollaborator {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String> {
        let prompt = render_prompt(request)?;
        let argv = self.resolved_argv(request.model);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("LM command is empty"))?;

        let start = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {program}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write prompt to LM stdin")?;
        }

        let output = child.wait_with_output().context("wait for LM command")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command exited"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

/// Collaborator backed by an OpenAI-compatible chat completions endpoint.
pub struct HttpCollaborator {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpCollaborator {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Collaborator for HttpCollaborator {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String> {
        let user = serde_json::to_string(request.user_payload).context("serialize collaborator payload")?;
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .with_context(|| format!("POST {}", self.endpoint))?;
        let completion: Value = response
            .body_mut()
            .read_json()
            .context("parse chat completion JSON")?;

        completion
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("chat completion has no choices[0].message.content"))
    }
}

impl std::fmt::Debug for HttpCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCollaborator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_accepts_plain_and_fenced_json() {
        let plain = parse_object("story", r#"{"title": "Test Event"}"#).expect("plain object");
        assert_eq!(plain.get("title"), Some(&json!("Test Event")));

        let fenced = "```json\n{\"title\": \"Fenced\"}\n```";
        let parsed = parse_object("story", fenced).expect("fenced object");
        assert_eq!(parsed.get("title"), Some(&json!("Fenced")));
    }

    #[test]
    fn parse_object_rejects_non_objects() {
        let err = parse_object("classify", "[1, 2, 3]").expect_err("array rejected");
        assert_eq!(err.stage, "classify");
        assert!(err.reason.contains("an array"));

        let err = parse_object("story", "not json at all").expect_err("text rejected");
        assert!(err.to_string().starts_with("story: collaborator response is not a JSON object"));
    }

    #[test]
    fn malformed_preview_is_truncated_on_char_boundary() {
        let text = "é".repeat(400);
        let err = parse_object("story", &text).expect_err("not json");
        assert!(err.preview.len() <= PREVIEW_BYTES);
        assert!(err.preview.chars().all(|ch| ch == 'é'));
    }

    #[test]
    fn command_collaborator_substitutes_model() {
        let command = CommandCollaborator::new("llm --model {model} -s 'be brief'").expect("parse");
        assert_eq!(
            command.resolved_argv("gpt-4o-mini"),
            vec!["llm", "--model", "gpt-4o-mini", "-s", "be brief"]
        );
    }

    #[test]
    fn command_collaborator_rejects_empty_command() {
        assert!(CommandCollaborator::new("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_collaborator_round_trips_through_stdin() {
        let command = CommandCollaborator::new(
            r#"sh -c "cat >/dev/null; printf '%s' '{\"title\":\"From Shell\"}'""#,
        )
        .expect("parse");
        let payload = json!([{"id": "a"}]);
        let request = CollaboratorRequest {
            model: "m",
            system_instruction: "instruction",
            user_payload: &payload,
        };
        let text = command.complete(&request).expect("command output");
        let parsed = parse_object("story", &text).expect("json object");
        assert_eq!(parsed.get("title"), Some(&json!("From Shell")));
    }

    #[cfg(unix)]
    #[test]
    fn command_collaborator_reports_failure_status() {
        let command = CommandCollaborator::new("sh -c 'cat >/dev/null; echo boom >&2; exit 3'").expect("parse");
        let payload = json!([]);
        let request = CollaboratorRequest {
            model: "m",
            system_instruction: "instruction",
            user_payload: &payload,
        };
        let err = command.complete(&request).expect_err("non-zero exit");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn render_prompt_places_payload_after_instruction() {
        let payload = json!([{"id": "a"}]);
        let request = CollaboratorRequest {
            model: "m",
            system_instruction: "Do the thing.\n",
            user_payload: &payload,
        };
        let prompt = render_prompt(&request).expect("render");
        assert!(prompt.starts_with("Do the thing.\n\n# Input\n\n"));
        assert!(prompt.contains("\"id\": \"a\""));
    }

    #[test]
    fn http_collaborator_builds_endpoint() {
        let http = HttpCollaborator::new("https://api.example.com/v1/", "key", Duration::from_secs(5));
        assert_eq!(http.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
