//! Configuration loading: pipeline switches from JSON files and collaborator
//! settings from flags and the environment.
//!
//! Collaborator settings are resolved in priority order: CLI flag, then
//! environment variable, then built-in default.
use crate::capability::PipelineConfig;
use crate::collaborator::{
    Collaborator, CollaboratorRequest, CommandCollaborator, HttpCollaborator,
};
use crate::story::DEFAULT_MODEL;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const MODEL_ENV: &str = "STORYLINE_MODEL";
pub const LM_COMMAND_ENV: &str = "STORYLINE_LM_COMMAND";
pub const API_BASE_ENV: &str = "STORYLINE_API_BASE";
pub const API_KEY_ENV: &str = "STORYLINE_API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const TIMEOUT_ENV: &str = "STORYLINE_TIMEOUT_SECS";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Load pipeline switches from a JSON file. Omitted keys keep their default.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path).with_context(|| format!("read pipeline config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse pipeline config {}", path.display()))?;
    Ok(config)
}

/// Persist pipeline switches in a stable JSON format.
pub fn write_pipeline_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize pipeline config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Describe switch combinations that turn a stage into a no-op.
///
/// Every combination is legal; these are hints, never errors.
pub fn validate_config(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.generate_substories && !config.group_articles {
        warnings.push(
            "generate_substories is enabled but group_articles is not; no sub-stories will be produced"
                .to_string(),
        );
    }
    if config.group_articles && !config.generate_substories {
        warnings.push(
            "group_articles is enabled but generate_substories is not; sub-groups will be discarded"
                .to_string(),
        );
    }
    if config.active().next().is_none() {
        warnings.push("no capability is enabled; stories will only carry article ids".to_string());
    }
    warnings
}

/// Where collaborator calls go.
#[derive(Debug)]
pub enum Backend {
    Command(CommandCollaborator),
    Http(HttpCollaborator),
}

impl Collaborator for Backend {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> Result<String> {
        match self {
            Self::Command(command) => command.complete(request),
            Self::Http(http) => http.complete(request),
        }
    }
}

/// Collaborator settings after flag/env/default resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorSettings {
    pub model: String,
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    Command {
        command: String,
    },
    Http {
        api_base: String,
        api_key: String,
        timeout: Duration,
    },
}

impl CollaboratorSettings {
    /// Resolve settings from optional CLI flags and the process environment.
    pub fn resolve(model: Option<&str>, lm_command: Option<&str>) -> Result<Self> {
        Self::resolve_with(model, lm_command, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit environment lookup.
    pub fn resolve_with(
        model: Option<&str>,
        lm_command: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

        let model = model
            .map(str::to_string)
            .or_else(|| non_empty(env(MODEL_ENV)))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let command = lm_command
            .map(str::to_string)
            .or_else(|| non_empty(env(LM_COMMAND_ENV)));
        if let Some(command) = command {
            return Ok(Self {
                model,
                backend: BackendSettings::Command { command },
            });
        }

        let api_base =
            non_empty(env(API_BASE_ENV)).unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_key = non_empty(env(API_KEY_ENV))
            .or_else(|| non_empty(env(FALLBACK_API_KEY_ENV)))
            .ok_or_else(|| {
                anyhow!(
                    "no collaborator configured: pass --lm, set {LM_COMMAND_ENV}, or set {API_KEY_ENV} (or {FALLBACK_API_KEY_ENV})"
                )
            })?;
        let timeout_secs = match non_empty(env(TIMEOUT_ENV)) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("parse {TIMEOUT_ENV}={raw:?}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            model,
            backend: BackendSettings::Http {
                api_base,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn build_backend(&self) -> Result<Backend> {
        match &self.backend {
            BackendSettings::Command { command } => {
                Ok(Backend::Command(CommandCollaborator::new(command)?))
            }
            BackendSettings::Http {
                api_base,
                api_key,
                timeout,
            } => Ok(Backend::Http(HttpCollaborator::new(api_base, api_key, *timeout))),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
