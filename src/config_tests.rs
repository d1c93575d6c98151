use super::*;
use std::collections::BTreeMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn load_pipeline_config_fills_omitted_switches_with_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, r#"{"filter_noise": false, "extract_quotes": false}"#)
        .expect("write config");

    let config = load_pipeline_config(&path).expect("load config");
    assert!(!config.filter_noise);
    assert!(!config.extract_quotes);
    assert!(config.group_articles);
    assert!(config.generate_substories);
}

#[test]
fn load_pipeline_config_rejects_unknown_switches() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, r#"{"generate_headline": true}"#).expect("write config");

    let err = load_pipeline_config(&path).expect_err("unknown key rejected");
    assert!(format!("{err:#}").contains("generate_headline"));
}

#[test]
fn pipeline_config_written_then_loaded_is_unchanged() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("nested/pipeline.json");
    let config = PipelineConfig {
        resolve_location: false,
        ..PipelineConfig::full()
    };
    write_pipeline_config(&path, &config).expect("write config");
    assert_eq!(load_pipeline_config(&path).expect("load config"), config);
}

#[test]
fn validate_config_flags_substories_without_grouping() {
    let config = PipelineConfig {
        group_articles: false,
        ..PipelineConfig::full()
    };
    let warnings = validate_config(&config);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("no sub-stories"));
    assert!(validate_config(&PipelineConfig::full()).is_empty());
}

#[test]
fn validate_config_flags_empty_capability_set() {
    let warnings = validate_config(&PipelineConfig::none());
    assert!(warnings.iter().any(|warning| warning.contains("no capability")));
}

#[test]
fn flags_take_priority_over_environment() {
    let env = env_from(&[(MODEL_ENV, "env-model"), (LM_COMMAND_ENV, "env-llm")]);
    let settings =
        CollaboratorSettings::resolve_with(Some("flag-model"), Some("flag-llm"), env).expect("resolve");
    assert_eq!(settings.model, "flag-model");
    assert_eq!(
        settings.backend,
        BackendSettings::Command {
            command: "flag-llm".to_string()
        }
    );
}

#[test]
fn environment_command_selects_command_backend() {
    let env = env_from(&[(LM_COMMAND_ENV, "llm -m {model}"), (API_KEY_ENV, "key")]);
    let settings = CollaboratorSettings::resolve_with(None, None, env).expect("resolve");
    assert_eq!(settings.model, DEFAULT_MODEL);
    assert!(matches!(settings.backend, BackendSettings::Command { .. }));
}

#[test]
fn http_backend_uses_fallback_key_and_defaults() {
    let env = env_from(&[(FALLBACK_API_KEY_ENV, "sk-test")]);
    let settings = CollaboratorSettings::resolve_with(None, None, env).expect("resolve");
    assert_eq!(
        settings.backend,
        BackendSettings::Http {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: "sk-test".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    );
}

#[test]
fn missing_backend_is_a_configuration_error() {
    let env = env_from(&[(API_KEY_ENV, "   ")]);
    let err = CollaboratorSettings::resolve_with(None, None, env).expect_err("no backend");
    assert!(err.to_string().contains("no collaborator configured"));
}

#[test]
fn invalid_timeout_is_rejected() {
    let env = env_from(&[(API_KEY_ENV, "key"), (TIMEOUT_ENV, "soon")]);
    let err = CollaboratorSettings::resolve_with(None, None, env).expect_err("bad timeout");
    assert!(err.to_string().contains(TIMEOUT_ENV));
}
