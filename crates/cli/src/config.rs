//! Process configuration.
//!
//! Sources are layered lowest to highest: the embedded `config/default.toml`,
//! an optional `quill.toml` in the working directory, an optional file named
//! by `--config` / `QUILL_CONFIG`, then `QUILL_<SECTION>__<KEY>` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use pipeline::{QuillError, RunnerConfig};
use serde::Deserialize;

/// Embedded default configuration (compiled into the binary).
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Which HTTP provider backs the generative capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Anthropic,
}

impl ProviderKind {
    fn default_key_env(self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: ProviderKind,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmSection {
    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite file. Runs are not persisted when unset.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
    /// OTLP gRPC endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub runner: RunnerConfig,
    pub llm: LlmSection,
    pub store: StoreSection,
    pub telemetry: TelemetrySection,
}

impl CliConfig {
    /// # Errors
    ///
    /// [`QuillError::ConfigurationError`] for values no run could use.
    pub fn validate(&self) -> Result<(), QuillError> {
        self.runner.validate()?;
        if self.llm.timeout_secs == 0 {
            return Err(QuillError::ConfigurationError {
                message: "llm.timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Loads and validates configuration from every source.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    load_with_env(explicit, Environment::with_prefix("QUILL"))
}

fn load_with_env(explicit: Option<&Path>, env: Environment) -> Result<CliConfig> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("quill").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config: CliConfig = builder
        .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{GuardrailFailurePolicy, PlannerFailurePolicy};
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Environment::with_prefix("QUILL").source(Some(map))
    }

    #[test]
    fn embedded_defaults_load() {
        let config = load_with_env(None, env(&[])).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Openai);
        assert_eq!(config.llm.key_env(), "OPENAI_API_KEY");
        assert_eq!(config.runner.max_brief_chars, 4000);
        assert!(config.store.database_path.is_none());
        assert!(!config.telemetry.json);
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[runner]
planner_failure = "terminal"
guardrail_failure = "fail_closed"
judge_seed = 7

[runner.global_constraints]
must_avoid = ["layoffs"]

[llm]
provider = "anthropic"
model = "claude-test"

[store]
database_path = "runs.db"
"#
        )
        .unwrap();

        let config = load_with_env(Some(file.path()), env(&[])).unwrap();

        assert_eq!(config.runner.planner_failure, PlannerFailurePolicy::Terminal);
        assert_eq!(config.runner.guardrail_failure, GuardrailFailurePolicy::FailClosed);
        assert_eq!(config.runner.judge_seed, Some(7));
        assert_eq!(config.runner.global_constraints.must_avoid, vec!["layoffs"]);
        assert_eq!(config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(config.llm.key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(config.llm.model.as_deref(), Some("claude-test"));
        assert_eq!(config.store.database_path, Some(PathBuf::from("runs.db")));
    }

    #[test]
    fn environment_overrides_files() {
        let config = load_with_env(
            None,
            env(&[
                ("QUILL_LLM__MAX_RETRIES", "3"),
                ("QUILL_LLM__API_KEY_ENV", "TEAM_KEY"),
                ("QUILL_TELEMETRY__JSON", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.llm.key_env(), "TEAM_KEY");
        assert!(config.telemetry.json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load_with_env(None, env(&[("QUILL_RUNNER__MAX_BRIEF_CHARS", "0")])).unwrap_err();
        assert!(err.to_string().contains("max_brief_chars"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_with_env(Some(Path::new("/nonexistent/quill.toml")), env(&[])).is_err());
    }
}
