//! `imgscribe-config`: runtime configuration for imgscribe.
//!
//! Provides:
//! - Typed config schema (input, analyzer, rate limit, output, logging)
//! - YAML loading from `~/.imgscribe/config.yaml` or an explicit path
//! - `${ENV_VAR}` substitution and API key lookup
//! - Default value application
//! - Validation with fatal errors and advisory warnings
//! - Redaction for safe logging

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    api_key_vars, collect_referenced_vars, resolve_api_key, resolve_api_key_with,
    resolve_env_vars, resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config};
pub use redact::redact;
pub use schema::{
    AnalyzerConfig, ImgscribeConfig, InputConfig, LoggingConfig, OutputConfig, RateLimitConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// A config ready to use, plus the advisory warnings validation produced.
#[derive(Debug)]
pub struct PreparedConfig {
    pub config: ImgscribeConfig,
    pub warnings: Vec<ConfigValidationError>,
}

/// Load, substitute env vars, apply defaults, and validate a config file.
///
/// Any validation error fails the load. Warnings are returned so the caller
/// can log them once logging is set up.
pub async fn load_and_prepare(path: &Path) -> Result<PreparedConfig> {
    let raw_config = load_config(path).await?;

    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let config: ImgscribeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    if !report.is_valid() {
        let messages: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
        bail!("Invalid config {}:\n  {}", path.display(), messages.join("\n  "));
    }

    Ok(PreparedConfig { config, warnings: report.warnings })
}

/// The effective config as JSON with secrets masked.
pub fn redacted_view(config: &ImgscribeConfig) -> Value {
    serde_json::to_value(config).map(|v| redact(&v)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepares_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "analyzer:\n  provider: gemini\nrateLimit:\n  maxConcurrent: 5\n").unwrap();

        let prepared = load_and_prepare(&path).await.unwrap();
        assert!(prepared.warnings.is_empty());
        let cfg = prepared.config;
        assert_eq!(cfg.analyzer.as_ref().unwrap().provider.as_deref(), Some("gemini"));
        let rate = cfg.rate_limit.unwrap();
        assert_eq!(rate.max_concurrent, Some(5));
        assert_eq!(rate.min_interval_ms, Some(defaults::DEFAULT_MIN_INTERVAL_MS));
    }

    #[tokio::test]
    async fn validation_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "input:\n  sequencing: shuffle\n").unwrap();

        let err = load_and_prepare(&path).await.unwrap_err().to_string();
        assert!(err.contains("input.sequencing"), "{err}");
    }

    #[tokio::test]
    async fn warnings_are_returned_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rateLimit:\n  callTimeoutSecs: 0\n").unwrap();

        let prepared = load_and_prepare(&path).await.unwrap();
        let paths: Vec<&str> = prepared.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, ["rateLimit.callTimeoutSecs"]);
        assert_eq!(prepared.config.rate_limit.unwrap().call_timeout_secs, Some(0));
    }

    #[test]
    fn redacted_view_hides_key() {
        let cfg = ImgscribeConfig {
            analyzer: Some(AnalyzerConfig {
                api_key: Some("sk-live-0123456789abcdef".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let view = redacted_view(&cfg);
        assert_eq!(view["analyzer"]["apiKey"], "sk-l***");
    }
}
