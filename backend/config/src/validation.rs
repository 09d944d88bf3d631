//! Config validation with field paths in every message.

use crate::schema::ImgscribeConfig;
use imgscribe_core::SequenceMode;
use thiserror::Error;

pub const KNOWN_PROVIDERS: &[&str] = &["openai", "gemini"];
const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Concurrency above this is allowed but probably trips provider limits.
const HIGH_CONCURRENCY: usize = 100;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

/// Validate the config and return every error and warning found.
pub fn validate(config: &ImgscribeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_input(config, &mut report);
    validate_analyzer(config, &mut report);
    validate_rate_limit(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_input(config: &ImgscribeConfig, report: &mut ValidationReport) {
    let Some(input) = &config.input else { return };
    if let Some(Err(message)) = input.sequencing.as_deref().map(str::parse::<SequenceMode>) {
        report.error("input.sequencing", message);
    }
    if input.images_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
        report.error("input.imagesDir", "imagesDir cannot be empty");
    }
}

fn validate_analyzer(config: &ImgscribeConfig, report: &mut ValidationReport) {
    let Some(analyzer) = &config.analyzer else { return };
    if let Some(provider) = &analyzer.provider {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            report.error(
                "analyzer.provider",
                format!("Unknown provider '{provider}'. Use 'openai' or 'gemini'"),
            );
        }
    }
    if analyzer.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
        report.error("analyzer.prompt", "prompt cannot be empty");
    }
    if analyzer.max_tokens == Some(0) {
        report.error("analyzer.maxTokens", "maxTokens must be >= 1");
    }
    if let Some(placeholder) = &analyzer.placeholder {
        if placeholder.chars().count() != 1 {
            report.error("analyzer.placeholder", "placeholder must be exactly one character");
        }
    }
}

fn validate_rate_limit(config: &ImgscribeConfig, report: &mut ValidationReport) {
    let Some(rate) = &config.rate_limit else { return };
    match rate.max_concurrent {
        Some(0) => report.error("rateLimit.maxConcurrent", "maxConcurrent must be >= 1"),
        Some(n) if n > HIGH_CONCURRENCY => report.warn(
            "rateLimit.maxConcurrent",
            format!("maxConcurrent {n} is likely to hit provider rate limits"),
        ),
        _ => {}
    }
    if rate.call_timeout_secs == Some(0) {
        report.warn("rateLimit.callTimeoutSecs", "Per-call timeout disabled; a hung call stalls the batch");
    }
}

fn validate_logging(config: &ImgscribeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !KNOWN_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.error("logging.level", format!("Unknown log level '{level}'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply_all_defaults;
    use crate::schema::{AnalyzerConfig, InputConfig, RateLimitConfig};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(ImgscribeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_concurrency_is_error() {
        let cfg = ImgscribeConfig {
            rate_limit: Some(RateLimitConfig { max_concurrent: Some(0), ..Default::default() }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "rateLimit.maxConcurrent");
    }

    #[test]
    fn unknown_provider_and_mode_are_errors() {
        let cfg = ImgscribeConfig {
            input: Some(InputConfig { sequencing: Some("shuffle".into()), ..Default::default() }),
            analyzer: Some(AnalyzerConfig {
                provider: Some("claude".into()),
                placeholder: Some("??".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let paths: Vec<_> = validate(&cfg).errors.into_iter().map(|e| e.path).collect();
        assert_eq!(paths, ["input.sequencing", "analyzer.provider", "analyzer.placeholder"]);
    }

    #[test]
    fn sequencing_accepts_what_the_cli_accepts() {
        for mode in ["rename", "In-Memory", "memory", " RENAME "] {
            let cfg = ImgscribeConfig {
                input: Some(InputConfig { sequencing: Some(mode.into()), ..Default::default() }),
                ..Default::default()
            };
            let report = validate(&cfg);
            assert!(report.is_valid(), "{mode}: {:?}", report.errors);
        }
    }

    #[test]
    fn very_high_concurrency_only_warns() {
        let cfg = ImgscribeConfig {
            rate_limit: Some(RateLimitConfig { max_concurrent: Some(500), ..Default::default() }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
