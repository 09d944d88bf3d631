//! Config defaults: fills every unset field of a parsed config.

use std::path::PathBuf;

use crate::schema::{
    AnalyzerConfig, ImgscribeConfig, InputConfig, LoggingConfig, OutputConfig, RateLimitConfig,
};

pub const DEFAULT_IMAGES_DIR: &str = "imagesfolder";
pub const DEFAULT_OUTPUT_FILE: &str = "extractedtext.txt";
pub const DEFAULT_SEQUENCING: &str = "in-memory";
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_PROMPT: &str = "Extract only all the text from this image";
pub const DEFAULT_PLACEHOLDER: &str = "'";

/// Default number of concurrent remote calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Default delay inside each slot before a call starts.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 50;

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
///
/// `analyzer.model` stays unset; the provider picks its own default model.
pub fn apply_all_defaults(config: ImgscribeConfig) -> ImgscribeConfig {
    let config = apply_input_defaults(config);
    let config = apply_analyzer_defaults(config);
    let config = apply_rate_limit_defaults(config);
    let config = apply_output_defaults(config);
    apply_logging_defaults(config)
}

fn apply_input_defaults(mut config: ImgscribeConfig) -> ImgscribeConfig {
    let input = config.input.get_or_insert_with(InputConfig::default);
    input.images_dir.get_or_insert_with(|| PathBuf::from(DEFAULT_IMAGES_DIR));
    input.create_if_missing.get_or_insert(true);
    input.sequencing.get_or_insert_with(|| DEFAULT_SEQUENCING.to_string());
    config
}

fn apply_analyzer_defaults(mut config: ImgscribeConfig) -> ImgscribeConfig {
    let analyzer = config.analyzer.get_or_insert_with(AnalyzerConfig::default);
    analyzer.provider.get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
    analyzer.prompt.get_or_insert_with(|| DEFAULT_PROMPT.to_string());
    analyzer.placeholder.get_or_insert_with(|| DEFAULT_PLACEHOLDER.to_string());
    config
}

fn apply_rate_limit_defaults(mut config: ImgscribeConfig) -> ImgscribeConfig {
    let rate = config.rate_limit.get_or_insert_with(RateLimitConfig::default);
    rate.max_concurrent.get_or_insert(DEFAULT_MAX_CONCURRENT);
    rate.min_interval_ms.get_or_insert(DEFAULT_MIN_INTERVAL_MS);
    rate.call_timeout_secs.get_or_insert(DEFAULT_CALL_TIMEOUT_SECS);
    config
}

fn apply_output_defaults(mut config: ImgscribeConfig) -> ImgscribeConfig {
    let output = config.output.get_or_insert_with(OutputConfig::default);
    output.file.get_or_insert_with(|| PathBuf::from(DEFAULT_OUTPUT_FILE));
    output.clipboard.get_or_insert(true);
    config
}

fn apply_logging_defaults(mut config: ImgscribeConfig) -> ImgscribeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
