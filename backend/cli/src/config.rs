use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use imgscribe_config::{api_key_vars, resolve_api_key_with, ImgscribeConfig};
use imgscribe_logging::LoggerOptions;
use imgscribe_pipeline::{RateLimitPolicy, SequenceMode};
use imgscribe_understanding::VisionProvider;

use crate::Cli;

/// Effective settings for one run: CLI flag > config file > default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub images_dir: PathBuf,
    pub create_if_missing: bool,
    pub sequencing: SequenceMode,
    pub provider: VisionProvider,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub placeholder: char,
    pub rate_limit: RateLimitPolicy,
    /// `None` when disabled.
    pub call_timeout: Option<Duration>,
    pub output_file: PathBuf,
    pub clipboard: bool,
    pub logging: LoggerOptions,
}

impl Settings {
    /// Merge CLI flags over a prepared config.
    ///
    /// `config` must already have defaults applied. Fails when no API key
    /// can be found for the chosen provider.
    pub fn resolve(cli: &Cli, config: ImgscribeConfig, env: &HashMap<String, String>) -> Result<Self> {
        let input = config.input.unwrap_or_default();
        let analyzer = config.analyzer.unwrap_or_default();
        let rate = config.rate_limit.unwrap_or_default();
        let output = config.output.unwrap_or_default();
        let logging = config.logging.unwrap_or_default();

        let sequencing = if cli.rename {
            SequenceMode::Rename
        } else {
            input
                .sequencing
                .as_deref()
                .unwrap_or("in-memory")
                .parse::<SequenceMode>()
                .map_err(anyhow::Error::msg)
                .context("input.sequencing")?
        };

        let provider_name = analyzer.provider.as_deref().unwrap_or("openai");
        let Some(api_key) = resolve_api_key_with(provider_name, analyzer.api_key.as_deref(), env) else {
            bail!(
                "No API key for provider '{provider_name}'. Set {} or analyzer.apiKey in the config file",
                api_key_vars(provider_name).join(" or ")
            );
        };
        let provider = match provider_name {
            "gemini" => VisionProvider::gemini(api_key),
            _ => VisionProvider::openai(api_key),
        };
        let provider = match analyzer.model {
            Some(model) if !model.trim().is_empty() => provider.with_model(model),
            _ => provider,
        };

        let placeholder = analyzer
            .placeholder
            .as_deref()
            .and_then(|p| p.chars().next())
            .unwrap_or(imgscribe_understanding::DEFAULT_PLACEHOLDER);

        let defaults = RateLimitPolicy::default();
        let rate_limit = RateLimitPolicy {
            max_concurrent: cli
                .max_concurrent
                .or(rate.max_concurrent)
                .unwrap_or(defaults.max_concurrent),
            min_interval_ms: rate.min_interval_ms.unwrap_or(defaults.min_interval_ms),
        };
        if rate_limit.max_concurrent == 0 {
            bail!("--max-concurrent must be at least 1");
        }

        Ok(Self {
            images_dir: cli
                .images_dir
                .clone()
                .or(input.images_dir)
                .unwrap_or_else(|| PathBuf::from("imagesfolder")),
            create_if_missing: input.create_if_missing.unwrap_or(true),
            sequencing,
            provider,
            prompt: cli
                .prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .or(analyzer.prompt)
                .unwrap_or_else(|| imgscribe_config::defaults::DEFAULT_PROMPT.to_string()),
            max_tokens: analyzer.max_tokens,
            placeholder,
            rate_limit,
            call_timeout: rate.call_timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
            output_file: cli
                .output
                .clone()
                .or(output.file)
                .unwrap_or_else(|| PathBuf::from("extractedtext.txt")),
            clipboard: !cli.no_clipboard && output.clipboard.unwrap_or(true),
            logging: LoggerOptions {
                level: logging.level.unwrap_or_else(|| "info".to_string()),
                log_dir: logging.dir,
                json: logging.json.unwrap_or(false),
            },
        })
    }
}
