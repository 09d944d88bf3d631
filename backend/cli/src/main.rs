mod clipboard;
mod config;
mod terminal_output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use imgscribe_config::{config_dir, config_file_path, load_and_prepare, redacted_view};
use imgscribe_logging::init_logger;
use imgscribe_pipeline::{BatchOptions, BatchRunner, FileSink};
use imgscribe_understanding::VisionAnalyzer;

use clipboard::ClipboardOutcome;
use config::Settings;
use terminal_output::{note_error, note_info, note_success, note_warn, render_table, summary_rows};

#[derive(Parser, Debug)]
#[command(name = "imgscribe")]
#[command(about = "Extract the text of every image in a folder, in order, with a vision model")]
#[command(version)]
pub struct Cli {
    /// Prompt sent with every image (overrides analyzer.prompt)
    pub prompt: Option<String>,

    /// Folder of .png/.jpg/.jpeg images
    #[arg(long)]
    pub images_dir: Option<PathBuf>,

    /// Report file; lines are appended
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (default: ~/.imgscribe/config.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Rename images on disk to <position>.<ext>
    #[arg(long)]
    pub rename: bool,

    /// Do not copy the report to the clipboard
    #[arg(long)]
    pub no_clipboard: bool,

    /// Maximum concurrent vision calls
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let started = Instant::now();

    let config_path = match &cli.config {
        Some(path) => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                bail!("Config file not found: {}", path.display());
            }
            path.clone()
        }
        None => config_file_path(&config_dir()),
    };
    let prepared = load_and_prepare(&config_path).await?;
    let file_config = prepared.config;
    let settings = Settings::resolve(&cli, file_config.clone(), &std::env::vars().collect())?;

    init_logger(&settings.logging);
    for warning in &prepared.warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    debug!(config = %redacted_view(&file_config), "Effective config");

    if settings.create_if_missing {
        tokio::fs::create_dir_all(&settings.images_dir)
            .await
            .with_context(|| format!("Failed to create images folder {}", settings.images_dir.display()))?;
    }

    let analyzer = VisionAnalyzer::new(settings.provider.clone())?
        .with_max_tokens(settings.max_tokens)
        .with_placeholder(settings.placeholder);
    info!(
        provider = %settings.provider.label(),
        images_dir = %settings.images_dir.display(),
        output = %settings.output_file.display(),
        "Starting imgscribe"
    );

    let runner = BatchRunner::new(
        Arc::new(analyzer),
        BatchOptions {
            images_dir: settings.images_dir.clone(),
            prompt: settings.prompt.clone(),
            sequencing: settings.sequencing,
            rate_limit: settings.rate_limit.clone(),
            call_timeout: settings.call_timeout,
        },
    );

    let limiter = runner.limiter();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling images still waiting for a slot");
            limiter.close();
        }
    });

    let mut sink = FileSink::new(&settings.output_file);
    let report = runner.run(&mut sink).await;
    interrupt.abort();
    let report = report?;

    if report.total_images == 0 {
        note_warn(&format!("No images found in {}", settings.images_dir.display()));
    }

    if settings.clipboard {
        match tokio::fs::read_to_string(&settings.output_file).await {
            Ok(text) => {
                if let ClipboardOutcome::Copied { tool } = clipboard::copy_to_clipboard(&text).await {
                    note_info(&format!("Report copied to the clipboard with {tool}"));
                }
            }
            Err(e) => warn!(path = %settings.output_file.display(), error = %e, "Could not read report for clipboard"),
        }
    }

    print!("{}", render_table(&summary_rows(&report)));
    if report.failed == 0 && report.write.failures == 0 {
        note_success(&format!("Report written to {}", settings.output_file.display()));
    } else {
        note_error(&format!(
            "{} image(s) failed, {} line(s) not written; see the log for details",
            report.failed, report.write.failures
        ));
    }

    let total = started.elapsed();
    info!(
        total_tokens = report.usage.total_tokens,
        "Total execution time: {:.2} seconds",
        total.as_secs_f64()
    );
    note_info(&format!("Total tokens used: {}", report.usage.total_tokens));
    Ok(())
}
