//! Copy the finished report to the system clipboard by piping it into the
//! platform's clipboard tool.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// What happened when copying to the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardOutcome {
    Copied { tool: String },
    /// Nothing to copy.
    Empty,
    /// No clipboard tool accepted the content.
    Unavailable,
}

/// Clipboard commands to try on this platform, in order.
pub fn candidate_tools() -> Vec<Vec<&'static str>> {
    #[cfg(target_os = "macos")]
    {
        vec![vec!["pbcopy"]]
    }
    #[cfg(target_os = "windows")]
    {
        vec![vec!["clip"]]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut tools = Vec::new();
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            tools.push(vec!["wl-copy"]);
        }
        tools.push(vec!["xclip", "-selection", "clipboard"]);
        tools.push(vec!["xsel", "--clipboard", "--input"]);
        tools
    }
}

pub async fn copy_to_clipboard(text: &str) -> ClipboardOutcome {
    copy_with(text, &candidate_tools()).await
}

/// Try each tool until one exits successfully.
pub async fn copy_with(text: &str, tools: &[Vec<&str>]) -> ClipboardOutcome {
    if text.is_empty() {
        info!("No content to copy to the clipboard");
        return ClipboardOutcome::Empty;
    }

    for tool in tools {
        let Some((program, args)) = tool.split_first() else { continue };
        match pipe_into(program, args, text).await {
            Ok(()) => {
                info!(tool = %program, chars = text.chars().count(), "Copied report to clipboard");
                return ClipboardOutcome::Copied { tool: program.to_string() };
            }
            Err(e) => debug!(tool = %program, error = %e, "Clipboard tool failed"),
        }
    }

    warn!("No clipboard tool available; report was not copied");
    ClipboardOutcome::Unavailable
}

async fn pipe_into(program: &str, args: &[&str], text: &str) -> std::io::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        // Dropping stdin closes the pipe so the tool sees EOF.
    }

    let output = child.wait_with_output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
