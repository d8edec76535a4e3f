//! "Copy server address" action.

use crate::board::Board;
use lodestone_api::StatusSource;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("no clipboard tool found")]
    Unavailable,

    #[error("clipboard tool i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("clipboard tool `{tool}` exited with {status}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
    },
}

/// Destination for the copy action.
pub trait Clipboard: Send + Sync + 'static {
    fn write_text(&self, text: &str) -> impl Future<Output = Result<(), ClipboardError>> + Send;
}

/// Clipboard of the machine the board runs on, reached through the platform's
/// command line clipboard tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

#[cfg(target_os = "macos")]
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[("pbcopy", &[])];

#[cfg(windows)]
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[("clip", &[])];

#[cfg(all(unix, not(target_os = "macos")))]
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

async fn pipe_to(tool: &'static str, args: &[&str], text: &str) -> Result<(), ClipboardError> {
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        // stdin drops here so the tool sees EOF
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::ToolFailed { tool, status })
    }
}

impl Clipboard for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        for &(tool, args) in CLIPBOARD_TOOLS {
            match pipe_to(tool, args, text).await {
                Ok(()) => {
                    tracing::debug!(tool, "copied to clipboard");
                    return Ok(());
                }
                Err(ClipboardError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ClipboardError::Unavailable)
    }
}

/// Copy `address` and start the board's copied feedback.
///
/// Failures are logged and otherwise swallowed; the feedback just never shows.
pub async fn copy_address<S, C>(board: &Board<S>, clipboard: &C, address: &str) -> bool
where
    S: StatusSource,
    C: Clipboard,
{
    match clipboard.write_text(address).await {
        Ok(()) => {
            board.mark_copied();
            tracing::info!(%address, "server address copied");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to copy server address");
            false
        }
    }
}
