//! Background error log writer.
//!
//! The single observer of the pipeline's [`ErrorSink`](echidna_core::ErrorSink):
//! every per-item error report is appended to `error.log` as one line.
//! Workers never wait on this file.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use echidna_core::ErrorReport;

/// Spawn the writer task. It ends when every sink clone has been dropped
/// and returns the number of lines written.
pub fn spawn(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<ErrorReport>,
) -> JoinHandle<std::io::Result<u64>> {
    tokio::spawn(async move {
        let mut file = open(&path).await?;
        let mut written = 0u64;

        while let Some(report) = rx.recv().await {
            let line = format_line(&report);
            if let Err(e) = file.write_all(line.as_bytes()).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to append to error log");
                continue;
            }
            written += 1;
        }

        file.flush().await?;
        tracing::debug!(path = %path.display(), lines = written, "error log closed");
        Ok(written)
    })
}

async fn open(path: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

fn format_line(report: &ErrorReport) -> String {
    format!(
        "{} {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        report
    )
}
