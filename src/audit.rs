//! Append-only, human-readable audit trail.
//!
//! Lines are handed to a background writer over an unbounded channel so a slow
//! or failing disk never holds up a response. Write failures are reported
//! through `tracing` and otherwise dropped.

use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AuditLog {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl AuditLog {
    /// Starts the writer task appending to `path`. The task ends once every
    /// clone of the returned log has been dropped.
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(audit_writer(rx, path));
        (Self { tx: Some(tx) }, handle)
    }

    // Log that records nothing, for tests
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "audit", "{}", message);

        if let Some(tx) = &self.tx {
            let line = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
            let _ = tx.send(line);
        }
    }
}

async fn audit_writer(mut rx: mpsc::UnboundedReceiver<String>, path: PathBuf) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = append_line(&path, &line).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to append to audit log");
        }
    }
}

// Reopened per line so a rotated file is picked up
async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await
}
