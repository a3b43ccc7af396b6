use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::AuditEntry;
use crate::writer::{AuditWriteError, AuditWriter};

const CHANNEL_BUFFER: usize = 1024;

/// Flush after this long without new entries.
const IDLE_FLUSH: Duration = Duration::from_secs(1);

/// Cloneable handle for submitting [`AuditEntry`] values to the background
/// writer task.
///
/// A sink created with [`AuditSink::disabled`] accepts entries and drops
/// them, so request handlers never need to care whether auditing is on.
#[derive(Clone)]
pub struct AuditSink {
    tx: Option<mpsc::Sender<AuditEntry>>,
}

impl AuditSink {
    /// Open the log at `path` and spawn the writer task.
    ///
    /// The task exits after a final flush once every clone of the sink has
    /// been dropped. Write errors are reported through `tracing` and the
    /// offending entry is skipped.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), AuditWriteError> {
        let writer = AuditWriter::open(path).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let handle = tokio::spawn(drain(writer, rx));
        Ok((Self { tx: Some(tx) }, handle))
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn log(&self, entry: AuditEntry) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(err) = tx.send(entry).await {
            tracing::warn!(
                event_type = ?err.0.event_type,
                "audit writer has stopped, entry dropped"
            );
        }
    }
}

async fn drain(mut writer: AuditWriter, mut rx: mpsc::Receiver<AuditEntry>) {
    let mut pending = false;

    loop {
        match tokio::time::timeout(IDLE_FLUSH, rx.recv()).await {
            Ok(Some(entry)) => match writer.append(&entry).await {
                Ok(()) => pending = true,
                Err(err) => tracing::error!(%err, path = %writer.path().display(), "audit append failed"),
            },
            Ok(None) => break,
            Err(_) if pending => match writer.flush().await {
                Ok(()) => pending = false,
                Err(err) => tracing::error!(%err, "periodic audit flush failed"),
            },
            Err(_) => {}
        }
    }

    if pending {
        if let Err(err) = writer.flush().await {
            tracing::error!(%err, "final audit flush failed");
        }
    }
    tracing::debug!(lines = writer.lines_written(), "audit writer stopped");
}
