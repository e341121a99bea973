//! Append-only record of completed turns.
//!
//! Each turn produces exactly one [`LogEntry`]. Entries go to a pluggable
//! [`LogSink`] (a JSON Lines file in production) and to a small in-memory
//! ring used by the console's `/log` command. Logging never fails a turn.

use crate::error::ErrorDescriptor;
use crate::message::{ToolCall, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Number of entries kept in memory for inspection.
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

/// One record per completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_input: String,
    pub tool_call: Option<ToolCall>,
    pub tool_result: Option<ToolResult>,
    pub final_output: Option<String>,
    pub error: Option<ErrorDescriptor>,
}

impl LogEntry {
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            user_input: user_input.into(),
            tool_call: None,
            tool_result: None,
            final_output: None,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable destination for log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one entry. Concurrent appends must not interleave.
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError>;
}

/// Writes one JSON object per line to a file opened in append mode.
pub struct JsonlFileSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlFileSink {
    /// Open (or create) the log file, creating parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for JsonlFileSink {
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps entries in memory. Used by tests and when no log path is configured.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}

/// The interaction log shared by all turns.
pub struct InteractionLog {
    sink: Option<Arc<dyn LogSink>>,
    recent: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    failed_writes: AtomicUsize,
}

impl InteractionLog {
    pub fn new(sink: Option<Arc<dyn LogSink>>) -> Self {
        Self {
            sink,
            recent: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_RECENT_CAPACITY,
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// An in-memory log with no durable sink.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Record an entry. Sink failures are reported and counted, never returned.
    pub async fn record(&self, entry: LogEntry) {
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(entry.clone());
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(&entry).await {
                self.failed_writes.fetch_add(1, Ordering::Relaxed);
                tracing::error!(session = %entry.session_id, error = %e, "failed to write interaction log entry");
            }
        }
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = recent.len().saturating_sub(count);
        recent.iter().skip(skip).cloned().collect()
    }

    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::Relaxed)
    }
}
