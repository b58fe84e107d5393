//! Durable progress of one bulk import, one JSON file per import id.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::chunker::RecordCursor;
use crate::gas::GasCosts;
use crate::paths::{atomic_write_json_pretty, status_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImportState::Pending => "pending",
            ImportState::InProgress => "in_progress",
            ImportState::Completed => "completed",
            ImportState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The most recent broadcast, recorded before waiting for it to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAttempt {
    pub chunk_index: usize,
    pub first_correlation_id: Option<String>,
    pub last_correlation_id: Option<String>,
    pub transaction_hash: String,
    pub confirmed: bool,
    /// Resume position once this chunk is committed.
    #[serde(default)]
    pub cursor_after: RecordCursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkImportStatus {
    pub import_id: String,
    /// SHA-256 of the input file; a resume against other content is refused.
    pub file_hash: String,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub total_ledgers: usize,
    pub total_entries: usize,
    pub status: ImportState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_correlation_id: Option<String>,
    /// Record position after the last committed chunk. Unlike the
    /// correlation id it also covers records without entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_cursor: Option<RecordCursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempted_chunk: Option<ChunkAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_costs: Option<GasCosts>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkImportStatus {
    pub fn new(import_id: impl Into<String>, file_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            import_id: import_id.into(),
            file_hash: file_hash.into(),
            total_chunks: 0,
            completed_chunks: 0,
            total_ledgers: 0,
            total_entries: 0,
            status: ImportState::Pending,
            error_message: None,
            last_successful_correlation_id: None,
            resume_cursor: None,
            last_attempted_chunk: None,
            gas_costs: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ImportState::Completed
    }

    /// Mark the last attempt committed and advance the resume point past it.
    pub fn confirm_last_attempt(&mut self) {
        if let Some(attempt) = self.last_attempted_chunk.as_mut() {
            if attempt.confirmed {
                return;
            }
            attempt.confirmed = true;
            if attempt.last_correlation_id.is_some() {
                self.last_successful_correlation_id = attempt.last_correlation_id.clone();
            }
            self.resume_cursor = Some(attempt.cursor_after);
            self.completed_chunks += 1;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ImportState::Failed;
        self.error_message = Some(message.into());
    }
}

/// Reads and writes status files under one directory.
#[derive(Debug, Clone)]
pub struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, import_id: &str) -> PathBuf {
        status_path(&self.dir, import_id)
    }

    pub fn load(&self, import_id: &str) -> Result<Option<BulkImportStatus>> {
        let path = self.path_for(import_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read status file {}: {}", path.display(), e))?;
        let status = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse status file {}: {}", path.display(), e))?;
        Ok(Some(status))
    }

    /// Like [`load`](Self::load) but a missing file is an error.
    pub fn require(&self, import_id: &str) -> Result<BulkImportStatus> {
        self.load(import_id)?
            .ok_or_else(|| anyhow!("no status found for import {}", import_id))
    }

    /// Stamp `updated_at` and write atomically.
    pub fn save(&self, status: &mut BulkImportStatus) -> Result<()> {
        status.updated_at = Utc::now();
        let path = self.path_for(&status.import_id);
        atomic_write_json_pretty(&path, status)?;
        debug!(
            import_id = %status.import_id,
            status = %status.status,
            completed = status.completed_chunks,
            "saved import status"
        );
        Ok(())
    }
}
