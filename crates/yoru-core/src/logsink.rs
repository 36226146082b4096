//! Daily JSONL log sink
//!
//! Structured entries from the UI layer are appended, one JSON object per
//! line, to `<dir>/YYYY-MM-DD.jsonl`. Old files are pruned by
//! [`DailyLogSink::cleanup`].

use crate::error::LogSinkError;
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const EXTENSION: &str = "jsonl";

/// One structured log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub event: String,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Any additional fields, merged into the top-level object
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    /// Entry stamped with the current local time
    #[must_use]
    pub fn now(level: impl Into<String>, event: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            level: level.into(),
            event: event.into(),
            trace_id: trace_id.into(),
            user_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// With user id
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// With an extra field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Writes dated JSONL log files
#[derive(Debug, Clone)]
pub struct DailyLogSink {
    dir: PathBuf,
}

impl DailyLogSink {
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `date`
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", date.format(DATE_FORMAT)))
    }

    /// Path of today's file
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }

    /// Append to today's file
    pub async fn write(&self, entry: &LogEntry) -> Result<(), LogSinkError> {
        self.write_on(Local::now().date_naive(), entry).await
    }

    /// Append to the file for `date`
    pub async fn write_on(&self, date: NaiveDate, entry: &LogEntry) -> Result<(), LogSinkError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| LogSinkError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(date);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LogSinkError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| LogSinkError::Io { path, source })
    }

    /// Delete dated files older than `retention_days` before today
    pub async fn cleanup(&self, retention_days: u64) -> Result<u32, LogSinkError> {
        self.cleanup_before(Local::now().date_naive(), retention_days).await
    }

    /// Delete dated files whose date is strictly before `today - retention_days`.
    ///
    /// Files that are not `YYYY-MM-DD.jsonl` are left alone. A missing log
    /// directory means nothing to clean.
    pub async fn cleanup_before(&self, today: NaiveDate, retention_days: u64) -> Result<u32, LogSinkError> {
        let cutoff = today
            .checked_sub_days(Days::new(retention_days))
            .unwrap_or(NaiveDate::MIN);

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(LogSinkError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut deleted = 0u32;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(LogSinkError::Io {
                        path: self.dir.clone(),
                        source,
                    })
                }
            };
            let path = entry.path();
            let Some(date) = dated_log_file(&path) else {
                continue;
            };
            if date < cutoff {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => deleted += 1,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete old log file"),
                }
            }
        }

        tracing::debug!(deleted, %cutoff, "log cleanup finished");
        Ok(deleted)
    }
}

fn dated_log_file(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}
