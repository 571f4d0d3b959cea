//! Response persistence.
//!
//! Sessions hand their finished responses to a `ResponseSink`. The sink
//! decouples the survey from the storage backend:
//! - `CsvResponseSink` appends to a header-once CSV file
//! - `SqliteResponseSink` upserts into a keyed table (retries are idempotent)
//! - `RetryingSink` wraps either with bounded backoff

pub mod csv;
pub mod retry;
pub mod sqlite;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::question::Response;

pub use self::csv::CsvResponseSink;
pub use retry::{RetryConfig, RetryingSink};
pub use sqlite::{SinkLock, SqliteResponseSink, StoredResponse};

/// Environment variable overriding the default sink location.
pub const SINK_PATH_ENV: &str = "SURVEY_SINK_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Csv,
    Sqlite,
}

impl SinkKind {
    pub fn default_path(self) -> PathBuf {
        if let Ok(path) = std::env::var(SINK_PATH_ENV) {
            return PathBuf::from(path);
        }
        match self {
            SinkKind::Csv => PathBuf::from("survey_responses.csv"),
            SinkKind::Sqlite => PathBuf::from("survey_responses.sqlite"),
        }
    }
}

/// Outcome of a successful append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkReceipt {
    pub rows_written: usize,
    pub header_written: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sink lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
    /// Some rows reached storage before the failure.
    #[error("partial write: {written} of {total} rows appended before failure: {source}")]
    Partial {
        written: usize,
        total: usize,
        #[source]
        source: Box<SinkError>,
    },
}

impl SinkError {
    /// Wraps `source` as a partial write; nested partials are flattened.
    pub fn partial(written: usize, total: usize, source: SinkError) -> Self {
        let source = match source {
            SinkError::Partial { source, .. } => source,
            other => Box::new(other),
        };
        SinkError::Partial {
            written,
            total,
            source,
        }
    }

    /// Rows that were durably appended before this error.
    pub fn rows_written(&self) -> usize {
        match self {
            SinkError::Partial { written, .. } => *written,
            _ => 0,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Io(_) | SinkError::Csv(_) | SinkError::Sqlite(_) | SinkError::Join(_) => {
                true
            }
            SinkError::Poisoned | SinkError::Serde(_) => false,
            SinkError::Partial { source, .. } => source.is_retryable(),
        }
    }
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Appends `responses` in order. The header (or schema) is written once,
    /// on the first append to fresh storage.
    async fn append(
        &self,
        session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError>;
}

/// Opens the sink of `kind` at `path`, wrapped with retries.
pub fn open_sink(
    kind: SinkKind,
    path: impl AsRef<Path>,
    retry: RetryConfig,
) -> Result<Box<dyn ResponseSink>, SinkError> {
    Ok(match kind {
        SinkKind::Csv => Box::new(RetryingSink::new(CsvResponseSink::new(path), retry)),
        SinkKind::Sqlite => Box::new(RetryingSink::new(SqliteResponseSink::new(path)?, retry)),
    })
}
