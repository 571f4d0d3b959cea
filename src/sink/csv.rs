//! Append-only CSV response sink.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use uuid::Uuid;

use crate::question::{Response, RESPONSE_HEADER};

use super::{ResponseSink, SinkError, SinkReceipt};

/// Writes `question,reference,selected,other` rows to a CSV file.
///
/// The header row is written only when the file is empty. Each row is
/// flushed before the next, so a failure reports exactly how many rows
/// landed.
#[derive(Debug, Clone)]
pub struct CsvResponseSink {
    path: PathBuf,
}

impl CsvResponseSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResponseSink for CsvResponseSink {
    async fn append(
        &self,
        _session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError> {
        let path = self.path.clone();
        let rows: Vec<Response> = responses.to_vec();
        tokio::task::spawn_blocking(move || append_rows(&path, &rows))
            .await
            .map_err(|e| SinkError::Join(e.to_string()))?
    }
}

fn append_rows(path: &Path, rows: &[Response]) -> Result<SinkReceipt, SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    // Concurrent sessions on one host must not interleave header checks.
    file.lock_exclusive()?;
    let fresh = file.metadata()?.len() == 0;

    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    let mut receipt = SinkReceipt::default();
    if fresh {
        writer.write_record(RESPONSE_HEADER)?;
        writer.flush()?;
        receipt.header_written = true;
    }

    for (written, row) in rows.iter().enumerate() {
        let result = writer
            .write_record(row.to_row())
            .map_err(SinkError::from)
            .and_then(|()| writer.flush().map_err(SinkError::from));
        if let Err(err) = result {
            return Err(if written > 0 {
                SinkError::partial(written, rows.len(), err)
            } else {
                err
            });
        }
        receipt.rows_written += 1;
    }

    writer.flush()?;
    Ok(receipt)
}
