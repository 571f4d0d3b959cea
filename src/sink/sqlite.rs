//! SQLite-backed response sink.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use fs2::FileExt;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use crate::question::Response;

use super::{ResponseSink, SinkError, SinkReceipt};

#[derive(Clone)]
pub struct SqliteResponseSink {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteResponseSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             CREATE TABLE IF NOT EXISTS survey_responses (\
               session_id TEXT NOT NULL,\
               question INTEGER NOT NULL,\
               reference TEXT NOT NULL,\
               selected TEXT NOT NULL,\
               other TEXT NOT NULL,\
               recorded_at INTEGER NOT NULL,\
               PRIMARY KEY (session_id, question)\
             );",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_exclusive(&self) -> Result<SinkLock, SinkError> {
        SinkLock::new(&self.path)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, SinkError>
    where
        F: FnOnce(&mut Connection) -> Result<R, SinkError>,
    {
        let mut guard = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        f(&mut guard)
    }

    pub async fn count(&self) -> Result<usize, SinkError> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || {
            sink.with_conn(|conn| {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM survey_responses", [], |row| row.get(0))?;
                Ok(n.max(0) as usize)
            })
        })
        .await
        .map_err(|e| SinkError::Join(e.to_string()))?
    }

    /// Writes every stored response as one JSON object per line.
    pub async fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, SinkError> {
        let path = path.as_ref().to_path_buf();
        let sink = self.clone();
        tokio::task::spawn_blocking(move || {
            sink.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, question, reference, selected, other, recorded_at \
                     FROM survey_responses ORDER BY recorded_at, session_id, question",
                )?;
                let mut rows = stmt.query([])?;
                let mut file = std::fs::File::create(path)?;
                let mut exported = 0usize;
                while let Some(row) = rows.next()? {
                    let record = StoredResponse {
                        session_id: row.get(0)?,
                        question: row.get::<_, i64>(1)? as u32,
                        reference: row.get(2)?,
                        selected: row.get(3)?,
                        other: row.get(4)?,
                        recorded_at: row.get(5)?,
                    };
                    let line = serde_json::to_string(&record)
                        .map_err(|e| SinkError::Serde(e.to_string()))?;
                    use std::io::Write;
                    writeln!(file, "{line}")?;
                    exported += 1;
                }
                Ok(exported)
            })
        })
        .await
        .map_err(|e| SinkError::Join(e.to_string()))?
    }
}

#[async_trait]
impl ResponseSink for SqliteResponseSink {
    async fn append(
        &self,
        session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError> {
        let rows: Vec<Response> = responses.to_vec();
        let sink = self.clone();
        tokio::task::spawn_blocking(move || {
            sink.with_conn(|conn| {
                let now = now_epoch();
                let session = session_id.to_string();
                let tx = conn.transaction()?;
                let mut inserted = 0usize;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO survey_responses (\
                            session_id, question, reference, selected, other, recorded_at\
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for row in &rows {
                        inserted += stmt.execute(params![
                            session,
                            row.question as i64,
                            row.reference,
                            row.selected,
                            row.other,
                            now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(SinkReceipt {
                    rows_written: inserted,
                    header_written: false,
                })
            })
        })
        .await
        .map_err(|e| SinkError::Join(e.to_string()))?
    }
}

/// A persisted response row, as exported.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResponse {
    pub session_id: String,
    pub question: u32,
    pub reference: String,
    pub selected: String,
    pub other: String,
    pub recorded_at: i64,
}

/// Exclusive advisory lock on `<db>.lock`, held until dropped.
#[derive(Debug)]
pub struct SinkLock {
    _file: std::fs::File,
}

impl SinkLock {
    fn new(db_path: &Path) -> Result<Self, SinkError> {
        let mut lock_path = db_path.to_path_buf();
        lock_path.set_extension("lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
