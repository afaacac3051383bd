//! SQLite-backed queue backend.
//!
//! Every push inserts one row into `queue_jobs`; the row id orders the FIFO.
//! The external matcher consumes a job by deleting its row, either through
//! [`SqliteQueue::pop_front`] or with its own `DELETE` against the same
//! database file. WAL mode plus a busy timeout lets the hub and the matcher
//! share the file without clobbering each other's writes.

use super::{MatchmakingQueue, QueueError, DEFAULT_QUEUE_NAME, GAME_WORKER_JOB};
use crate::utils::current_timestamp_millis;
use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queue_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    name TEXT NOT NULL,
    data TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_jobs_queue ON queue_jobs(queue, id);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_millis(10_000);

type SqlitePool = Pool<SqliteConnectionManager>;

/// One enqueued job as the matcher sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueJob {
    pub id: i64,
    pub queue: String,
    pub name: String,
    pub data: String,
    pub enqueued_at: u64,
}

/// Durable FIFO stored in a SQLite database.
pub struct SqliteQueue {
    name: String,
    path: Option<PathBuf>,
    pool: SqlitePool,
}

impl SqliteQueue {
    /// Opens (creating if needed) the database at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        Self::open_named(DEFAULT_QUEUE_NAME, path).await
    }

    pub async fn open_named(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, QueueError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        });
        let pool = Self::build_pool(manager, 4).await?;
        debug!("📦 Opened queue database at {}", path.display());

        Ok(Self {
            name: name.into(),
            path: Some(path),
            pool,
        })
    }

    /// Non-persistent database, for tests and throwaway setups.
    pub async fn open_in_memory(name: impl Into<String>) -> Result<Self, QueueError> {
        // Every in-memory connection is its own database, so the pool holds one.
        let pool = Self::build_pool(SqliteConnectionManager::memory(), 1).await?;
        Ok(Self {
            name: name.into(),
            path: None,
            pool,
        })
    }

    async fn build_pool(
        manager: SqliteConnectionManager,
        max_size: u32,
    ) -> Result<SqlitePool, QueueError> {
        tokio::task::spawn_blocking(move || -> Result<SqlitePool, QueueError> {
            let pool = Pool::builder().max_size(max_size).build(manager)?;
            let conn = pool.get()?;
            initialize_schema(&conn)?;
            Ok(pool)
        })
        .await?
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Consumer side: removes and returns the oldest job, if any.
    pub async fn pop_front(&self) -> Result<Option<QueueJob>, QueueError> {
        let name = self.name.clone();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let job = tx
                .query_row(
                    "SELECT id, queue, name, data, enqueued_at FROM queue_jobs
                     WHERE queue = ?1 ORDER BY id LIMIT 1",
                    params![name],
                    |row| {
                        Ok(QueueJob {
                            id: row.get(0)?,
                            queue: row.get(1)?,
                            name: row.get(2)?,
                            data: row.get(3)?,
                            enqueued_at: row.get::<_, i64>(4)?.max(0) as u64,
                        })
                    },
                )
                .optional()?;
            if let Some(job) = &job {
                tx.execute("DELETE FROM queue_jobs WHERE id = ?1", params![job.id])?;
            }
            tx.commit()?;
            Ok(job)
        })
        .await
    }

    /// Runs blocking database work off the async runtime.
    async fn with_connection<T, F>(&self, work: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledConnection<SqliteConnectionManager>) -> Result<T, QueueError>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, QueueError> {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await?
    }
}

fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[async_trait]
impl MatchmakingQueue for SqliteQueue {
    async fn push(&self, identity: &str) -> Result<(), QueueError> {
        let queue = self.name.clone();
        let data = identity.to_string();
        let enqueued_at = current_timestamp_millis() as i64;
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO queue_jobs (queue, name, data, enqueued_at) VALUES (?1, ?2, ?3, ?4)",
                params![queue, GAME_WORKER_JOB, data, enqueued_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>, QueueError> {
        let queue = self.name.clone();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare("SELECT data FROM queue_jobs WHERE queue = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![queue], |row| row.get::<_, String>(0))?;
            let mut identities = Vec::new();
            for row in rows {
                identities.push(row?);
            }
            Ok(identities)
        })
        .await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
