use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use briefing_types::{BriefingError, Result};

// ---------------------------------------------------------------------------
// AtomicCounter
// ---------------------------------------------------------------------------

/// Named monotonically increasing counters.
///
/// `increment` must be atomic with respect to other callers of the same
/// backing store: N sequential increments of a fresh key return `1..=N`.
#[async_trait]
pub trait AtomicCounter: Send + Sync {
    /// Current value of `key`, `0` if it was never incremented.
    async fn load(&self, key: &str) -> Result<u64>;

    /// Increment `key` and return the new value.
    async fn increment(&self, key: &str) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

pub(crate) const CREATE_COUNTERS: &str = r#"
    CREATE TABLE IF NOT EXISTS slug_counters (
        key   TEXT    PRIMARY KEY,
        value INTEGER NOT NULL
    )
"#;

/// Increment inside an open connection or transaction.
pub(crate) async fn increment_in(
    conn: &mut SqliteConnection,
    key: &str,
) -> std::result::Result<u64, sqlx::Error> {
    let (value,) = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO slug_counters (key, value)
        VALUES (?, 1)
        ON CONFLICT(key) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value as u64)
}

pub(crate) async fn load_in(
    conn: &mut SqliteConnection,
    key: &str,
) -> std::result::Result<u64, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64,)>("SELECT value FROM slug_counters WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|(v,)| v as u64).unwrap_or(0))
}

/// Counters kept in the `slug_counters` table.
#[derive(Clone)]
pub struct SqliteCounter {
    pool: SqlitePool,
}

impl SqliteCounter {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_COUNTERS)
            .execute(&pool)
            .await
            .map_err(|e| BriefingError::persistence("counter_schema", e))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl AtomicCounter for SqliteCounter {
    async fn load(&self, key: &str) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| BriefingError::persistence("counter_load", e))?;
        load_in(&mut conn, key)
            .await
            .map_err(|e| BriefingError::persistence("counter_load", e))
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BriefingError::persistence("counter_increment", e))?;
        let value = increment_in(&mut tx, key)
            .await
            .map_err(|e| BriefingError::persistence("counter_increment", e))?;
        tx.commit()
            .await
            .map_err(|e| BriefingError::persistence("counter_increment", e))?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Counters kept as a JSON object in a single file.
///
/// Every increment rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written file. The in-process lock
/// serializes increments from one process only.
pub struct FileCounter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, u64>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                BriefingError::persistence(
                    "counter_load",
                    format!("{} is not a counter file: {e}", self.path.display()),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(BriefingError::persistence("counter_load", e)),
        }
    }

    async fn write_all(&self, counters: &BTreeMap<String, u64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BriefingError::persistence("counter_save", e))?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let raw = serde_json::to_string_pretty(counters)?;
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| BriefingError::persistence("counter_save", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| BriefingError::persistence("counter_save", e))
    }
}

#[async_trait]
impl AtomicCounter for FileCounter {
    async fn load(&self, key: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.get(key).copied().unwrap_or(0))
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut counters = self.read_all().await?;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        let next = *value;
        self.write_all(&counters).await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sqlite_counter_yields_one_to_n() {
        let counter = SqliteCounter::new(memory_pool().await).await.unwrap();
        assert_eq!(counter.load("AI-weekly").await.unwrap(), 0);

        let values: Vec<u64> = {
            let mut v = Vec::new();
            for _ in 0..5 {
                v.push(counter.increment("AI-weekly").await.unwrap());
            }
            v
        };
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
        assert_eq!(counter.load("AI-weekly").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn sqlite_counter_keys_are_independent() {
        let counter = SqliteCounter::new(memory_pool().await).await.unwrap();
        assert_eq!(counter.increment("AI-weekly").await.unwrap(), 1);
        assert_eq!(counter.increment("AI-midweek").await.unwrap(), 1);
        assert_eq!(counter.increment("AI-weekly").await.unwrap(), 2);
        assert_eq!(counter.increment("TECH-weekly").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_counter_yields_one_to_n_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("counters.json");

        let counter = FileCounter::new(&path);
        for expected in 1..=4 {
            assert_eq!(counter.increment("TECH-midweek").await.unwrap(), expected);
        }

        // A fresh instance over the same file continues the sequence.
        let reopened = FileCounter::new(&path);
        assert_eq!(reopened.load("TECH-midweek").await.unwrap(), 4);
        assert_eq!(reopened.increment("TECH-midweek").await.unwrap(), 5);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_counter_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        std::fs::write(&path, "AI-weekly=3").unwrap();

        let err = FileCounter::new(&path).increment("AI-weekly").await.unwrap_err();
        assert!(matches!(err, BriefingError::Persistence { .. }));
    }
}
