//! SQLite-backed record source with id cursor pagination.
//!
//! Reads `id, title, text, polarity` rows in ascending id order. The
//! connection is read-only; each query runs on tokio's blocking pool.

use super::RecordSource;
use crate::models::{Config, Label, Record, Result, SourceError, is_identifier};
use rusqlite::{Connection, OpenFlags, params};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite record reader.
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
    query: String,
    path: PathBuf,
}

impl SqliteSource {
    /// Open the database at `uri` read-only and target `table`.
    ///
    /// `uri` may be a plain path or carry a `sqlite://` / `sqlite:` prefix.
    pub fn open(uri: &str, table: &str) -> std::result::Result<Self, SourceError> {
        if !is_identifier(table) {
            return Err(SourceError::Connection {
                uri: uri.to_string(),
                message: format!("invalid table name '{table}'"),
            });
        }

        let path = PathBuf::from(strip_scheme(uri));
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::Connection {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA query_only = ON")?;

        info!(path = %path.display(), table, "SQLite source opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            query: format!(
                "SELECT id, title, text, polarity FROM {table} \
                 WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
            ),
            path,
        })
    }

    /// Open the source described by `config.source`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let uri = config.resolve_source_uri()?;
        Ok(Self::open(&uri, &config.source.table)?)
    }
}

fn strip_scheme(uri: &str) -> &str {
    uri.strip_prefix("sqlite://")
        .or_else(|| uri.strip_prefix("sqlite:"))
        .unwrap_or(uri)
}

fn read_batch(conn: &Connection, query: &str, after: i64, limit: usize) -> rusqlite::Result<Vec<Record>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(query)?;
    let rows = stmt.query_map(params![after, limit], |row| {
        Ok(Record {
            id: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            text: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            label: Label::from_polarity(row.get::<_, Option<i64>>(3)?.unwrap_or_default()),
        })
    })?;

    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

impl RecordSource for SqliteSource {
    async fn fetch(&self, after: i64, limit: usize) -> std::result::Result<Vec<Record>, SourceError> {
        let conn = Arc::clone(&self.conn);
        let query = self.query.clone();

        tokio::task::spawn_blocking(move || -> std::result::Result<Vec<Record>, SourceError> {
            let conn = conn
                .lock()
                .map_err(|_| SourceError::Task("connection lock poisoned".to_string()))?;
            Ok(read_batch(&conn, &query, after, limit)?)
        })
        .await
        .map_err(|e| SourceError::Task(e.to_string()))?
    }

    fn describe(&self) -> String {
        format!("sqlite {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("reviews.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE reviews (id INTEGER PRIMARY KEY, title TEXT, text TEXT, polarity INTEGER);
             INSERT INTO reviews VALUES (3, 'Bad Day', 'it was Bad', 1);
             INSERT INTO reviews VALUES (1, 'Good Day', 'It was good', 2);
             INSERT INTO reviews VALUES (7, NULL, 'no title', 2);
             INSERT INTO reviews VALUES (9, 'odd', 'unknown polarity', 5);",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_fetch_ascending_after_cursor() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        let source = SqliteSource::open(&format!("sqlite://{}", path.display()), "reviews").unwrap();

        let first = source.fetch(0, 2).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(first[0], Record::new(1, "Good Day", "It was good", Label::Positive));
        assert_eq!(first[1].label, Label::Negative);

        let second = source.fetch(3, 2).await.unwrap();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![7, 9]);
        assert_eq!(second[0].title, "");
        assert_eq!(second[1].label, Label::Negative);

        assert!(source.fetch(9, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_is_a_source_error() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        let source = SqliteSource::open(path.to_str().unwrap(), "missing").unwrap();
        assert!(matches!(
            source.fetch(0, 10).await,
            Err(SourceError::Database(_))
        ));
    }

    #[test]
    fn test_open_rejects_bad_table_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        assert!(SqliteSource::open(path.to_str().unwrap(), "x; --").is_err());
        assert!(SqliteSource::open(dir.path().join("nope.db").to_str().unwrap(), "reviews").is_err());
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("sqlite:///data/r.db"), "/data/r.db");
        assert_eq!(strip_scheme("sqlite:r.db"), "r.db");
        assert_eq!(strip_scheme("r.db"), "r.db");
    }
}
