/*!
SQLite storage for extracted nodes

Each opened store drops and recreates the `nodes` table, so every write
strategy starts from the same empty table.

```no_run
# use osm_stream::store::{StoreBuilder, StoreError};
# #[tokio::main(flavor = "current_thread")]
# async fn main() -> Result<(), StoreError> {
let store = StoreBuilder::new()
    .with_cache_size_mb(32)
    .with_fast_sync(false) // keep sqlite's default durability
    .open("/some/path.db".into())
    .await?;
# Ok(())
# }
```
*/

use crate::record::NodeRecord;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::path::PathBuf;

const INSERT: &str = "INSERT INTO nodes (id, lat, lon, user, timestamp, version, changeset)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Same text layout rusqlite uses when binding a `DateTime<Utc>`
const TIMESTAMP_FORMAT: &str = "%F %T%.f%:z";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A wrapped database error
    #[error(transparent)]
    DbError(#[from] rusqlite::Error),
    /// A tokio blocking task failed to join
    #[error("Failed to join a tokio blocking task: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Builder-style store setup
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    /// Database in-memory cache allowance
    ///
    /// Default: 32 MiB
    pub cache_size_mb: usize,
    /// Run with a WAL journal and `synchronous = OFF`
    ///
    /// Default: true
    pub fast_sync: bool,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            cache_size_mb: 32,
            fast_sync: true,
        }
    }
}

impl StoreBuilder {
    /// Begin configuring the storage with defaults
    pub fn new() -> Self {
        Default::default()
    }
    /// Set the in-memory cache allowance for the database
    pub fn with_cache_size_mb(mut self, size: usize) -> Self {
        self.cache_size_mb = size;
        self
    }
    pub fn with_fast_sync(mut self, fast: bool) -> Self {
        self.fast_sync = fast;
        self
    }
    /// Open and initialize the actual storage
    pub async fn open(&self, path: PathBuf) -> Result<NodeStore, StoreError> {
        NodeStore::new(path, self.cache_size_mb, self.fast_sync).await
    }
}

/// One connection to the node table
pub struct NodeStore {
    conn: rusqlite::Connection,
}

impl NodeStore {
    pub async fn new(path: PathBuf, cache_mb: usize, fast_sync: bool) -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(move || {
            log::debug!("opening store at {}", path.display());
            let conn = rusqlite::Connection::open(path)?;

            let sqlite_one_mb = -(2_i64.pow(10)); // negative is kibibytes for sqlite cache_size

            if fast_sync {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "OFF")?;
            }
            conn.pragma_update(
                None,
                "cache_size",
                (cache_mb as i64 * sqlite_one_mb).to_string(),
            )?;
            Self::reset_tables(&conn)?;

            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self { conn })
    }

    fn reset_tables(conn: &rusqlite::Connection) -> Result<(), StoreError> {
        conn.execute("DROP TABLE IF EXISTS nodes", ())?;
        conn.execute(
            "CREATE TABLE nodes (
                id         INTEGER PRIMARY KEY NOT NULL,
                lat        REAL NOT NULL,
                lon        REAL NOT NULL,
                user       TEXT NOT NULL,
                timestamp  TEXT NOT NULL,
                version    INTEGER NOT NULL,
                changeset  INTEGER NOT NULL
            )",
            (),
        )?;
        Ok(())
    }

    /// Build and run a fully self-contained insert, parsed from scratch
    pub fn insert_literal(&self, node: &NodeRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO nodes (id, lat, lon, user, timestamp, version, changeset)
            VALUES ({}, {:?}, {:?}, {}, {}, {}, {})",
            node.id,
            node.lat,
            node.lon,
            quote(&node.user),
            quote(&node.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            node.version,
            node.changeset,
        );
        self.conn.execute(&sql, ())?;
        Ok(())
    }

    /// Bind into the cached compiled insert
    pub fn insert_prepared(&self, node: &NodeRecord) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(INSERT)?;
        stmt.execute(params![
            node.id,
            node.lat,
            node.lon,
            node.user,
            node.timestamp,
            node.version,
            node.changeset,
        ])?;
        Ok(())
    }

    /// Insert many nodes in a single transaction
    pub fn insert_batch(&mut self, nodes: &[NodeRecord]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT)?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.lat,
                    node.lon,
                    node.user,
                    node.timestamp,
                    node.version,
                    node.changeset,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", (), |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn get(&self, id: i64) -> Result<Option<NodeRecord>, StoreError> {
        let node = self
            .conn
            .query_row(
                "SELECT id, lat, lon, user, timestamp, version, changeset
                FROM nodes WHERE id = ?1",
                (id,),
                |row| {
                    Ok(NodeRecord {
                        id: row.get(0)?,
                        lat: row.get(1)?,
                        lon: row.get(2)?,
                        user: row.get(3)?,
                        timestamp: row.get::<_, DateTime<Utc>>(4)?,
                        version: row.get(5)?,
                        changeset: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(node)
    }
}

/// sql string literal
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn node(id: i64, user: &str) -> NodeRecord {
        NodeRecord {
            id,
            lat: 54.9833,
            lon: 82.8964,
            user: user.into(),
            timestamp: Utc.with_ymd_and_hms(2016, 7, 30, 10, 56, 47).unwrap(),
            version: 3,
            changeset: 41193271,
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("o'brien"), "'o''brien'");
    }

    #[tokio::test]
    async fn test_all_inserts_read_back_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StoreBuilder::new()
            .open(dir.path().join("nodes.db"))
            .await
            .unwrap();

        let a = node(1, "o'brien");
        let b = node(2, "bob");
        let c = node(3, "carol");
        store.insert_literal(&a).unwrap();
        store.insert_prepared(&b).unwrap();
        store.insert_batch(&[c.clone()]).unwrap();

        assert_eq!(store.count().unwrap(), 3);
        let literal = store.get(1).unwrap().unwrap();
        assert_eq!(literal.user, a.user);
        assert_eq!(literal.timestamp, a.timestamp);
        assert_eq!(literal.changeset, a.changeset);
        assert!((literal.lat - a.lat).abs() < 1e-9);
        assert_eq!(store.get(2).unwrap(), Some(b));
        assert_eq!(store.get(3).unwrap(), Some(c));
        assert_eq!(store.get(4).unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_resets_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.db");
        let store = StoreBuilder::new().open(path.clone()).await.unwrap();
        store.insert_prepared(&node(1, "a")).unwrap();
        drop(store);

        let store = StoreBuilder::new()
            .with_fast_sync(false)
            .open(path)
            .await
            .unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreBuilder::new()
            .open(dir.path().join("nodes.db"))
            .await
            .unwrap();
        store.insert_prepared(&node(1, "a")).unwrap();
        let res = store.insert_literal(&node(1, "a"));
        assert!(matches!(res, Err(StoreError::DbError(_))));
    }
}
