//! SQLite record store — turns in one table, embeddings as BLOBs,
//! cosine similarity computed by a scan over the candidate rows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, params};

use super::vector;
use super::{ConversationTurn, RecordStore, Role, SearchHit, StoreError, StoredTurn};
use crate::constants::TURNS_TABLE;

pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
    dims: usize,
}

/// Raw row before the role column is validated.
struct TurnRow {
    timestamp: String,
    session_id: String,
    role: String,
    content: String,
    persona: String,
}

impl TurnRow {
    fn into_turn(self) -> Result<StoredTurn, StoreError> {
        Ok(StoredTurn {
            role: self.role.parse::<Role>()?,
            timestamp: self.timestamp,
            session_id: self.session_id,
            content: self.content,
            persona: self.persona,
        })
    }
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path`, accepting embeddings of
    /// exactly `dims` components.
    pub fn open(path: &Path, dims: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA temp_store   = MEMORY;",
        )?;
        Self::init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened turn store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(path.to_path_buf()),
            dims,
        })
    }

    /// Private, non-persistent database.
    #[cfg(test)]
    pub fn open_in_memory(dims: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
            dims,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TURNS_TABLE} (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                persona     TEXT NOT NULL,
                embedding   BLOB
            );
            CREATE INDEX IF NOT EXISTS idx_{TURNS_TABLE}_session
                ON {TURNS_TABLE}(session_id);"
        ))?;
        Ok(())
    }

    /// Embedding BLOB to store, or `None` for the zero-vector fallback,
    /// which is kept out of similarity search.
    fn embedding_blob(&self, embedding: &[f32]) -> Result<Option<Vec<u8>>, StoreError> {
        if vector::is_zero(embedding) {
            return Ok(None);
        }
        if embedding.len() != self.dims {
            return Err(StoreError::Dimension {
                expected: self.dims,
                got: embedding.len(),
            });
        }
        Ok(Some(vector::vec_to_bytes(embedding)))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        let blob = self.embedding_blob(&turn.embedding)?;
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn.lock();
            conn.execute(
                &format!(
                    "INSERT INTO {TURNS_TABLE} (timestamp, session_id, role, content, persona, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    turn.timestamp,
                    turn.session_id,
                    turn.role.as_str(),
                    turn.content,
                    turn.persona,
                    blob
                ],
            )?;
            Ok(())
        })
        .await?
    }

    async fn query_session(&self, session_id: &str) -> Result<Vec<StoredTurn>, StoreError> {
        let conn = self.conn.clone();
        let sid = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredTurn>, StoreError> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT timestamp, session_id, role, content, persona
                 FROM {TURNS_TABLE} WHERE session_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![sid], |row| {
                Ok(TurnRow {
                    timestamp: row.get(0)?,
                    session_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    persona: row.get(4)?,
                })
            })?;

            let mut turns = Vec::new();
            for row in rows {
                turns.push(row?.into_turn()?);
            }
            Ok(turns)
        })
        .await?
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if limit == 0 || vector::is_zero(embedding) {
            return Ok(Vec::new());
        }
        let conn = self.conn.clone();
        let query = embedding.to_vec();
        let sid = session_id.map(String::from);

        tokio::task::spawn_blocking(move || -> Result<Vec<SearchHit>, StoreError> {
            let conn = conn.lock();
            let mut sql = format!(
                "SELECT timestamp, session_id, role, content, persona, embedding
                 FROM {TURNS_TABLE} WHERE embedding IS NOT NULL"
            );
            if sid.is_some() {
                sql.push_str(" AND session_id = ?1");
            }
            sql.push_str(" ORDER BY id");

            let mut stmt = conn.prepare(&sql)?;
            let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(TurnRow, Vec<u8>)> {
                Ok((
                    TurnRow {
                        timestamp: row.get(0)?,
                        session_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        persona: row.get(4)?,
                    },
                    row.get::<_, Vec<u8>>(5)?,
                ))
            };
            let rows = match &sid {
                Some(sid) => stmt.query_map(params![sid], map_row)?.collect::<Vec<_>>(),
                None => stmt.query_map([], map_row)?.collect::<Vec<_>>(),
            };

            let mut scored = Vec::new();
            for row in rows {
                let (row, blob) = row?;
                let score = vector::cosine_similarity(&query, &vector::bytes_to_vec(&blob));
                let turn = row.into_turn()?;
                scored.push(SearchHit {
                    score,
                    timestamp: turn.timestamp,
                    role: turn.role,
                    content: turn.content,
                    persona: turn.persona,
                    session_id: turn.session_id,
                });
            }

            // Stable sort keeps insertion order among equal scores.
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(limit);
            Ok(scored)
        })
        .await?
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            let conn = conn.lock();
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {TURNS_TABLE}"), [], |row| {
                    row.get(0)
                })?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIMS: usize = 3;

    fn turn(session: &str, ts: &str, role: Role, content: &str, emb: [f32; DIMS]) -> ConversationTurn {
        ConversationTurn {
            timestamp: ts.to_string(),
            session_id: session.to_string(),
            role,
            content: content.to_string(),
            persona: "pirate".to_string(),
            embedding: emb.to_vec(),
        }
    }

    fn temp_store() -> (TempDir, SqliteRecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteRecordStore::open(&tmp.path().join("nested").join("turns.db"), DIMS)
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn query_session_returns_only_that_session_in_insert_order() {
        let (_tmp, store) = temp_store();
        store
            .insert(turn("a", "2024-01-01T10:00:00", Role::User, "first", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(turn("b", "2024-01-01T10:00:01", Role::User, "other", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(turn("a", "2024-01-01T10:00:02", Role::Assistant, "second", [0.0, 1.0, 0.0]))
            .await
            .unwrap();

        let turns = store.query_session("a").await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[0].persona, "pirate");
        assert!(store.query_session("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_filters_session() {
        let (_tmp, store) = temp_store();
        store
            .insert(turn("a", "t1", Role::User, "east", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(turn("a", "t2", Role::User, "north-east", [1.0, 1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(turn("b", "t3", Role::User, "exact east elsewhere", [2.0, 0.0, 0.0]))
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 5, Some("a")).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "east");
        assert_eq!(hits[1].content, "north-east");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.session_id == "a"));

        let all = store.search(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "east");
        assert_eq!(all[1].content, "exact east elsewhere");
    }

    #[tokio::test]
    async fn zero_embedding_is_stored_but_never_searched() {
        let (_tmp, store) = temp_store();
        store
            .insert(turn("a", "t1", Role::User, "unembedded", [0.0, 0.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.query_session("a").await.unwrap().len(), 1);
        assert!(store.search(&[1.0, 0.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let store = SqliteRecordStore::open_in_memory(DIMS).unwrap();
        let mut bad = turn("a", "t1", Role::User, "x", [1.0, 0.0, 0.0]);
        bad.embedding = vec![1.0, 2.0];
        let err = store.insert(bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Dimension { expected: 3, got: 2 }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_with_zero_limit_or_zero_query_is_empty() {
        let store = SqliteRecordStore::open_in_memory(DIMS).unwrap();
        store
            .insert(turn("a", "t1", Role::User, "x", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0], 0, None).await.unwrap().is_empty());
        assert!(store.search(&[0.0, 0.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn turns_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("turns.db");
        {
            let store = SqliteRecordStore::open(&path, DIMS).unwrap();
            store
                .insert(turn("keep", "t1", Role::User, "remember me", [0.0, 0.0, 1.0]))
                .await
                .unwrap();
        }
        let store = SqliteRecordStore::open(&path, DIMS).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        let turns = store.query_session("keep").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "remember me");
    }
}
