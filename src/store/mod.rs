//! Durable, similarity-searchable storage of conversation turns.

pub mod sqlite;
pub mod vector;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::sqlite::SqliteRecordStore;

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Persona-change markers.
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(StoreError::InvalidRole(other.to_string())),
        }
    }
}

/// One turn as written to the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationTurn {
    /// RFC 3339 creation time, UTC.
    pub timestamp: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub persona: String,
    pub embedding: Vec<f32>,
}

/// A turn as read back from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredTurn {
    pub timestamp: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub persona: String,
}

/// A nearest-neighbour match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
    pub timestamp: String,
    pub role: Role,
    pub content: String,
    pub persona: String,
    pub session_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("background storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("unknown role '{0}' in stored turn")]
    InvalidRole(String),
    #[error("embedding has {got} dimensions, store expects {expected}")]
    Dimension { expected: usize, got: usize },
}

/// Append-only turn storage with equality filtering and vector search.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Append one turn.
    async fn insert(&self, turn: ConversationTurn) -> Result<(), StoreError>;

    /// Every turn of `session_id`, in storage order.
    async fn query_session(&self, session_id: &str) -> Result<Vec<StoredTurn>, StoreError>;

    /// Up to `limit` turns closest to `embedding`, best first, optionally
    /// restricted to one session.
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// Total number of stored turns.
    async fn count(&self) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "tool".parse::<Role>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidRole(ref r) if r == "tool"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
