//! Session store — persists every turn and persona change, and rebuilds the
//! active conversation from the record store when a session resumes.
//!
//! The current persona of a session is not stored on its own: it is the
//! persona of the latest `system` turn whose content starts with
//! `"Persona changed to:"`, or `neutral` when there is none. Resuming a
//! session therefore replays its whole history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, Utc};

use crate::constants::{DEFAULT_PERSONA, PERSONA_SENTINEL_PREFIX, SESSION_ID_FORMAT};
use crate::embeddings::{Embedder, zero_vector};
use crate::store::{ConversationTurn, RecordStore, Role, SearchHit, StoreError};

/// One message of in-memory chat context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// State rebuilt from stored turns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Restored {
    pub persona: String,
    pub history: Vec<ChatMessage>,
}

impl Default for Restored {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            history: Vec::new(),
        }
    }
}

/// Content of the `system` turn recorded for a persona change.
pub fn persona_sentinel(persona: &str) -> String {
    format!("{PERSONA_SENTINEL_PREFIX} {persona}")
}

/// Sortable form of a stored timestamp: RFC 3339 values are normalised to
/// UTC so rows written under different offsets order by instant. Offset-less
/// values are taken as UTC; anything unparseable sorts by its raw text.
fn timestamp_key(timestamp: &str) -> String {
    const KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return dt.with_timezone(&Utc).format(KEY_FORMAT).to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format(KEY_FORMAT).to_string();
    }
    timestamp.to_string()
}

fn is_persona_sentinel(role: Role, content: &str) -> bool {
    role == Role::System && content.contains(PERSONA_SENTINEL_PREFIX)
}

/// Owns the active session and the per-session in-memory histories.
pub struct SessionStore {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn Embedder>,
    session_id: String,
    persona: String,
    histories: HashMap<String, Vec<ChatMessage>>,
}

impl SessionStore {
    /// Start with a fresh, timestamp-derived session.
    pub fn new(store: Arc<dyn RecordStore>, embedder: Arc<dyn Embedder>) -> Self {
        let mut session = Self {
            store,
            embedder,
            session_id: String::new(),
            persona: DEFAULT_PERSONA.to_string(),
            histories: HashMap::new(),
        };
        session.new_session();
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Chat context of the active session.
    pub fn history(&self) -> &[ChatMessage] {
        self.history_for(&self.session_id)
    }

    /// In-memory chat context kept for any session seen by this process.
    pub fn history_for(&self, session_id: &str) -> &[ChatMessage] {
        self.histories
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Embed `content` and append it as one turn of `session_id`.
    ///
    /// An embedding failure never blocks the write: the turn is stored with
    /// a zero vector instead. Storage errors are returned.
    pub async fn record_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        persona: &str,
    ) -> Result<(), StoreError> {
        let embedding = match self.embedder.embed(content).await {
            Ok(vector) => vector,
            Err(err) => {
                tracing::debug!(error = %format!("{err:#}"), "embedding failed, storing zero vector");
                zero_vector(self.embedder.dimensions())
            }
        };

        let turn = ConversationTurn {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            persona: persona.to_string(),
            embedding,
        };
        self.store.insert(turn).await?;
        tracing::debug!(%session_id, %role, %persona, "saved turn");
        Ok(())
    }

    /// Record the `system` marker that makes `persona` current for the session.
    pub async fn record_persona_change(
        &self,
        session_id: &str,
        persona: &str,
    ) -> Result<(), StoreError> {
        self.record_turn(session_id, Role::System, &persona_sentinel(persona), persona)
            .await
    }

    /// Rebuild persona and chat history of `session_id` from the store.
    ///
    /// Read errors are logged and yield the default state.
    pub async fn restore(&self, session_id: &str) -> Restored {
        let mut turns = match self.store.query_session(session_id).await {
            Ok(turns) => turns,
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "loading conversation failed");
                return Restored::default();
            }
        };
        // Stable: equal instants keep storage order.
        turns.sort_by_cached_key(|turn| timestamp_key(&turn.timestamp));

        let mut restored = Restored::default();
        for turn in turns {
            match turn.role {
                Role::System if is_persona_sentinel(turn.role, &turn.content) => {
                    tracing::debug!(persona = %turn.persona, "restored persona");
                    restored.persona = turn.persona;
                }
                Role::System => {}
                Role::User | Role::Assistant => restored
                    .history
                    .push(ChatMessage::new(turn.role, turn.content)),
            }
        }
        restored
    }

    /// Nearest stored turns to `query`, optionally within one session.
    ///
    /// Returns an empty list when the query is blank, cannot be embedded, or
    /// the store fails.
    pub async fn search(
        &self,
        session_id: Option<&str>,
        query: &str,
        top_k: usize,
    ) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let embedding = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to embed search query");
                return Vec::new();
            }
        };
        match self.store.search(&embedding, top_k, session_id).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(error = %err, "search failed");
                Vec::new()
            }
        }
    }

    // ── Active session ───────────────────────────────────────────────

    /// Switch to a fresh session and return its id.
    ///
    /// The id is the local time to the second; when that collides with the
    /// active id a `_N` suffix is added. Earlier histories stay in memory and
    /// stored turns are untouched.
    pub fn new_session(&mut self) -> String {
        let base = Local::now().format(SESSION_ID_FORMAT).to_string();
        let mut candidate = base.clone();
        let mut suffix = 1;
        while candidate == self.session_id || self.histories.contains_key(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }

        self.session_id = candidate.clone();
        self.persona = DEFAULT_PERSONA.to_string();
        self.histories.insert(candidate.clone(), Vec::new());
        candidate
    }

    /// Make `session_id` active and load its persona and history from the
    /// store. Returns the number of restored messages.
    pub async fn resume(&mut self, session_id: &str) -> usize {
        let restored = self.restore(session_id).await;
        let count = restored.history.len();
        self.session_id = session_id.to_string();
        self.persona = restored.persona;
        self.histories
            .insert(session_id.to_string(), restored.history);
        count
    }

    /// Change the active persona and record the marker turn.
    ///
    /// The in-memory persona changes even when the write fails.
    pub async fn set_persona(&mut self, persona: &str) -> Result<(), StoreError> {
        self.persona = persona.to_string();
        self.record_persona_change(&self.session_id, persona).await
    }

    /// Push a completed exchange into the active chat context.
    pub fn append_exchange(&mut self, user: &str, assistant: &str) {
        let history = self.histories.entry(self.session_id.clone()).or_default();
        history.push(ChatMessage::new(Role::User, user));
        history.push(ChatMessage::new(Role::Assistant, assistant));
    }
}
