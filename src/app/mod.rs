//! Application core — state, lifecycle, and line dispatch.
//!
//! The [`App`] struct holds all runtime state and is the single entry point
//! for the rest of the binary. Heavy concerns are delegated to focused
//! submodules:
//!
//! | Module       | Responsibility                              |
//! |--------------|---------------------------------------------|
//! | `chat`       | One conversational turn: log, reply, log    |
//! | `commands`   | Slash-command dispatch & handlers           |
//! | `input`      | Prompt and line reading                     |
//! | `personas`   | Built-in persona styles & system prompt     |
//! | `ui`         | Styled terminal output                      |

mod chat;
mod commands;
mod input;
mod personas;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::constants::EMBEDDING_CACHE_MAX;
use crate::embeddings::{CachedEmbedder, Embedder, OpenAiEmbedder};
use crate::openai::OpenAiClient;
use crate::responder::{Responder, ToolAgent};
use crate::session::SessionStore;
use crate::store::{RecordStore, SqliteRecordStore};
use crate::tools::ToolSet;

pub use self::input::read_input;
pub use self::ui::goodbye;

use self::ui::{LogLevel, LogLine};

// ── Application state ────────────────────────────────────────────────

/// Top-level application state.
///
/// Fields use `pub(crate)` visibility so that the sibling submodules
/// (`commands`, `chat`, `ui`, …) can access them directly.
pub struct App {
    pub(crate) runtime: Runtime,
    pub(crate) session: SessionStore,
    pub(crate) responder: Box<dyn Responder>,
    pub(crate) logs: Vec<LogLine>,
    pub(crate) should_quit: bool,
}

// ── Lifecycle ────────────────────────────────────────────────────────

impl App {
    /// Open the database, wire up the OpenAI clients and tools, and
    /// optionally resume `resume_session`.
    pub fn new(config: &Config, resume_session: Option<&str>) -> Result<Self> {
        let runtime = Runtime::new().context("create tokio runtime")?;
        let store = SqliteRecordStore::open(&config.db_path, config.embedding_dim)
            .with_context(|| format!("open conversation database {}", config.db_path.display()))?;
        let stored = runtime.block_on(store.count()).unwrap_or(0);
        tracing::info!(
            backend = store.name(),
            path = ?store.db_path(),
            turns = stored,
            "conversation store ready"
        );

        let client = OpenAiClient::new(config);
        if !client.has_key() {
            tracing::warn!("OPENAI_API_KEY is not set; replies will fail and turns are stored unindexed");
        }
        let embedder = CachedEmbedder::new(
            OpenAiEmbedder::new(client.clone(), &config.embedding_model, config.embedding_dim),
            EMBEDDING_CACHE_MAX,
        );
        let tools = ToolSet::from_config(config);
        tracing::debug!(
            tools = ?tools.names(),
            model = %client.model,
            embedder = embedder.name(),
            "responder configured"
        );
        let responder = ToolAgent::new(client, tools);

        let session = SessionStore::new(Arc::new(store), Arc::new(embedder));
        let mut app = Self::with_parts(runtime, session, Box::new(responder));
        if let Some(id) = resume_session {
            app.load_conversation(id);
        }
        Ok(app)
    }

    /// Assemble an app from already-built parts.
    pub(crate) fn with_parts(
        runtime: Runtime,
        session: SessionStore,
        responder: Box<dyn Responder>,
    ) -> Self {
        App {
            runtime,
            session,
            responder,
            logs: Vec::new(),
            should_quit: false,
        }
    }

    /// Whether the user has requested to quit.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Resume `session_id`: restore its persona and history.
    pub(crate) fn load_conversation(&mut self, session_id: &str) {
        let count = self.runtime.block_on(self.session.resume(session_id));
        if count > 0 {
            self.log(
                LogLevel::Success,
                format!(
                    "✓ Loaded {count} messages from session (persona: {})",
                    self.session.persona()
                ),
            );
        } else {
            self.log(
                LogLevel::Info,
                format!(
                    "Session {session_id} has no stored messages (persona: {})",
                    self.session.persona()
                ),
            );
        }
    }
}

// ── Line handling ────────────────────────────────────────────────────

impl App {
    /// Process one line of user input.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        if self.handle_command(line)? {
            return Ok(());
        }
        self.handle_chat_message(line);
        Ok(())
    }
}
