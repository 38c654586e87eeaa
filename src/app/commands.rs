//! Slash-command dispatch and handler implementations.
//!
//! Every line starting with a known `/command` is routed through
//! [`App::handle_command`]. Anything else, unknown `/words` included, is
//! left for the chat flow.

use anyhow::Result;

use crate::constants::DEFAULT_SEARCH_TOP_K;

use super::App;
use super::ui::LogLevel;

// ── Command dispatch ─────────────────────────────────────────────────

impl App {
    /// Route a slash-command to the matching handler.
    ///
    /// Returns `false` when `line` is not a command.
    pub(crate) fn handle_command(&mut self, line: &str) -> Result<bool> {
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "/exit" if rest.is_empty() => self.should_quit = true,
            "/clear" if rest.is_empty() => self.clear_conversation(),
            "/persona" => self.handle_persona_command(rest),
            "/search" => self.handle_search_command(rest),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

// ── Persona ──────────────────────────────────────────────────────────

impl App {
    fn handle_persona_command(&mut self, name: &str) {
        if name.is_empty() {
            self.log(
                LogLevel::Warn,
                "⚠️  Please specify a persona: /persona <name>".to_string(),
            );
            self.show_persona_list();
            return;
        }

        let result = self.runtime.block_on(self.session.set_persona(name));
        self.log(LogLevel::Success, format!("✓ Persona set to '{name}'"));
        if let Err(err) = result {
            tracing::debug!(error = %err, persona = name, "persona change not saved");
            self.log(
                LogLevel::Warn,
                format!("⚠️  Could not save persona change: {err}"),
            );
        }
    }
}

// ── Sessions ─────────────────────────────────────────────────────────

impl App {
    fn clear_conversation(&mut self) {
        let id = self.session.new_session();
        self.log(LogLevel::Success, format!("✓ Started new session: {id}"));
    }
}

// ── Search ───────────────────────────────────────────────────────────

impl App {
    fn handle_search_command(&mut self, query: &str) {
        if query.is_empty() {
            self.log(
                LogLevel::Warn,
                "⚠️  Please provide a query: /search <query>".to_string(),
            );
            return;
        }
        let session_id = self.session.session_id().to_string();
        let hits = self.runtime.block_on(self.session.search(
            Some(&session_id),
            query,
            DEFAULT_SEARCH_TOP_K,
        ));
        self.show_search_results(&hits);
    }
}
