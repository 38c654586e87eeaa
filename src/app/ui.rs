//! Terminal output — banner, styled log lines, and search result rendering.

use std::io::{self, Write};

use anyhow::Result;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use crate::constants::SEARCH_PREVIEW_CHARS;
use crate::store::SearchHit;
use crate::util::truncate_chars;

use super::App;
use super::personas::{BUILTIN_PERSONAS, persona_names};

const RULE_WIDTH: usize = 60;

/// Severity / kind of a printed line; selects its colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    Reply,
}

impl LogLevel {
    fn color(self) -> Color {
        match self {
            LogLevel::Info => Color::Reset,
            LogLevel::Success => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
            LogLevel::Reply => Color::Cyan,
        }
    }
}

/// One buffered line of user-facing output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
}

impl App {
    /// Queue a line for the next [`App::flush_output`].
    pub(crate) fn log(&mut self, level: LogLevel, text: String) {
        self.logs.push(LogLine { level, text });
    }

    /// Print and drain buffered lines.
    pub fn flush_output(&mut self) -> Result<()> {
        let mut stdout = io::stdout().lock();
        for line in self.logs.drain(..) {
            queue!(
                stdout,
                SetForegroundColor(line.level.color()),
                Print(&line.text),
                ResetColor,
                Print("\n")
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Startup banner listing the commands.
    pub fn show_banner(&mut self) {
        let rule = "=".repeat(RULE_WIDTH);
        self.log(LogLevel::Info, rule.clone());
        self.log(LogLevel::Info, "🤖 Persona Agent with Memory".to_string());
        self.log(LogLevel::Info, rule.clone());
        self.log(LogLevel::Info, "Commands:".to_string());
        self.log(
            LogLevel::Info,
            format!("  /persona <name> - Change persona ({})", persona_names()),
        );
        self.log(LogLevel::Info, "  /clear          - Start a new conversation".to_string());
        self.log(LogLevel::Info, "  /search <query> - Semantic search in memory".to_string());
        self.log(LogLevel::Info, "  /exit           - Exit the program".to_string());
        self.log(LogLevel::Info, rule);
        self.log(
            LogLevel::Info,
            format!("Session {} (persona: {})", self.session.session_id(), self.session.persona()),
        );
        self.log(LogLevel::Info, String::new());
    }

    pub(crate) fn show_search_results(&mut self, hits: &[SearchHit]) {
        if hits.is_empty() {
            self.log(LogLevel::Info, "(no results)".to_string());
            return;
        }
        self.log(LogLevel::Info, "Top matches:".to_string());
        for (i, hit) in hits.iter().enumerate() {
            let (header, body) = format_hit(i + 1, hit);
            self.log(LogLevel::Success, header);
            self.log(LogLevel::Info, body);
        }
    }

    pub(crate) fn show_persona_list(&mut self) {
        for persona in BUILTIN_PERSONAS {
            self.log(
                LogLevel::Info,
                format!("  {:<10} {}", persona.name, persona.description),
            );
        }
    }
}

/// Header and indented preview lines for the `rank`-th search hit.
pub fn format_hit(rank: usize, hit: &SearchHit) -> (String, String) {
    let header = format!(
        "{rank}. [{}] ({}) {}  score={:.4}",
        hit.role, hit.persona, hit.timestamp, hit.score
    );
    let body = format!("   {}", truncate_chars(&hit.content, SEARCH_PREVIEW_CHARS));
    (header, body)
}

/// Farewell printed on `/exit`, end-of-input, and Ctrl-C.
pub fn goodbye() {
    let mut stdout = io::stdout().lock();
    let _ = queue!(
        stdout,
        Print("\n"),
        SetAttribute(Attribute::Bold),
        Print("👋 Goodbye!"),
        SetAttribute(Attribute::Reset),
        Print("\n")
    );
    let _ = stdout.flush();
}
