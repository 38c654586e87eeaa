//! Persona Agent — a command-line chat agent that speaks in a selectable
//! persona, remembers every turn in a local SQLite store, and can look up
//! the web and the weather through OpenAI tool calls.
//!
//! This binary loads configuration, sets up logging, and drives a simple
//! read → handle → print loop; all application logic lives in [`app::App`].

mod app;
mod config;
mod constants;
mod embeddings;
mod openai;
mod responder;
mod session;
mod store;
mod tools;
mod util;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::{App, goodbye, read_input};
use crate::config::Config;

/// Chat with a persona that remembers.
#[derive(Debug, Parser)]
#[command(name = "persona", version, about)]
struct Cli {
    /// Resume an existing session id (e.g. 20260101_120000).
    #[arg(long)]
    session: Option<String>,

    /// Conversation database file.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

// ── Entry point ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.db {
        config = config.with_db_path(path);
    }
    init_tracing(config.debug);

    let mut app = App::new(&config, cli.session.as_deref())?;
    install_ctrl_c_handler(&app);

    app.show_banner();
    app.flush_output()?;
    run_repl(&mut app)
}

// ── Logging ──────────────────────────────────────────────────────────

/// `RUST_LOG` wins; otherwise `DEBUG=true` turns on this crate's debug events.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "persona=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    #[cfg(feature = "debug-logs")]
    let builder = builder.with_file(true).with_line_number(true);
    builder.init();
}

// ── REPL ─────────────────────────────────────────────────────────────

/// Ctrl-C at any point (including mid-request) ends the process cleanly.
fn install_ctrl_c_handler(app: &App) {
    app.runtime().spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            goodbye();
            std::process::exit(0);
        }
    });
}

/// Read → handle → print until `/exit` or end-of-input.
fn run_repl(app: &mut App) -> Result<()> {
    let mut stdin = io::stdin().lock();
    loop {
        let Some(line) = read_input(&mut stdin)? else {
            println!();
            break;
        };
        app.handle_line(&line)?;
        app.flush_output()?;
        if app.should_quit() {
            break;
        }
    }
    goodbye();
    Ok(())
}
