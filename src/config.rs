//! Runtime configuration gathered from the environment (and `.env`).

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::constants::{
    APP_NAME, DB_FILE_NAME, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE, EMBEDDING_DIM,
};
use crate::util::{env_first, env_flag};

/// Everything the agent needs to wire up its collaborators.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub temperature: f32,
    pub db_path: PathBuf,
    pub debug: bool,
    pub web_search_enabled: bool,
    pub weather_enabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let base_url = env_first(&["OPENAI_BASE_URL", "OPENAI_API_BASE"])
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let db_path = env_first(&["PERSONA_AGENT_DB"])
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        Config {
            openai_api_key: env_first(&["OPENAI_API_KEY"]),
            openai_base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: env_first(&["OPENAI_MODEL", "PERSONA_AGENT_MODEL"])
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            embedding_model: env_first(&["OPENAI_EMBEDDING_MODEL"])
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dim: EMBEDDING_DIM,
            temperature: DEFAULT_TEMPERATURE,
            db_path,
            debug: env_flag(&["DEBUG"]),
            web_search_enabled: !env_flag(&["PERSONA_AGENT_DISABLE_SEARCH"]),
            weather_enabled: !env_flag(&["PERSONA_AGENT_DISABLE_WEATHER"]),
        }
    }

    /// Replace the database location (used by the `--db` flag).
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

/// Prefer an existing `agent-conversations.db` in the working directory,
/// otherwise place it in the platform data directory.
fn default_db_path() -> PathBuf {
    let local = Path::new(DB_FILE_NAME);
    if local.exists() {
        return local.to_path_buf();
    }
    match ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().join(DB_FILE_NAME),
        None => local.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_path_ends_with_database_file() {
        let path = default_db_path();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(DB_FILE_NAME)
        );
    }

    #[test]
    fn with_db_path_overrides_location() {
        let config = Config::from_env().with_db_path("/tmp/elsewhere.db");
        assert_eq!(config.db_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.embedding_dim, EMBEDDING_DIM);
    }
}
