//! Compile-time constants and tunables shared across the crate.

/// Application name used for the platform data directory.
pub const APP_NAME: &str = "persona-agent";

/// Persona assumed when a session has no persona-change marker.
pub const DEFAULT_PERSONA: &str = "neutral";
/// Content prefix of the `system` turn that marks a persona change.
pub const PERSONA_SENTINEL_PREFIX: &str = "Persona changed to:";
/// `chrono` format for timestamp-derived session ids.
pub const SESSION_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Default OpenAI chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Default OpenAI embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Sampling temperature for persona replies.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
/// Output dimension of the embedding model.
pub const EMBEDDING_DIM: usize = 1536;
/// Maximum number of cached query/content embeddings.
pub const EMBEDDING_CACHE_MAX: usize = 512;

/// Database file looked up in the working directory first.
pub const DB_FILE_NAME: &str = "agent-conversations.db";
/// Table holding every conversation turn.
pub const TURNS_TABLE: &str = "persona_conversations";

/// Maximum number of tool-call round-trips per chat turn.
pub const MAX_TOOL_LOOPS: usize = 6;
/// Number of matches printed by `/search`.
pub const DEFAULT_SEARCH_TOP_K: usize = 5;
/// Characters of content shown per `/search` match.
pub const SEARCH_PREVIEW_CHARS: usize = 200;

/// Web-search attempts before giving up.
pub const WEB_SEARCH_ATTEMPTS: u32 = 3;
/// Maximum number of web results handed to the model.
pub const WEB_SEARCH_MAX_RESULTS: usize = 5;
/// Timeout for tool HTTP calls.
pub const TOOL_HTTP_TIMEOUT_SECS: u64 = 10;
/// Days of forecast returned by the weather tool.
pub const FORECAST_DAYS: usize = 3;
