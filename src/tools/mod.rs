//! Tools the responder may call — live web search and weather lookups.
//!
//! | Module       | Tool          | Backend                        |
//! |--------------|---------------|--------------------------------|
//! | `web_search` | `web_search`  | DuckDuckGo Lite HTML           |
//! | `weather`    | `get_weather` | Open-Meteo geocoding + forecast|

pub mod weather;
pub mod web_search;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::Config;

pub use self::weather::WeatherTool;
pub use self::web_search::WebSearchTool;

/// A capability exposed to the model through function calling.
///
/// `execute` never fails: problems are reported back to the model as text
/// so the conversation can carry on.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in LLM function calling)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: &Value) -> String;

    /// Responses-API function definition.
    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters_schema(),
        })
    }
}

/// The tools offered on every chat turn.
#[derive(Default)]
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tools enabled in `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut set = Self::new();
        if config.web_search_enabled {
            set.register(Box::new(WebSearchTool::new()));
        }
        if config.weather_enabled {
            set.register(Box::new(WeatherTool::new()));
        }
        set
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Run the tool called `name`.
    pub async fn dispatch(&self, name: &str, args: &Value) -> String {
        match self.tools.iter().find(|tool| tool.name() == name) {
            Some(tool) => {
                tracing::debug!(tool = name, %args, "running tool");
                tool.execute(args).await
            }
            None => format!("Unknown tool: {name}. Available: {}", self.names().join(", ")),
        }
    }
}

/// Read a required string argument, trimmed.
pub(crate) fn string_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeat the input"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, args: &Value) -> String {
            string_arg(args, "text").to_string()
        }
    }

    #[test]
    fn definition_uses_responses_function_shape() {
        let def = EchoTool.definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["name"], "echo");
        assert_eq!(def["parameters"]["required"][0], "text");
    }

    #[tokio::test]
    async fn dispatch_routes_by_name() {
        let mut set = ToolSet::new();
        set.register(Box::new(EchoTool));
        assert_eq!(set.dispatch("echo", &json!({"text": "  ahoy "})).await, "ahoy");
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_tool() {
        let mut set = ToolSet::new();
        set.register(Box::new(EchoTool));
        let out = set.dispatch("launch_rocket", &json!({})).await;
        assert!(out.starts_with("Unknown tool: launch_rocket"));
        assert!(out.contains("echo"));
    }

    #[test]
    fn from_config_respects_disable_flags() {
        let mut config = Config::from_env();
        config.web_search_enabled = true;
        config.weather_enabled = false;
        let set = ToolSet::from_config(&config);
        assert_eq!(set.names(), vec!["web_search"]);

        config.web_search_enabled = false;
        assert!(ToolSet::from_config(&config).is_empty());
    }
}
