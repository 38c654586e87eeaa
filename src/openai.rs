//! OpenAI API client — chat responses, embeddings, and response helpers.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{Value, json};

use crate::config::Config;
use crate::constants::MAX_TOOL_LOOPS;
use crate::responder::LanguageModel;

/// A single tool-call extracted from an OpenAI response.
#[derive(Clone, Debug)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    pub call_id: String,
}

/// Thin wrapper around the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    pub model: String,
    pub base_url: String,
    temperature: f32,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        OpenAiClient {
            model: config.chat_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            api_key: config.openai_api_key.clone(),
            http_client: HttpClient::new(),
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn response(&self, input: &[Value], tools: Option<&[Value]>) -> Result<Value> {
        let mut body = json!({
            "model": self.model,
            "input": input,
            "temperature": self.temperature,
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = Value::Array(tools.to_vec());
            }
        }
        self.request("responses", body).await
    }

    /// Embed a batch of texts, returning one vector per input in order.
    pub async fn embeddings(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": model,
            "input": texts,
        });
        let response = self.request("embeddings", body).await?;
        parse_embeddings(&response)
    }

    async fn request(&self, path: &str, body: Value) -> Result<Value> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OpenAI key not configured (set OPENAI_API_KEY)"))?;
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let response = self
            .http_client
            .post(url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .context("send OpenAI request")?;
        let status = response.status();
        let text = response.text().await.context("read OpenAI response")?;
        let json: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({"raw": text}));
        if !status.is_success() {
            return Err(anyhow!("OpenAI error {status}: {json}"));
        }
        Ok(json)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn respond(&self, input: &[Value], tools: &[Value]) -> Result<Value> {
        self.response(input, Some(tools)).await
    }
}

/// Pull the `data[].embedding` arrays out of an embeddings response.
pub fn parse_embeddings(response: &Value) -> Result<Vec<Vec<f32>>> {
    let data = response
        .get("data")
        .and_then(|value| value.as_array())
        .ok_or_else(|| anyhow!("invalid embedding response: missing 'data'"))?;

    let mut vectors = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|value| value.as_array())
            .ok_or_else(|| anyhow!("invalid embedding item"))?;
        #[allow(clippy::cast_possible_truncation)]
        let vector = embedding
            .iter()
            .filter_map(|value| value.as_f64().map(|f| f as f32))
            .collect();
        vectors.push(vector);
    }
    Ok(vectors)
}

/// Pull the top-level `output` array from an OpenAI response.
pub fn extract_output_items(response: &Value) -> Vec<Value> {
    response
        .get("output")
        .and_then(|value| value.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Concatenate all `output_text` blocks from the output items into a single string.
pub fn extract_output_text(output_items: &[Value]) -> String {
    let mut parts = Vec::new();
    for item in output_items {
        let item_type = item.get("type").and_then(|v| v.as_str());
        if item_type != Some("message") {
            continue;
        }
        let content = match item.get("content").and_then(|v| v.as_array()) {
            Some(content) => content,
            None => continue,
        };
        for block in content {
            if block.get("type").and_then(|v| v.as_str()) == Some("output_text") {
                if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                    parts.push(text.to_string());
                }
            }
        }
    }
    parts.join("\n")
}

/// Collect all `function_call` items into structured [`ToolCall`] values.
pub fn extract_tool_calls(output_items: &[Value]) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for item in output_items {
        if item.get("type").and_then(|v| v.as_str()) != Some("function_call") {
            continue;
        }
        let name = match item.get("name").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let call_id = match item.get("call_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };
        let raw_args = item
            .get("arguments")
            .and_then(|v| v.as_str())
            .unwrap_or("{}");
        let arguments =
            serde_json::from_str(raw_args).unwrap_or_else(|_| json!({"_raw": raw_args}));
        calls.push(ToolCall {
            name,
            arguments,
            call_id,
        });
    }
    calls
}

/// Build the `function_call_output` item that answers a tool call.
pub fn tool_output_item(call_id: &str, output: &str) -> Value {
    json!({
        "type": "function_call_output",
        "call_id": call_id,
        "output": output,
    })
}

/// Returns `true` when the tool-call loop has hit the configured ceiling.
pub fn tool_loop_limit_reached(tool_loops: usize) -> bool {
    tool_loops >= MAX_TOOL_LOOPS
}
