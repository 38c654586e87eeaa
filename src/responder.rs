//! Reply generation — persona prompt + history in, text out, with a bounded
//! tool-call loop in between.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::constants::MAX_TOOL_LOOPS;
use crate::openai::{
    extract_output_items, extract_output_text, extract_tool_calls, tool_loop_limit_reached,
    tool_output_item,
};
use crate::session::ChatMessage;
use crate::tools::ToolSet;

/// One round-trip to a Responses-style model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn respond(&self, input: &[Value], tools: &[Value]) -> Result<Value>;
}

/// Produces the assistant reply for one user message.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Whether replies may call tools.
    fn tools_available(&self) -> bool {
        false
    }

    async fn reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        input: &str,
    ) -> Result<String>;
}

/// Model plus tools, running function calls until the model answers in text.
pub struct ToolAgent<M> {
    model: M,
    tools: ToolSet,
}

impl<M: LanguageModel> ToolAgent<M> {
    pub fn new(model: M, tools: ToolSet) -> Self {
        Self { model, tools }
    }
}

/// Responses-API input: system prompt, prior messages, then the new message.
pub fn build_input(system_prompt: &str, history: &[ChatMessage], input: &str) -> Vec<Value> {
    let mut items = Vec::with_capacity(history.len() + 2);
    items.push(json!({"role": "system", "content": system_prompt}));
    for message in history {
        items.push(json!({"role": message.role.as_str(), "content": message.content}));
    }
    items.push(json!({"role": "user", "content": input}));
    items
}

#[async_trait]
impl<M: LanguageModel> Responder for ToolAgent<M> {
    fn tools_available(&self) -> bool {
        !self.tools.is_empty()
    }

    async fn reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        input: &str,
    ) -> Result<String> {
        let mut items = build_input(system_prompt, history, input);
        let definitions = self.tools.definitions();
        let mut tool_loops = 0;

        loop {
            let response = self.model.respond(&items, &definitions).await?;
            let output = extract_output_items(&response);
            let calls = extract_tool_calls(&output);
            if calls.is_empty() {
                let text = extract_output_text(&output);
                if text.trim().is_empty() {
                    return Ok("(no output)".to_string());
                }
                return Ok(text);
            }

            if tool_loop_limit_reached(tool_loops) {
                bail!("model kept calling tools after {MAX_TOOL_LOOPS} rounds");
            }
            tool_loops += 1;

            // The function_call items must precede their outputs.
            items.extend(
                output
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
                    .cloned(),
            );
            for call in &calls {
                let result = self.tools.dispatch(&call.name, &call.arguments).await;
                tracing::debug!(tool = %call.name, chars = result.len(), "tool finished");
                items.push(tool_output_item(&call.call_id, &result));
            }
        }
    }
}
