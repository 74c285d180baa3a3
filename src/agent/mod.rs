//! Conversational front-end boundary.
//!
//! The hosted model owns language understanding, keyword expansion and
//! summarisation. This module only keeps the conversation, forwards it to a
//! [`ChatBackend`], and executes the tool calls the model asks for.

pub mod backend;
pub mod instructions;
pub mod tool;
pub mod wire;

use std::sync::Arc;

use tracing::{debug, info, warn};

pub use backend::{ChatBackend, OpenAiBackend};
pub use tool::{AgentTool, FetchTool, FETCH_TOOL_NAME};
pub use wire::{Role, WireMessage};

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::pipeline::Pipeline;
use wire::{ChatRequest, ToolCallWire};

/// Undo literal `\n` escapes some models emit inside markdown.
pub fn format_reply(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

/// One conversation thread. Survives failed runs.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    messages: Vec<WireMessage>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, instructions: &str) -> Self {
        Self {
            id: id.into(),
            messages: vec![WireMessage::system(instructions)],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[WireMessage] {
        &self.messages
    }

    /// User and assistant text turns in order; system and tool traffic omitted.
    pub fn transcript(&self) -> Vec<(Role, String)> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant) && !m.has_tool_calls())
            .filter_map(|m| m.content.clone().map(|c| (m.role, c)))
            .collect()
    }
}

pub struct HostedAgent {
    backend: Arc<dyn ChatBackend>,
    model: String,
    name: String,
    instructions: String,
    tools: Vec<Arc<dyn AgentTool>>,
    max_tool_rounds: usize,
}

impl HostedAgent {
    pub fn new(backend: Arc<dyn ChatBackend>, model: &str, instructions: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            name: "telegram-fetch-agent".to_string(),
            instructions: instructions.to_string(),
            tools: Vec::new(),
            max_tool_rounds: 8,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// OpenAI-compatible backend plus the fetch tool over `pipeline`.
    pub fn from_config(cfg: &AppConfig, pipeline: Arc<Pipeline>) -> anyhow::Result<Self> {
        let api_key = cfg.agent_api_key();
        if api_key.is_empty() {
            warn!("AGENT_API_KEY is not set; agent runs will fail until it is");
        }
        let backend = OpenAiBackend::new(&cfg.agent.endpoint, &api_key)?;
        let instructions =
            instructions::load_instructions(cfg.agent.instructions_path.as_deref())?;
        info!(
            agent = %cfg.agent.name,
            model = %cfg.agent.model,
            key_len = api_key.len(),
            "agent configured"
        );
        Ok(Self::new(Arc::new(backend), &cfg.agent.model, &instructions)
            .with_name(&cfg.agent.name)
            .with_tool(Arc::new(FetchTool::new(pipeline)))
            .with_max_tool_rounds(cfg.agent.max_tool_rounds))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_conversation(&self) -> Conversation {
        Conversation::new(uuid::Uuid::new_v4().to_string(), &self.instructions)
    }

    /// Run one user turn to completion.
    ///
    /// Returns the assistant's reply (`None` when the model answered with no
    /// text). On error the conversation is rolled back to just after the user
    /// message, so the thread stays usable.
    pub async fn run_turn(
        &self,
        conv: &mut Conversation,
        user_text: &str,
    ) -> Result<Option<String>, AgentError> {
        conv.messages.push(WireMessage::user(user_text));
        let checkpoint = conv.messages.len();

        let outcome = self.drive(conv).await;
        if outcome.is_err() {
            conv.messages.truncate(checkpoint);
        }
        outcome
    }

    async fn drive(&self, conv: &mut Conversation) -> Result<Option<String>, AgentError> {
        let defs: Vec<_> = self.tools.iter().map(|t| t.definition()).collect();

        for round in 0..=self.max_tool_rounds {
            let request = ChatRequest::new(&self.model)
                .messages(conv.messages.iter().cloned())
                .tools(defs.iter().cloned());
            let response = self.backend.complete(&request).await?;
            let message = response
                .choices
                .into_iter()
                .next()
                .map(|c| c.message)
                .ok_or_else(|| AgentError::Malformed("no choices in response".into()))?;

            if message.has_tool_calls() {
                if round == self.max_tool_rounds {
                    break;
                }
                let calls = message.tool_calls.clone().unwrap_or_default();
                conv.messages.push(message);
                for call in &calls {
                    let result = self.execute(call).await;
                    conv.messages.push(WireMessage::tool(&call.id, result));
                }
                continue;
            }

            let reply = message
                .content
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(format_reply);
            conv.messages.push(message);
            return Ok(reply);
        }

        Err(AgentError::ToolRounds(self.max_tool_rounds))
    }

    /// Tool failures are reported back to the model as text, never raised.
    async fn execute(&self, call: &ToolCallWire) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.function.name) else {
            warn!(tool = %call.function.name, "unknown tool requested");
            return format!("Error: unknown tool '{}'", call.function.name);
        };

        let args: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, tool = %call.function.name, "tool arguments are not JSON");
                return format!("Error: invalid arguments: {e}");
            }
        };
        debug!(tool = %call.function.name, "executing tool call");

        match tool.call(args).await {
            Ok(v) => serde_json::to_string(&v).unwrap_or_else(|e| format!("Error: {e}")),
            Err(e) => {
                warn!(error = ?e, tool = %call.function.name, "tool call failed");
                format!("Error: {e:#}")
            }
        }
    }
}
