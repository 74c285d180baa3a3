//! Tools the hosted agent may call.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::wire::ToolDefinitionWire;
use crate::pipeline::Pipeline;

pub const FETCH_TOOL_NAME: &str = "fetch_channel_messages";

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;
    async fn call(&self, args: Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinitionWire {
        ToolDefinitionWire::function(self.name(), self.description(), self.parameters())
    }
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    keywords: Vec<String>,
    #[serde(default)]
    message_limit: Option<usize>,
}

/// Exposes [`Pipeline::fetch_and_filter`] as a callable tool.
pub struct FetchTool {
    pipeline: Arc<Pipeline>,
}

impl FetchTool {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl AgentTool for FetchTool {
    fn name(&self) -> &str {
        FETCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetch the most recent messages of the monitored Telegram channels and return \
         those matching any keyword (case-insensitive). Messages from a channel whose \
         name appears in a keyword are always returned."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "All keyword variants to match, in any language."
                },
                "message_limit": {
                    "type": "integer",
                    "minimum": 1,
                    "default": self.pipeline.default_limit(),
                    "description": "Messages to read per channel."
                }
            },
            "required": ["keywords"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value> {
        if args.is_null() {
            return Err(anyhow!("missing arguments: expected {{\"keywords\": [...]}}"));
        }
        let args: FetchArgs =
            serde_json::from_value(args).context("invalid fetch_channel_messages arguments")?;
        let result = self
            .pipeline
            .fetch_and_filter(&args.keywords, args.message_limit)
            .await?;
        Ok(serde_json::to_value(result)?)
    }
}
