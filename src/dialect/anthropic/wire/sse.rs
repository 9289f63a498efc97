use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

use super::{CacheCreation, Container, Error, ResponseContent, ResponseContextManagement, ResponseRole, ServerToolUsage, StopReason, UsageServiceTier};

/// Server-sent event surface emitted by Anthropic's Messages streaming API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart(Box<StreamMessageStart>),
    ContentBlockStart { index: u32, content_block: ResponseContent },
    ContentBlockDelta { index: u32, delta: Value },
    ContentBlockStop { index: u32 },
    MessageDelta(Box<MessageDelta>),
    MessageStop,
    Ping,
    Error { error: Error },
    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelta {
    pub delta: Delta,
    #[serde(default)]
    pub usage: Option<StreamUsage>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessageStart {
    pub id: String,
    pub role: ResponseRole,
    pub content: Vec<ResponseContent>,
    pub model: String,
    pub usage: StreamUsage,

    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    #[serde(default)]
    pub context_management: Option<ResponseContextManagement>,
    #[serde(default)]
    pub container: Option<Container>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamUsage {
    #[serde(default)]
    pub input_tokens: Option<u32>,
    #[serde(default)]
    pub output_tokens: Option<u32>,
    #[serde(default)]
    pub cache_creation: Option<CacheCreation>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
    #[serde(default)]
    pub server_tool_use: Option<ServerToolUsage>,
    #[serde(default)]
    pub service_tier: Option<UsageServiceTier>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}
