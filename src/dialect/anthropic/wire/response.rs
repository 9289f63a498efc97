use serde::{Deserialize, Serialize};

use crate::unknown_fields::UnknownFields;

use super::{ResponseContent, ResponseContextManagement};

/// Non-streaming Anthropic Messages API response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub role: ResponseRole,
    pub content: Vec<ResponseContent>,
    pub model: String,

    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,

    pub usage: Usage,

    #[serde(default)]
    pub context_management: Option<ResponseContextManagement>,
    #[serde(default)]
    pub container: Option<Container>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseRole {
    Assistant,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    PauseTurn,
    Refusal,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,

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

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheCreation {
    #[serde(default)]
    pub ephemeral_5m_input_tokens: Option<u32>,
    #[serde(default)]
    pub ephemeral_1h_input_tokens: Option<u32>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerToolUsage {
    #[serde(default)]
    pub web_search_requests: Option<u32>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UsageServiceTier {
    Standard,
    Priority,
    Batch,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}
