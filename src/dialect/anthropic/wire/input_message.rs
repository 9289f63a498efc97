use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

use super::CacheControl;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputMessage {
    pub role: Role,
    pub content: InputMessageContent,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InputMessageContent {
    Text(String),
    Items(Vec<InputMessageStructuredContent>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMessageStructuredContent {
    Text(RequestTextBlock),
    Image(RequestImageBlock),
    Document(RequestDocumentBlock),
    SearchResult(RequestSearchResultBlock),
    Thinking(RequestThinkingBlock),
    RedactedThinking(RequestRedactedThinkingBlock),
    ToolUse(RequestToolUseBlock),
    ToolResult(RequestToolResultBlock),
    ServerToolUse(RequestToolUseBlock),
    WebSearchToolResult(RequestToolResultRefBlock),
    WebFetchToolResult(RequestToolResultRefBlock),
    CodeExecutionToolResult(RequestToolResultRefBlock),
    BashCodeExecutionToolResult(RequestToolResultRefBlock),
    TextEditorCodeExecutionToolResult(RequestToolResultRefBlock),
    McpToolUse(RequestMcpToolUseBlock),
    McpToolResult(RequestMcpToolResultBlock),
    ContainerUpload(RequestContainerUploadBlock),

    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestTextBlock {
    pub text: String,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(default)]
    pub citations: Option<Vec<Value>>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestImageBlock {
    pub source: Value,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestDocumentBlock {
    pub source: Value,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(default)]
    pub citations: Option<RequestCitationsConfig>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestCitationsConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestSearchResultBlock {
    pub content: Vec<Value>,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(default)]
    pub citations: Option<RequestCitationsConfig>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestThinkingBlock {
    pub signature: String,
    pub thinking: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestRedactedThinkingBlock {
    pub data: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestToolUseBlock {
    pub id: String,
    pub input: Value,
    pub name: String,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestToolResultBlock {
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Shared shape for the Anthropic-managed tool result blocks (web search,
/// web fetch, code execution, bash, text editor) referenced from a message —
/// they all carry `{tool_use_id, content, cache_control}` and differ only by
/// their `type` tag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestToolResultRefBlock {
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestMcpToolUseBlock {
    pub id: String,
    pub input: Value,
    pub name: String,
    pub server_name: String,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestMcpToolResultBlock {
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestContainerUploadBlock {
    pub file_id: String,
    #[serde(default)]
    pub cache_control: Option<CacheControl>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl InputMessageStructuredContent {
    /// The block's `cache_control`, if the variant carries one.
    pub fn cache_control(&self) -> Option<&CacheControl> {
        match self {
            Self::Text(b) => b.cache_control.as_ref(),
            Self::Image(b) => b.cache_control.as_ref(),
            Self::Document(b) => b.cache_control.as_ref(),
            Self::SearchResult(b) => b.cache_control.as_ref(),
            Self::ToolUse(b) | Self::ServerToolUse(b) => b.cache_control.as_ref(),
            Self::ToolResult(b) => b.cache_control.as_ref(),
            Self::WebSearchToolResult(b)
            | Self::WebFetchToolResult(b)
            | Self::CodeExecutionToolResult(b)
            | Self::BashCodeExecutionToolResult(b)
            | Self::TextEditorCodeExecutionToolResult(b) => b.cache_control.as_ref(),
            Self::McpToolUse(b) => b.cache_control.as_ref(),
            Self::McpToolResult(b) => b.cache_control.as_ref(),
            Self::ContainerUpload(b) => b.cache_control.as_ref(),
            Self::Thinking(_) | Self::RedactedThinking(_) | Self::Unknown(_) => None,
        }
    }

    pub fn clear_cache_control(&mut self) {
        self.set_cache_control(None);
    }

    pub fn set_cache_control(&mut self, value: Option<CacheControl>) {
        match self {
            Self::Text(b) => b.cache_control = value,
            Self::Image(b) => b.cache_control = value,
            Self::Document(b) => b.cache_control = value,
            Self::SearchResult(b) => b.cache_control = value,
            Self::ToolUse(b) | Self::ServerToolUse(b) => b.cache_control = value,
            Self::ToolResult(b) => b.cache_control = value,
            Self::WebSearchToolResult(b)
            | Self::WebFetchToolResult(b)
            | Self::CodeExecutionToolResult(b)
            | Self::BashCodeExecutionToolResult(b)
            | Self::TextEditorCodeExecutionToolResult(b) => b.cache_control = value,
            Self::McpToolUse(b) => b.cache_control = value,
            Self::McpToolResult(b) => b.cache_control = value,
            Self::ContainerUpload(b) => b.cache_control = value,
            Self::Thinking(_) | Self::RedactedThinking(_) | Self::Unknown(_) => {}
        }
    }

    /// A block is cacheable iff it is not a reasoning block and, if text,
    /// non-empty (`spec.md` §4.4).
    pub fn is_cacheable(&self) -> bool {
        match self {
            Self::Thinking(_) | Self::RedactedThinking(_) => false,
            Self::Text(b) => !b.text.is_empty(),
            _ => true,
        }
    }
}
