use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

/// Content blocks returned by Anthropic message responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    Text(ResponseTextBlock),
    Thinking(ResponseThinkingBlock),
    RedactedThinking(ResponseRedactedThinkingBlock),
    ToolUse(ResponseToolUseBlock),
    ServerToolUse(ResponseServerToolUseBlock),
    WebSearchToolResult(ResponseToolResultBlock),
    WebFetchToolResult(ResponseToolResultBlock),
    CodeExecutionToolResult(ResponseToolResultBlock),
    BashCodeExecutionToolResult(ResponseToolResultBlock),
    TextEditorCodeExecutionToolResult(ResponseToolResultBlock),
    McpToolUse(ResponseMcpToolUseBlock),
    McpToolResult(ResponseMcpToolResultBlock),
    ContainerUpload(ResponseContainerUploadBlock),

    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTextBlock {
    pub text: String,
    #[serde(default)]
    pub citations: Option<Vec<Value>>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseThinkingBlock {
    pub signature: String,
    pub thinking: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRedactedThinkingBlock {
    pub data: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseToolUseBlock {
    pub id: String,
    pub input: Value,
    pub name: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseServerToolUseBlock {
    pub id: String,
    pub input: Value,
    pub name: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Shared shape for the Anthropic server-tool result blocks (web search,
/// web fetch, code execution, bash, text editor) — they all carry the same
/// `{content, tool_use_id}` pair and differ only by their `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseToolResultBlock {
    pub content: Value,
    pub tool_use_id: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMcpToolUseBlock {
    pub id: String,
    pub input: Value,
    pub name: String,
    pub server_name: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMcpToolResultBlock {
    pub content: Value,
    pub is_error: bool,
    pub tool_use_id: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseContainerUploadBlock {
    pub file_id: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}
