use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

/// Context management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextManagementConfig {
    /// Ordered list of context edits to apply before running the request.
    #[serde(default)]
    pub edits: Vec<ClearToolUses20250919>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Clear tool uses edit (2025-09-19 release).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClearToolUses20250919 {
    #[serde(default)]
    pub clear_at_least: Option<InputTokensClearAtLeast>,

    #[serde(default)]
    pub clear_tool_inputs: Option<ClearToolInputs>,

    #[serde(default)]
    pub exclude_tools: Option<Vec<String>>,

    #[serde(default)]
    pub keep: Option<ToolUsesKeep>,

    #[serde(default)]
    pub trigger: Option<ContextManagementTrigger>,

    #[serde(rename = "type", default)]
    pub kind: ClearToolUsesType,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Context management details returned in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseContextManagement {
    pub applied_edits: Vec<ResponseClearToolUses20250919Edit>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseClearToolUses20250919Edit {
    pub cleared_input_tokens: u32,
    pub cleared_tool_uses: u32,

    #[serde(rename = "type", default)]
    pub kind: ClearToolUsesType,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Default, Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClearToolUsesType {
    #[default]
    ClearToolUses20250919,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClearToolInputs {
    Flag(bool),
    Tools(Vec<String>),
    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputTokensClearAtLeast {
    pub value: u32,

    #[serde(default, rename = "type")]
    pub kind: InputTokensKind,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Default, Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputTokensKind {
    #[default]
    InputTokens,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolUsesKeep {
    pub value: u32,

    #[serde(default, rename = "type")]
    pub kind: ToolUsesKind,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Default, Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolUsesKind {
    #[default]
    ToolUses,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextManagementTrigger {
    InputTokens {
        value: u32,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    ToolUses {
        value: u32,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    #[serde(untagged)]
    Unknown(Value),
}
