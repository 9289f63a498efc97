use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

use super::CacheControl;

/// Anthropic tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub kind: Option<ToolKind>,

    /// JSON Schema describing the tool's expected input payload.
    pub input_schema: Box<Value>,

    #[serde(default)]
    pub cache_control: Option<CacheControl>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Custom,
    #[serde(untagged)]
    Unknown(String),
}

/// Controls how the model may interact with tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto {
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    Any {
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    Tool {
        name: String,
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    None {
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    #[serde(untagged)]
    Unknown(Value),
}
