use serde::{Deserialize, Serialize};

use crate::unknown_fields::UnknownFields;

/// MCP server definition when calling Anthropic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpServerURLDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: McpServerType,

    pub url: String,

    #[serde(default)]
    pub authorization_token: Option<String>,

    #[serde(default)]
    pub tool_configuration: Option<McpServerToolConfiguration>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum McpServerType {
    Url,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpServerToolConfiguration {
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}
