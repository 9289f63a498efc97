use super::CacheControl;

/// A tool the model may call, or a native provider-managed tool.
#[derive(Debug, Clone)]
pub struct Tool {
    pub kind: ToolKind,
    pub name: String,
    pub description: Option<String>,
    /// JSON-Schema document describing the function's input payload.
    /// Empty/absent for native tools that take no declared parameters.
    pub parameters: Option<serde_json::Value>,
    pub cache_control: Option<CacheControl>,
}

/// Whether this is a generic user-defined function or a provider-native
/// tool identified by its wire name (e.g. `web_search_20250305`,
/// `google_search`, `google_code_execution`, `google_url_context`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Function,
    Native(String),
}
