use super::{Message, Tool, TransformerMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Chat,
    Image,
    Other,
}

/// `stop` accepted either as a single string or a list, preserved as given
/// so an outbound codec can re-emit it the way the upstream expects.
#[derive(Debug, Clone)]
pub enum StopSequences {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { name: Option<String>, schema: serde_json::Value },
}

/// Auth material threaded from the caller (or a per-request resolver) down
/// to the outbound codec, which materialises it into a wire header exactly
/// once and then clears it so downstream observers never see it twice.
#[derive(Debug, Clone)]
pub struct Auth {
    pub kind: AuthKind,
    pub api_key: Option<secrecy::SecretString>,
    pub header_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Bearer,
    ApiKeyHeader,
}

/// Inbound request context used for dialect-specific header preservation
/// (e.g. recognising an existing Claude CLI `User-Agent`, or forwarding
/// headers through the outbound hygiene allowlist in `http::header`).
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub headers: http::HeaderMap,
    pub query: Vec<(String, String)>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub kind: RequestKind,
    pub model: String,
    pub messages: Vec<Message>,

    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub stop: Option<StopSequences>,

    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,

    pub response_format: Option<ResponseFormat>,
    pub stream: Option<bool>,

    pub reasoning_effort: Option<ReasoningEffort>,
    /// An explicit token budget always overrides `reasoning_effort`'s
    /// default bucketing when both are present.
    pub reasoning_budget: Option<u32>,

    pub extra_body: Option<serde_json::Value>,
    pub auth: Option<Auth>,
    pub raw_request: Option<RawRequest>,
    pub metadata: TransformerMetadata,
}

impl Request {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.model.trim().is_empty() {
            return Err(crate::Error::invalid_request("model must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(crate::Error::invalid_request("messages must not be empty"));
        }
        if let Some(max_tokens) = self.max_tokens
            && max_tokens == 0
        {
            return Err(crate::Error::invalid_request("max_tokens must be positive when set"));
        }
        Ok(())
    }
}
