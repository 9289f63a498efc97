use super::{CacheControl, TransformerMetadata};

/// Role of a message in the canonical conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: either a bare string or an ordered sequence of typed
/// parts. Inbound codecs normalise single-text-block arrays down to `Text`
/// where the dialect allows it; the cache planner's normalisation pre-pass
/// goes the other direction for Anthropic specifically.
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Parts(_) => None,
        }
    }

    /// Concatenation of every text-bearing part, ignoring images/documents.
    pub fn text_concat(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text {
        text: String,
        cache_control: Option<CacheControl>,
    },
    ImageUrl {
        /// Either a `data:` URL or a remote URL.
        url: String,
        cache_control: Option<CacheControl>,
    },
    Document {
        /// Either a `data:` URL or a remote URL, same convention as images.
        url: String,
        media_type: Option<String>,
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
        cache_control: Option<CacheControl>,
    },
}

impl ContentPart {
    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            ContentPart::Text { cache_control, .. }
            | ContentPart::ImageUrl { cache_control, .. }
            | ContentPart::Document { cache_control, .. }
            | ContentPart::ToolResult { cache_control, .. } => *cache_control,
        }
    }

    pub fn set_cache_control(&mut self, value: Option<CacheControl>) {
        match self {
            ContentPart::Text { cache_control, .. }
            | ContentPart::ImageUrl { cache_control, .. }
            | ContentPart::Document { cache_control, .. }
            | ContentPart::ToolResult { cache_control, .. } => *cache_control = value,
        }
    }

    /// A block is cacheable iff it is not a reasoning block and, if textual,
    /// non-empty. All `ContentPart` variants here are non-reasoning by
    /// construction (reasoning lives on `Message`, not on a part) so this is
    /// simply "not empty text".
    pub fn is_cacheable(&self) -> bool {
        match self {
            ContentPart::Text { text, .. } => !text.is_empty(),
            _ => true,
        }
    }
}

/// Opaque signature echoed back to a provider to preserve chain-of-thought
/// integrity across turns. May wrap a Gemini `thoughtSignature` (see
/// `dialect::gemini::thought_signature`) or an Anthropic-origin value;
/// dialect codecs are responsible for not confusing the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningSignature(pub String);

#[derive(Debug, Clone)]
pub struct ToolCallFunction {
    pub name: String,
    /// Raw JSON-encoded arguments, as emitted/consumed by the provider.
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub function: ToolCallFunction,
    /// Per-call opaque metadata; per §4.5 this stays nil/empty for every
    /// call except the one that legitimately carries a Gemini signature.
    pub metadata: Option<TransformerMetadata>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
    pub tool_call_name: Option<String>,

    pub reasoning_content: Option<String>,
    pub reasoning_signature: Option<ReasoningSignature>,
    pub redacted_reasoning_content: Option<String>,

    pub cache_control: Option<CacheControl>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_call_name: None,
            reasoning_content: None,
            reasoning_signature: None,
            redacted_reasoning_content: None,
            cache_control: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_call_name: None,
            reasoning_content: None,
            reasoning_signature: None,
            redacted_reasoning_content: None,
            cache_control: None,
        }
    }
}
