use super::{Message, TransformerMetadata, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Partial message shape used by streaming choices; every field is optional
/// because a single chunk usually only updates one of them.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub role: Option<super::Role>,
    pub content: Option<String>,
    pub tool_calls: Vec<super::ToolCall>,
    pub reasoning_content: Option<String>,
    pub reasoning_signature: Option<super::ReasoningSignature>,
}

#[derive(Debug, Clone)]
pub enum ChoiceBody {
    Message(Message),
    Delta(Delta),
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub index: u32,
    pub body: ChoiceBody,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub created: i64,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub metadata: TransformerMetadata,
}

/// A single decoded wire event, as produced by the SSE decoder in
/// `crate::stream::sse` before any dialect transformation is applied.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub last_event_id: Option<String>,
    pub event_type: Option<String>,
    pub data: bytes::Bytes,
}
