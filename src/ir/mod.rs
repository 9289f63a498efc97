//! Canonical, dialect-neutral request/response representation.
//!
//! Every `Inbound` codec parses caller-dialect wire bytes into these types;
//! every `Outbound` codec turns them into upstream-dialect wire bytes and
//! parses the upstream's response back into them. No type here knows which
//! dialect produced or will consume it.

mod cache_control;
mod message;
mod request;
mod response;
mod tool;
mod usage;

pub use cache_control::{CacheControl, CacheControlTtl};
pub use message::{
    Content, ContentPart, Message, ReasoningSignature, Role, ToolCall, ToolCallFunction,
};
pub use request::{Auth, AuthKind, RawRequest, ReasoningEffort, Request, RequestKind, ResponseFormat, StopSequences, ToolChoice};
pub use response::{Choice, ChoiceBody, Delta, FinishReason, Response, StreamEvent};
pub use tool::{Tool, ToolKind};
pub use usage::{CompletionUsageDetails, PromptUsageDetails, Usage};

use std::collections::HashMap;

/// Opaque, dialect-specific bag threaded through a round-trip so a codec can
/// stash information it needs later without widening the canonical types.
pub type TransformerMetadata = HashMap<String, serde_json::Value>;
