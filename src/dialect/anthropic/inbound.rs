//! Inbound codec: Anthropic wire Request -> IR, IR Response -> Anthropic
//! wire Response/stream, including the Claude Code superset (`spec.md`
//! §4.1, §6 "Claude Code superset"). Grounded on `protocol/anthropic`'s
//! wire shapes and `proxy/anthropic.rs`'s request-preprocessing role, since
//! `protocol/anthropic` itself was never wired into the teacher's own
//! `lib.rs` (dead code there) — this module is where it finally gets used.

use crate::codec::{AggregateMeta, Inbound};
use crate::ir;
use crate::stream::EventStream;

use super::wire;
use super::{CLAUDE_CODE_METADATA_KEY, CLAUDE_CODE_SYSTEM_PROMPT};

#[derive(Debug, Clone, Default)]
pub struct AnthropicInboundConfig {
    /// When true, every request through this codec is treated as a Claude
    /// Code client regardless of its `User-Agent` (used by tests and by
    /// deployments that only ever serve the CLI).
    pub force_claude_code: bool,
}

pub struct AnthropicInbound {
    pub config: AnthropicInboundConfig,
}

impl AnthropicInbound {
    pub fn new(config: AnthropicInboundConfig) -> Self {
        Self { config }
    }

    fn looks_like_claude_code(&self, request: &wire::Request) -> bool {
        if self.config.force_claude_code {
            return true;
        }
        request
            .unknown_fields
            .get("__claude_code")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

impl Inbound for AnthropicInbound {
    type WireRequest = wire::Request;
    type WireResponse = wire::Response;
    type WireStreamEvent = wire::StreamEvent;

    fn transform_request(&self, mut wire: wire::Request) -> crate::Result<ir::Request> {
        let is_claude_code = self.looks_like_claude_code(&wire);
        if is_claude_code {
            inject_claude_code_system_prompt(&mut wire);
        }

        let mut messages = Vec::new();

        if let Some(system) = &wire.system {
            for text in system_prompt_texts(system) {
                messages.push(ir::Message::system(text));
            }
        }

        for message in &wire.messages {
            messages.push(from_wire_message(message));
        }

        let tools = wire
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(from_wire_tool).collect())
            .unwrap_or_default();

        let auth = Some(ir::Auth {
            kind: if is_claude_code { ir::AuthKind::Bearer } else { ir::AuthKind::ApiKeyHeader },
            api_key: None,
            header_key: None,
        });

        Ok(ir::Request {
            kind: ir::RequestKind::Chat,
            model: wire.model.clone(),
            messages,
            max_tokens: Some(wire.max_tokens),
            max_completion_tokens: None,
            temperature: wire.temperature,
            top_p: wire.top_p,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
            stop: wire.stop_sequences.take().map(ir::StopSequences::Many),
            tools,
            tool_choice: wire.tool_choice.as_ref().map(from_wire_tool_choice),
            response_format: None,
            stream: wire.stream,
            reasoning_effort: None,
            reasoning_budget: match &wire.thinking {
                Some(wire::ThinkingConfig::Enabled { budget_tokens, .. }) => Some(*budget_tokens),
                _ => None,
            },
            extra_body: None,
            auth,
            raw_request: None,
            metadata: ir::TransformerMetadata::from([(CLAUDE_CODE_METADATA_KEY.to_string(), serde_json::Value::Bool(is_claude_code))]),
        })
    }

    fn transform_response(&self, response: ir::Response) -> crate::Result<wire::Response> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| crate::Error::decode("response has no choices"))?;

        let ir::ChoiceBody::Message(message) = &choice.body else {
            return Err(crate::Error::decode("expected a complete message, not a delta"));
        };

        let mut content = Vec::new();
        if let Some(reasoning) = &message.reasoning_content {
            content.push(wire::ResponseContent::Thinking(wire::ResponseThinkingBlock {
                thinking: reasoning.clone(),
                signature: message.reasoning_signature.as_ref().map(|s| s.0.clone()).unwrap_or_default(),
                unknown_fields: Default::default(),
            }));
        }
        match &message.content {
            ir::Content::Text(text) if !text.is_empty() => content.push(wire::ResponseContent::Text(wire::ResponseTextBlock {
                text: text.clone(),
                citations: None,
                unknown_fields: Default::default(),
            })),
            ir::Content::Parts(parts) => {
                for part in parts {
                    if let ir::ContentPart::Text { text, .. } = part {
                        content.push(wire::ResponseContent::Text(wire::ResponseTextBlock {
                            text: text.clone(),
                            citations: None,
                            unknown_fields: Default::default(),
                        }));
                    }
                }
            }
            _ => {}
        }
        for call in &message.tool_calls {
            content.push(wire::ResponseContent::ToolUse(wire::ResponseToolUseBlock {
                id: call.id.clone(),
                input: serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null),
                name: call.function.name.clone(),
                unknown_fields: Default::default(),
            }));
        }

        Ok(wire::Response {
            id: response.id,
            role: wire::ResponseRole::Assistant,
            content,
            model: response.model,
            stop_reason: choice.finish_reason.map(to_wire_stop_reason),
            stop_sequence: None,
            usage: to_wire_usage(&response.usage),
            context_management: None,
            container: None,
            unknown_fields: Default::default(),
        })
    }

    fn transform_stream(&self, events: EventStream<ir::Response>) -> EventStream<wire::StreamEvent> {
        use futures::StreamExt;

        Box::pin(events.map(|event| {
            let response = event?;
            let choice = response
                .choices
                .first()
                .ok_or_else(|| crate::Error::decode("stream chunk has no choices"))?;

            let ir::ChoiceBody::Delta(delta) = &choice.body else {
                return Err(crate::Error::decode("expected a delta, not a complete message"));
            };

            if !response.id.is_empty() && response.model != "" {
                return Ok(wire::StreamEvent::MessageStart(Box::new(wire::StreamMessageStart {
                    id: response.id,
                    role: wire::ResponseRole::Assistant,
                    content: Vec::new(),
                    model: response.model,
                    usage: to_wire_stream_usage(&response.usage),
                    stop_reason: None,
                    stop_sequence: None,
                    context_management: None,
                    container: None,
                    unknown_fields: Default::default(),
                })));
            }

            let mut delta_value = serde_json::Map::new();
            if let Some(text) = &delta.content {
                delta_value.insert("type".to_string(), serde_json::Value::String("text_delta".to_string()));
                delta_value.insert("text".to_string(), serde_json::Value::String(text.clone()));
            }
            if let Some(reasoning) = &delta.reasoning_content {
                delta_value.insert("type".to_string(), serde_json::Value::String("thinking_delta".to_string()));
                delta_value.insert("thinking".to_string(), serde_json::Value::String(reasoning.clone()));
            }

            Ok(wire::StreamEvent::ContentBlockDelta {
                index: choice.index,
                delta: serde_json::Value::Object(delta_value),
            })
        }))
    }

    async fn aggregate_stream_chunks(&self, events: EventStream<wire::StreamEvent>) -> crate::Result<(wire::Response, AggregateMeta)> {
        use futures::StreamExt;
        let mut events = events;

        let mut id = None;
        let mut model = String::new();
        let mut content = Vec::new();
        let mut usage = wire::Usage {
            input_tokens: 0,
            output_tokens: 0,
            cache_creation: None,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
            server_tool_use: None,
            service_tier: None,
            unknown_fields: Default::default(),
        };

        while let Some(event) = events.next().await {
            match event? {
                wire::StreamEvent::MessageStart(start) => {
                    id = Some(start.id);
                    model = start.model;
                    usage = stream_usage_to_usage(&start.usage);
                }
                wire::StreamEvent::ContentBlockStart { content_block, .. } => content.push(content_block),
                _ => {}
            }
        }

        Ok((
            wire::Response {
                id: id.clone().unwrap_or_else(|| "msg_unknown".to_string()),
                role: wire::ResponseRole::Assistant,
                content,
                model,
                stop_reason: None,
                stop_sequence: None,
                usage,
                context_management: None,
                container: None,
                unknown_fields: Default::default(),
            },
            AggregateMeta { id, usage: None },
        ))
    }
}

fn system_prompt_texts(system: &wire::SystemPrompt) -> Vec<String> {
    match system {
        wire::SystemPrompt::Text(text) => vec![text.clone()],
        wire::SystemPrompt::Blocks(parts) => parts
            .iter()
            .filter_map(|p| match p {
                wire::SystemInputMessage::Text(block) => Some(block.text.clone()),
                wire::SystemInputMessage::Unknown(_) => None,
            })
            .collect(),
    }
}

/// Prepends the Claude Code system prompt unless it already appears
/// anywhere in the (normalised) system-message list (`spec.md` §9 "open
/// question: claude-code system-message injection idempotence" — this
/// crate scans the full list rather than just the first element, which
/// also makes re-running this function idempotent).
fn inject_claude_code_system_prompt(wire: &mut wire::Request) {
    let mut parts = match wire.system.take() {
        Some(wire::SystemPrompt::Text(text)) => vec![wire::SystemInputMessage::Text(wire::RequestTextBlock {
            text,
            cache_control: None,
            citations: None,
            unknown_fields: Default::default(),
        })],
        Some(wire::SystemPrompt::Blocks(parts)) => parts,
        None => Vec::new(),
    };

    let already_present = parts
        .iter()
        .any(|p| matches!(p, wire::SystemInputMessage::Text(b) if b.text == CLAUDE_CODE_SYSTEM_PROMPT));

    if !already_present {
        parts.insert(
            0,
            wire::SystemInputMessage::Text(wire::RequestTextBlock {
                text: CLAUDE_CODE_SYSTEM_PROMPT.to_string(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }),
        );
    }

    wire.system = Some(wire::SystemPrompt::Blocks(parts));
}

fn from_wire_message(message: &wire::InputMessage) -> ir::Message {
    let role = match message.role {
        wire::Role::Assistant => ir::Role::Assistant,
        _ => ir::Role::User,
    };

    let mut result = ir::Message::user(String::new());
    result.role = role;

    let wire::InputMessageContent::Items(blocks) = &message.content else {
        if let wire::InputMessageContent::Text(text) = &message.content {
            result.content = ir::Content::Text(text.clone());
        }
        return result;
    };

    let mut parts = Vec::new();
    for block in blocks {
        match block {
            wire::InputMessageStructuredContent::Text(b) => parts.push(ir::ContentPart::Text {
                text: b.text.clone(),
                cache_control: b.cache_control.clone().and_then(Into::into),
            }),
            wire::InputMessageStructuredContent::ToolUse(b) => result.tool_calls.push(ir::ToolCall {
                id: b.id.clone(),
                function: ir::ToolCallFunction {
                    name: b.name.clone(),
                    arguments: b.input.to_string(),
                },
                metadata: None,
            }),
            wire::InputMessageStructuredContent::ToolResult(b) => {
                result.tool_call_id = Some(b.tool_use_id.clone());
                if let Some(content) = &b.content {
                    parts.push(ir::ContentPart::ToolResult {
                        tool_call_id: b.tool_use_id.clone(),
                        content: content.to_string(),
                        is_error: b.is_error.unwrap_or(false),
                        cache_control: b.cache_control.clone().and_then(Into::into),
                    });
                }
            }
            wire::InputMessageStructuredContent::Thinking(b) => {
                result.reasoning_content = Some(b.thinking.clone());
                result.reasoning_signature = Some(ir::ReasoningSignature(b.signature.clone()));
            }
            wire::InputMessageStructuredContent::RedactedThinking(b) => {
                result.redacted_reasoning_content = Some(b.data.clone());
            }
            _ => {}
        }
    }
    result.content = ir::Content::Parts(parts);
    result
}

fn from_wire_tool(tool: &wire::Tool) -> ir::Tool {
    let kind = match &tool.kind {
        Some(wire::ToolKind::Unknown(name)) => ir::ToolKind::Native(name.clone()),
        _ => ir::ToolKind::Function,
    };
    ir::Tool {
        kind,
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some((*tool.input_schema).clone()),
        cache_control: tool.cache_control.clone().and_then(Into::into),
    }
}

fn from_wire_tool_choice(choice: &wire::ToolChoice) -> ir::ToolChoice {
    match choice {
        wire::ToolChoice::Auto { .. } => ir::ToolChoice::Auto,
        wire::ToolChoice::Any { .. } => ir::ToolChoice::Required,
        wire::ToolChoice::Tool { name, .. } => ir::ToolChoice::Function(name.clone()),
        wire::ToolChoice::None { .. } => ir::ToolChoice::None,
        wire::ToolChoice::Unknown(_) => ir::ToolChoice::Auto,
    }
}

fn to_wire_stop_reason(reason: ir::FinishReason) -> wire::StopReason {
    match reason {
        ir::FinishReason::Stop => wire::StopReason::EndTurn,
        ir::FinishReason::Length => wire::StopReason::MaxTokens,
        ir::FinishReason::ToolCalls => wire::StopReason::ToolUse,
        ir::FinishReason::ContentFilter => wire::StopReason::Refusal,
    }
}

fn to_wire_usage(usage: &ir::Usage) -> wire::Usage {
    wire::Usage {
        input_tokens: usage.prompt_tokens.saturating_sub(usage.prompt_details.cached_tokens),
        output_tokens: usage.completion_tokens,
        cache_creation: Some(wire::CacheCreation {
            ephemeral_5m_input_tokens: Some(usage.prompt_details.cache_write_5m_tokens),
            ephemeral_1h_input_tokens: Some(usage.prompt_details.cache_write_1h_tokens),
            unknown_fields: Default::default(),
        }),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: Some(usage.prompt_details.cached_tokens),
        server_tool_use: None,
        service_tier: None,
        unknown_fields: Default::default(),
    }
}

fn to_wire_stream_usage(usage: &ir::Usage) -> wire::StreamUsage {
    wire::StreamUsage {
        input_tokens: Some(usage.prompt_tokens.saturating_sub(usage.prompt_details.cached_tokens)),
        output_tokens: Some(usage.completion_tokens),
        cache_creation: Some(wire::CacheCreation {
            ephemeral_5m_input_tokens: Some(usage.prompt_details.cache_write_5m_tokens),
            ephemeral_1h_input_tokens: Some(usage.prompt_details.cache_write_1h_tokens),
            unknown_fields: Default::default(),
        }),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: Some(usage.prompt_details.cached_tokens),
        server_tool_use: None,
        service_tier: None,
        unknown_fields: Default::default(),
    }
}

fn stream_usage_to_usage(usage: &wire::StreamUsage) -> wire::Usage {
    wire::Usage {
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cache_creation: usage.cache_creation.clone(),
        cache_creation_input_tokens: usage.cache_creation_input_tokens,
        cache_read_input_tokens: usage.cache_read_input_tokens,
        server_tool_use: usage.server_tool_use.clone(),
        service_tier: usage.service_tier.clone(),
        unknown_fields: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_wire_request() -> wire::Request {
        wire::Request {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![wire::InputMessage {
                role: wire::Role::User,
                content: wire::InputMessageContent::Text("hi".to_string()),
                unknown_fields: Default::default(),
            }],
            max_tokens: 1024,
            system: None,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            stream: None,
            metadata: None,
            tools: None,
            tool_choice: None,
            container: None,
            context_management: None,
            mcp_servers: None,
            service_tier: None,
            thinking: None,
            unknown_fields: Default::default(),
        }
    }

    #[test]
    fn claude_code_injection_prepends_system_prompt_once() {
        let inbound = AnthropicInbound::new(AnthropicInboundConfig { force_claude_code: true });
        let request = base_wire_request();
        let ir_request = inbound.transform_request(request).unwrap();
        let system_messages: Vec<_> = ir_request.messages.iter().filter(|m| m.role == ir::Role::System).collect();
        assert_eq!(system_messages.len(), 1);
        assert_eq!(system_messages[0].content.as_text(), Some(CLAUDE_CODE_SYSTEM_PROMPT));
    }

    #[test]
    fn claude_code_injection_is_idempotent_when_already_present() {
        let inbound = AnthropicInbound::new(AnthropicInboundConfig { force_claude_code: true });
        let mut request = base_wire_request();
        request.system = Some(wire::SystemPrompt::Blocks(vec![wire::SystemInputMessage::Text(wire::RequestTextBlock {
            text: CLAUDE_CODE_SYSTEM_PROMPT.to_string(),
            cache_control: None,
            citations: None,
            unknown_fields: Default::default(),
        })]));
        let ir_request = inbound.transform_request(request).unwrap();
        let system_messages: Vec<_> = ir_request.messages.iter().filter(|m| m.role == ir::Role::System).collect();
        assert_eq!(system_messages.len(), 1);
    }

    #[test]
    fn forces_bearer_auth_for_claude_code() {
        let inbound = AnthropicInbound::new(AnthropicInboundConfig { force_claude_code: true });
        let ir_request = inbound.transform_request(base_wire_request()).unwrap();
        assert_eq!(ir_request.auth.unwrap().kind, ir::AuthKind::Bearer);
    }

    #[test]
    fn non_claude_code_uses_api_key_header_auth() {
        let inbound = AnthropicInbound::new(AnthropicInboundConfig::default());
        let ir_request = inbound.transform_request(base_wire_request()).unwrap();
        assert_eq!(ir_request.auth.unwrap().kind, ir::AuthKind::ApiKeyHeader);
    }
}
