//! Inbound codec: Gemini wire Request/Response <-> IR (`spec.md` §4.1, §4.5).
//! Grounded on `provider/google/input.rs`'s reverse tool-call-id lookup
//! pattern (there used to build `functionResponse` parts outbound; here used
//! to recover a tool's name when a caller's `functionResponse` omits one) and
//! on the Anthropic inbound codec's (`dialect/anthropic/inbound.rs`) overall
//! shape.

use futures::StreamExt;

use crate::codec::{AggregateMeta, Inbound};
use crate::ir;
use crate::stream::EventStream;

use super::thought_signature::{SENTINEL_SIGNATURE, decode_gemini_thought_signature, encode_gemini_thought_signature};
use super::wire;

#[derive(Debug, Clone, Default)]
pub struct GeminiInboundConfig;

pub struct GeminiInbound {
    #[allow(dead_code)]
    pub config: GeminiInboundConfig,
}

impl GeminiInbound {
    pub fn new(config: GeminiInboundConfig) -> Self {
        Self { config }
    }
}

impl Inbound for GeminiInbound {
    type WireRequest = wire::GenerateContentRequest;
    type WireResponse = wire::GenerateContentResponse;
    type WireStreamEvent = wire::GenerateContentResponse;

    fn transform_request(&self, wire: Self::WireRequest) -> crate::Result<ir::Request> {
        let mut messages = Vec::new();

        if let Some(system) = &wire.system_instruction {
            let text = parts_text(&system.parts);
            if !text.is_empty() {
                messages.push(ir::Message::system(text));
            }
        }

        let mut function_name_by_call_id = std::collections::HashMap::new();
        for content in &wire.contents {
            for part in &content.parts {
                if let Some(call) = &part.function_call
                    && let Some(id) = &call.id
                {
                    function_name_by_call_id.insert(id.clone(), call.name.clone());
                }
            }
        }

        for content in &wire.contents {
            messages.extend(from_wire_content(content, &function_name_by_call_id));
        }

        let tools = wire
            .tools
            .iter()
            .flatten()
            .flat_map(|tool| {
                let mut collected = Vec::new();
                if let Some(declarations) = &tool.function_declarations {
                    for declaration in declarations {
                        collected.push(ir::Tool {
                            kind: ir::ToolKind::Function,
                            name: declaration.name.clone(),
                            description: declaration.description.clone(),
                            parameters: declaration.parameters.clone(),
                            cache_control: None,
                        });
                    }
                }
                if tool.google_search.is_some() {
                    collected.push(native_tool(super::NATIVE_TOOL_GOOGLE_SEARCH));
                }
                if tool.code_execution.is_some() {
                    collected.push(native_tool(super::NATIVE_TOOL_CODE_EXECUTION));
                }
                if tool.url_context.is_some() {
                    collected.push(native_tool(super::NATIVE_TOOL_URL_CONTEXT));
                }
                collected
            })
            .collect();

        let tool_choice = wire.tool_config.as_ref().and_then(|config| {
            let calling_config = config.function_calling_config.as_ref()?;
            match calling_config.mode {
                Some(wire::FunctionCallingMode::None) => Some(ir::ToolChoice::None),
                Some(wire::FunctionCallingMode::Auto) => Some(ir::ToolChoice::Auto),
                Some(wire::FunctionCallingMode::Any) => match calling_config.allowed_function_names.as_ref().and_then(|names| names.first()) {
                    Some(name) => Some(ir::ToolChoice::Function(name.clone())),
                    None => Some(ir::ToolChoice::Required),
                },
                None => None,
            }
        });

        let generation_config = wire.generation_config.as_ref();
        let (reasoning_effort, reasoning_budget) = generation_config
            .and_then(|config| config.thinking_config.as_ref())
            .map(lift_thinking_config)
            .unwrap_or((None, None));

        Ok(ir::Request {
            kind: ir::RequestKind::Chat,
            model: String::new(),
            messages,
            max_tokens: generation_config.and_then(|c| c.max_output_tokens).map(|t| t as u32),
            max_completion_tokens: None,
            temperature: generation_config.and_then(|c| c.temperature),
            top_p: generation_config.and_then(|c| c.top_p),
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
            stop: generation_config.and_then(|c| c.stop_sequences.clone()).map(ir::StopSequences::Many),
            tools,
            tool_choice,
            response_format: None,
            stream: None,
            reasoning_effort,
            reasoning_budget,
            extra_body: None,
            auth: Some(ir::Auth {
                kind: ir::AuthKind::ApiKeyHeader,
                api_key: None,
                header_key: Some("x-goog-api-key".to_string()),
            }),
            raw_request: None,
            metadata: Default::default(),
        })
    }

    fn transform_response(&self, response: ir::Response) -> crate::Result<Self::WireResponse> {
        let candidates = response
            .choices
            .iter()
            .map(|choice| {
                let message = match &choice.body {
                    ir::ChoiceBody::Message(message) => message.clone(),
                    ir::ChoiceBody::Delta(delta) => ir::Message {
                        role: ir::Role::Assistant,
                        content: ir::Content::Text(delta.content.clone().unwrap_or_default()),
                        tool_calls: delta.tool_calls.clone(),
                        tool_call_id: None,
                        tool_call_name: None,
                        reasoning_content: delta.reasoning_content.clone(),
                        reasoning_signature: delta.reasoning_signature.clone(),
                        redacted_reasoning_content: None,
                        cache_control: None,
                    },
                };
                wire::Candidate {
                    content: Some(to_wire_content(&message)),
                    finish_reason: choice.finish_reason.map(map_finish_reason),
                    index: Some(choice.index),
                    grounding_metadata: None,
                    unknown_fields: Default::default(),
                }
            })
            .collect();

        Ok(wire::GenerateContentResponse {
            candidates,
            usage_metadata: Some(wire::UsageMetadata {
                prompt_token_count: response.usage.prompt_tokens,
                candidates_token_count: response.usage.completion_tokens - response.usage.completion_details.reasoning_tokens,
                total_token_count: response.usage.total_tokens,
                cached_content_token_count: response.usage.prompt_details.cached_tokens,
                thoughts_token_count: response.usage.completion_details.reasoning_tokens,
            }),
            model_version: Some(response.model),
            response_id: Some(response.id),
            unknown_fields: Default::default(),
        })
    }

    fn transform_stream(&self, events: EventStream<ir::Response>) -> EventStream<Self::WireStreamEvent> {
        Box::pin(events.map(|event| {
            let response = event?;
            let candidates = response
                .choices
                .iter()
                .map(|choice| {
                    let delta = match &choice.body {
                        ir::ChoiceBody::Delta(delta) => delta.clone(),
                        ir::ChoiceBody::Message(message) => ir::Delta {
                            role: Some(message.role),
                            content: message.content.as_text().map(str::to_string),
                            tool_calls: message.tool_calls.clone(),
                            reasoning_content: message.reasoning_content.clone(),
                            reasoning_signature: message.reasoning_signature.clone(),
                        },
                    };
                    let message = ir::Message {
                        role: delta.role.unwrap_or(ir::Role::Assistant),
                        content: ir::Content::Text(delta.content.unwrap_or_default()),
                        tool_calls: delta.tool_calls,
                        tool_call_id: None,
                        tool_call_name: None,
                        reasoning_content: delta.reasoning_content,
                        reasoning_signature: delta.reasoning_signature,
                        redacted_reasoning_content: None,
                        cache_control: None,
                    };
                    wire::Candidate {
                        content: Some(to_wire_content(&message)),
                        finish_reason: choice.finish_reason.map(map_finish_reason),
                        index: Some(choice.index),
                        grounding_metadata: None,
                        unknown_fields: Default::default(),
                    }
                })
                .collect();

            Ok(wire::GenerateContentResponse {
                candidates,
                usage_metadata: Some(wire::UsageMetadata {
                    prompt_token_count: response.usage.prompt_tokens,
                    candidates_token_count: response.usage.completion_tokens,
                    total_token_count: response.usage.total_tokens,
                    cached_content_token_count: response.usage.prompt_details.cached_tokens,
                    thoughts_token_count: response.usage.completion_details.reasoning_tokens,
                }),
                model_version: Some(response.model),
                response_id: Some(response.id),
                unknown_fields: Default::default(),
            })
        }))
    }

    async fn aggregate_stream_chunks(&self, mut events: EventStream<Self::WireStreamEvent>) -> crate::Result<(Self::WireResponse, AggregateMeta)> {
        let mut candidates: std::collections::BTreeMap<u32, wire::Candidate> = std::collections::BTreeMap::new();
        let mut model_version = None;
        let mut response_id = None;
        let mut usage = None;

        while let Some(chunk) = events.next().await {
            let chunk = chunk?;
            if chunk.model_version.is_some() {
                model_version = chunk.model_version;
            }
            if chunk.response_id.is_some() {
                response_id = chunk.response_id;
            }
            if chunk.usage_metadata.is_some() {
                usage = chunk.usage_metadata;
            }
            for (index, candidate) in chunk.candidates.into_iter().enumerate() {
                let key = candidate.index.unwrap_or(index as u32);
                candidates
                    .entry(key)
                    .and_modify(|existing| merge_candidate(existing, &candidate))
                    .or_insert(candidate);
            }
        }

        let response = wire::GenerateContentResponse {
            candidates: candidates.into_values().collect(),
            usage_metadata: usage.clone(),
            model_version,
            response_id: response_id.clone(),
            unknown_fields: Default::default(),
        };

        let meta = AggregateMeta {
            id: response_id,
            usage: usage.as_ref().map(|u| ir::Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count + u.thoughts_token_count,
                total_tokens: u.total_token_count,
                prompt_details: ir::PromptUsageDetails {
                    cached_tokens: u.cached_content_token_count,
                    cache_write_5m_tokens: 0,
                    cache_write_1h_tokens: 0,
                },
                completion_details: ir::CompletionUsageDetails { reasoning_tokens: u.thoughts_token_count },
            }),
        };

        Ok((response, meta))
    }
}

fn merge_candidate(existing: &mut wire::Candidate, incoming: &wire::Candidate) {
    if let Some(incoming_content) = &incoming.content {
        let content = existing.content.get_or_insert_with(|| wire::Content { role: wire::Role::Model, parts: Vec::new() });
        content.parts.extend(incoming_content.parts.clone());
    }
    if incoming.finish_reason.is_some() {
        existing.finish_reason = incoming.finish_reason;
    }
    if incoming.grounding_metadata.is_some() {
        existing.grounding_metadata = incoming.grounding_metadata.clone();
    }
}

fn native_tool(name: &str) -> ir::Tool {
    ir::Tool {
        kind: ir::ToolKind::Native(name.to_string()),
        name: name.to_string(),
        description: None,
        parameters: None,
        cache_control: None,
    }
}

fn lift_thinking_config(config: &wire::ThinkingConfig) -> (Option<ir::ReasoningEffort>, Option<u32>) {
    if let Some(level) = &config.thinking_level {
        let effort = match level.as_str() {
            "minimal" | "low" => ir::ReasoningEffort::Low,
            "medium" => ir::ReasoningEffort::Medium,
            "high" => ir::ReasoningEffort::High,
            _ => ir::ReasoningEffort::Medium,
        };
        return (Some(effort), None);
    }
    if let Some(budget) = config.thinking_budget {
        return (None, Some(budget.max(0) as u32));
    }
    (None, None)
}

fn parts_text(parts: &[wire::Part]) -> String {
    parts.iter().filter_map(|p| p.text.as_deref()).collect::<Vec<_>>().join("")
}

fn from_wire_content(content: &wire::Content, function_name_by_call_id: &std::collections::HashMap<String, String>) -> Vec<ir::Message> {
    let mut messages = Vec::new();
    let role = match content.role {
        wire::Role::Model => ir::Role::Assistant,
        wire::Role::User => ir::Role::User,
    };

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();
    let mut reasoning_signature = None;
    let mut signature_captured = false;

    for part in &content.parts {
        if let Some(response_body) = &part.function_response {
            let name = function_name_by_call_id.get(response_body.id.as_deref().unwrap_or_default()).cloned().unwrap_or_else(|| response_body.name.clone());
            messages.push(ir::Message {
                role: ir::Role::Tool,
                content: ir::Content::Text(response_body.response.to_string()),
                tool_calls: Vec::new(),
                tool_call_id: response_body.id.clone(),
                tool_call_name: Some(name),
                reasoning_content: None,
                reasoning_signature: None,
                redacted_reasoning_content: None,
                cache_control: None,
            });
            continue;
        }
        if let Some(t) = &part.text {
            if part.thought == Some(true) {
                reasoning.push_str(t);
            } else {
                text.push_str(t);
            }
        }
        if let Some(call) = &part.function_call {
            if !signature_captured
                && let Some(raw) = &part.thought_signature
                && !raw.is_empty()
                && raw != SENTINEL_SIGNATURE
            {
                reasoning_signature = Some(encode_gemini_thought_signature(raw));
                signature_captured = true;
            }
            tool_calls.push(ir::ToolCall {
                id: call.id.clone().unwrap_or_default(),
                function: ir::ToolCallFunction { name: call.name.clone(), arguments: call.args.to_string() },
                metadata: None,
            });
        }
    }

    if !text.is_empty() || !tool_calls.is_empty() || !reasoning.is_empty() {
        messages.push(ir::Message {
            role,
            content: ir::Content::Text(text),
            tool_calls,
            tool_call_id: None,
            tool_call_name: None,
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            reasoning_signature,
            redacted_reasoning_content: None,
            cache_control: None,
        });
    }

    messages
}

fn to_wire_content(message: &ir::Message) -> wire::Content {
    let role = match message.role {
        ir::Role::Assistant => wire::Role::Model,
        _ => wire::Role::User,
    };

    let mut parts = Vec::new();
    if let Some(reasoning) = &message.reasoning_content {
        parts.push(wire::Part { text: Some(reasoning.clone()), thought: Some(true), ..Default::default() });
    }
    if let Some(text) = message.content.as_text()
        && !text.is_empty()
    {
        parts.push(wire::Part { text: Some(text.to_string()), ..Default::default() });
    }

    for (index, call) in message.tool_calls.iter().enumerate() {
        let thought_signature = if index == 0 {
            Some(
                message
                    .reasoning_signature
                    .as_ref()
                    .and_then(decode_gemini_thought_signature)
                    .map(str::to_string)
                    .unwrap_or_else(|| SENTINEL_SIGNATURE.to_string()),
            )
        } else {
            None
        };
        parts.push(wire::Part {
            function_call: Some(wire::FunctionCall {
                name: call.function.name.clone(),
                args: serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Object(Default::default())),
                id: Some(call.id.clone()),
            }),
            thought_signature,
            ..Default::default()
        });
    }

    wire::Content { role, parts }
}

fn map_finish_reason(reason: ir::FinishReason) -> wire::FinishReason {
    match reason {
        ir::FinishReason::Stop => wire::FinishReason::Stop,
        ir::FinishReason::Length => wire::FinishReason::MaxTokens,
        ir::FinishReason::ToolCalls => wire::FinishReason::Stop,
        ir::FinishReason::ContentFilter => wire::FinishReason::Safety,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> GeminiInbound {
        GeminiInbound::new(GeminiInboundConfig)
    }

    #[test]
    fn lifts_thinking_level_over_budget() {
        let config = wire::ThinkingConfig {
            include_thoughts: Some(true),
            thinking_budget: Some(1000),
            thinking_level: Some("high".to_string()),
        };
        let (effort, budget) = lift_thinking_config(&config);
        assert_eq!(effort, Some(ir::ReasoningEffort::High));
        assert_eq!(budget, None);
    }

    #[test]
    fn function_response_recovers_name_from_earlier_call() {
        let wire_request = wire::GenerateContentRequest {
            contents: vec![
                wire::Content {
                    role: wire::Role::Model,
                    parts: vec![wire::Part {
                        function_call: Some(wire::FunctionCall { name: "get_weather".to_string(), args: serde_json::json!({}), id: Some("call-1".to_string()) }),
                        ..Default::default()
                    }],
                },
                wire::Content {
                    role: wire::Role::User,
                    parts: vec![wire::Part {
                        function_response: Some(wire::FunctionResponse { name: String::new(), response: serde_json::json!({"temp": 72}), id: Some("call-1".to_string()) }),
                        ..Default::default()
                    }],
                },
            ],
            system_instruction: None,
            generation_config: None,
            safety_settings: None,
            tools: None,
            tool_config: None,
            unknown_fields: Default::default(),
        };

        let request = inbound().transform_request(wire_request).unwrap();
        let tool_message = request.messages.iter().find(|m| m.role == ir::Role::Tool).unwrap();
        assert_eq!(tool_message.tool_call_name.as_deref(), Some("get_weather"));
    }
}
