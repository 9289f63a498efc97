//! Outbound codec: IR Request -> OpenAI-compatible wire Request, and wire
//! Response/stream -> IR (`spec.md` §4.2, §4.6, §6). Grounded on
//! `messages/unified/to_openai.rs` and `from_openai.rs` for the field-level
//! mapping, and on `provider/openai.rs`'s streaming loop for the `[DONE]`
//! sentinel and per-chunk JSON parsing.

use futures::StreamExt;
use secrecy::ExposeSecret;

use crate::codec::{AggregateMeta, Outbound};
use crate::http as gw_http;
use crate::ir;
use crate::stream::EventStream;

use super::wire;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: secrecy::SecretString,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>, api_key: secrecy::SecretString) -> Self {
        Self { base_url: base_url.into(), api_key }
    }
}

pub struct OpenAiOutbound {
    pub config: OpenAiConfig,
}

impl OpenAiOutbound {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config }
    }

    fn build_wire_request(&self, request: &ir::Request) -> wire::ChatCompletionRequest {
        let messages = request.messages.iter().map(to_wire_message).collect();

        let tools = (!request.tools.is_empty()).then(|| {
            request
                .tools
                .iter()
                .filter(|tool| tool.kind == ir::ToolKind::Function)
                .map(|tool| wire::Tool {
                    tool_type: wire::ToolCallType::Function,
                    function: wire::FunctionDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect()
        });

        let tool_choice = request.tool_choice.as_ref().map(|choice| match choice {
            ir::ToolChoice::Auto => wire::ToolChoice::Mode(wire::ToolChoiceMode::Auto),
            ir::ToolChoice::None => wire::ToolChoice::Mode(wire::ToolChoiceMode::None),
            ir::ToolChoice::Required => wire::ToolChoice::Mode(wire::ToolChoiceMode::Required),
            ir::ToolChoice::Function(name) => wire::ToolChoice::Specific {
                tool_type: wire::ToolCallType::Function,
                function: wire::ToolChoiceFunction { name: name.clone() },
            },
        });

        wire::ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            max_completion_tokens: request.max_completion_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            seed: request.seed,
            stop: match &request.stop {
                Some(ir::StopSequences::Single(s)) => Some(wire::StopValue::Single(s.clone())),
                Some(ir::StopSequences::Many(many)) => Some(wire::StopValue::Many(many.clone())),
                None => None,
            },
            stream: request.stream,
            stream_options: request.stream.filter(|s| *s).map(|_| wire::StreamOptions { include_usage: Some(true) }),
            tools,
            tool_choice,
            parallel_tool_calls: None,
            response_format: match &request.response_format {
                Some(ir::ResponseFormat::Text) => Some(wire::ResponseFormat { kind: "text".to_string(), json_schema: None }),
                Some(ir::ResponseFormat::JsonObject) => Some(wire::ResponseFormat { kind: "json_object".to_string(), json_schema: None }),
                Some(ir::ResponseFormat::JsonSchema { name, schema }) => Some(wire::ResponseFormat {
                    kind: "json_schema".to_string(),
                    json_schema: Some(serde_json::json!({ "name": name.clone().unwrap_or_else(|| "response".to_string()), "schema": schema })),
                }),
                None => None,
            },
            reasoning_effort: request.reasoning_effort.map(|effort| {
                match effort {
                    ir::ReasoningEffort::Low => "low",
                    ir::ReasoningEffort::Medium => "medium",
                    ir::ReasoningEffort::High => "high",
                }
                .to_string()
            }),
            google: None,
            unknown_fields: Default::default(),
        }
    }
}

impl Outbound for OpenAiOutbound {
    fn transform_request(&self, request: ir::Request) -> crate::Result<gw_http::Request> {
        request.validate()?;

        let streaming = request.stream.unwrap_or(false);
        let wire_request = self.build_wire_request(&request);
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut headers = http::HeaderMap::new();
        if self.config.api_key.expose_secret().is_empty() {
            return Err(crate::Error::config("openai outbound requires a non-empty api key"));
        }
        let value = http::HeaderValue::from_str(&format!("Bearer {}", self.config.api_key.expose_secret()))
            .map_err(|e| crate::Error::invalid_request(format!("invalid api key: {e}")))?;
        headers.insert(http::header::AUTHORIZATION, value);
        headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

        let body = serde_json::to_vec(&wire_request).map_err(|e| crate::Error::decode(format!("failed to encode openai request: {e}")))?;
        let _ = streaming;

        Ok(gw_http::Request {
            method: gw_http::Method::Post,
            url: url.clone(),
            path: url,
            query: Vec::new(),
            headers,
            content_type: Some("application/json".to_string()),
            body: bytes::Bytes::from(body),
            json_body: None,
            auth: None,
            request_id: None,
            raw_request: request.raw_request.clone(),
            metadata: Default::default(),
        })
    }

    fn transform_response(&self, response: gw_http::Response) -> crate::Result<ir::Response> {
        if response.status_code >= 400 {
            return Err(crate::Error::Upstream {
                status_code: response.status_code,
                message: String::from_utf8_lossy(&response.body).to_string(),
                error_type: None,
                request_id: None,
            });
        }

        let wire_response: wire::ChatCompletionResponse =
            serde_json::from_slice(&response.body).map_err(|e| crate::Error::decode(format!("failed to parse openai response: {e}")))?;

        Ok(to_ir_response(wire_response))
    }

    fn transform_stream(&self, events: EventStream<ir::StreamEvent>) -> EventStream<ir::Response> {
        Box::pin(events.filter_map(move |event| async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            if event.data.as_ref() == b"[DONE]" || event.data.is_empty() {
                return None;
            }
            let chunk: wire::ChatCompletionChunk = serde_json::from_slice(&event.data).ok()?;
            Some(Ok(to_ir_response_from_chunk(chunk)))
        }))
    }

    async fn aggregate_stream_chunks(&self, events: EventStream<ir::StreamEvent>) -> crate::Result<(ir::Response, AggregateMeta)> {
        super::aggregate::aggregate(events).await
    }

    fn transform_error(&self, error: gw_http::HttpError) -> crate::Error {
        match serde_json::from_slice::<wire::ErrorResponse>(&error.body) {
            Ok(envelope) => crate::Error::Upstream {
                status_code: error.status_code,
                message: envelope.error.message,
                error_type: envelope.error.error_type,
                request_id: None,
            },
            Err(_) => crate::Error::Upstream {
                status_code: error.status_code,
                message: String::from_utf8_lossy(&error.body).to_string(),
                error_type: None,
                request_id: None,
            },
        }
    }
}

fn to_wire_message(message: &ir::Message) -> wire::ChatMessage {
    let role = match message.role {
        ir::Role::System => wire::ChatRole::System,
        ir::Role::User => wire::ChatRole::User,
        ir::Role::Assistant => wire::ChatRole::Assistant,
        ir::Role::Tool => wire::ChatRole::Tool,
    };

    let content = match message.content.as_text() {
        Some(text) if !text.is_empty() => Some(wire::MessageContent::Text(text.to_string())),
        _ => None,
    };

    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| wire::ToolCall {
                id: call.id.clone(),
                tool_type: wire::ToolCallType::Function,
                function: wire::FunctionCall {
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                },
            })
            .collect()
    });

    wire::ChatMessage {
        role,
        content,
        name: message.tool_call_name.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
        unknown_fields: Default::default(),
    }
}

pub(super) fn usage_from_wire(usage: &wire::Usage) -> ir::Usage {
    let cached_tokens = usage.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0);
    let reasoning_tokens = usage.completion_tokens_details.map(|d| d.reasoning_tokens).unwrap_or(0);

    ir::Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        prompt_details: ir::PromptUsageDetails {
            cached_tokens,
            cache_write_5m_tokens: 0,
            cache_write_1h_tokens: 0,
        },
        completion_details: ir::CompletionUsageDetails { reasoning_tokens },
    }
}

fn to_ir_response(response: wire::ChatCompletionResponse) -> ir::Response {
    let usage = usage_from_wire(&response.usage);
    ir::Response {
        id: response.id,
        model: response.model,
        created: response.created,
        choices: response
            .choices
            .into_iter()
            .map(|choice| ir::Choice {
                index: choice.index,
                body: ir::ChoiceBody::Message(from_wire_message(choice.message)),
                finish_reason: Some(map_finish_reason(choice.finish_reason)),
            })
            .collect(),
        usage,
        metadata: Default::default(),
    }
}

fn to_ir_response_from_chunk(chunk: wire::ChatCompletionChunk) -> ir::Response {
    let usage = chunk.usage.as_ref().map(usage_from_wire).unwrap_or_default();
    ir::Response {
        id: chunk.id,
        model: chunk.model,
        created: chunk.created,
        choices: chunk
            .choices
            .into_iter()
            .map(|choice| ir::Choice {
                index: choice.index,
                body: ir::ChoiceBody::Delta(ir::Delta {
                    role: choice.delta.role.map(map_role),
                    content: choice.delta.content,
                    tool_calls: choice
                        .delta
                        .tool_calls
                        .unwrap_or_default()
                        .into_iter()
                        .map(|call| ir::ToolCall {
                            id: call.id.unwrap_or_default(),
                            function: ir::ToolCallFunction {
                                name: call.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                                arguments: call.function.as_ref().and_then(|f| f.arguments.clone()).unwrap_or_default(),
                            },
                            metadata: None,
                        })
                        .collect(),
                    reasoning_content: None,
                    reasoning_signature: None,
                }),
                finish_reason: choice.finish_reason.map(map_finish_reason),
            })
            .collect(),
        usage,
        metadata: Default::default(),
    }
}

fn from_wire_message(message: wire::ChatMessage) -> ir::Message {
    let role = map_role(message.role);
    let content = match message.content {
        Some(wire::MessageContent::Text(text)) => ir::Content::Text(text),
        Some(wire::MessageContent::Parts(parts)) => ir::Content::Parts(
            parts
                .into_iter()
                .filter_map(|part| match part {
                    wire::ContentPart::Text { text } => Some(ir::ContentPart::Text { text, cache_control: None }),
                    wire::ContentPart::ImageUrl { image_url } => Some(ir::ContentPart::ImageUrl { url: image_url.url, cache_control: None }),
                    wire::ContentPart::Unknown => None,
                })
                .collect(),
        ),
        None => ir::Content::Text(String::new()),
    };

    ir::Message {
        role,
        content,
        tool_calls: message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ir::ToolCall {
                id: call.id,
                function: ir::ToolCallFunction { name: call.function.name, arguments: call.function.arguments },
                metadata: None,
            })
            .collect(),
        tool_call_id: message.tool_call_id,
        tool_call_name: message.name,
        reasoning_content: None,
        reasoning_signature: None,
        redacted_reasoning_content: None,
        cache_control: None,
    }
}

fn map_role(role: wire::ChatRole) -> ir::Role {
    match role {
        wire::ChatRole::System => ir::Role::System,
        wire::ChatRole::User => ir::Role::User,
        wire::ChatRole::Assistant => ir::Role::Assistant,
        wire::ChatRole::Tool => ir::Role::Tool,
    }
}

fn map_finish_reason(reason: wire::FinishReason) -> ir::FinishReason {
    match reason {
        wire::FinishReason::Stop => ir::FinishReason::Stop,
        wire::FinishReason::Length => ir::FinishReason::Length,
        wire::FinishReason::ContentFilter => ir::FinishReason::ContentFilter,
        wire::FinishReason::ToolCalls => ir::FinishReason::ToolCalls,
        wire::FinishReason::Other => ir::FinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_from_wire_carries_cached_and_reasoning_tokens() {
        let usage = wire::Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
            prompt_tokens_details: Some(wire::PromptTokensDetails { cached_tokens: 75 }),
            completion_tokens_details: Some(wire::CompletionTokensDetails { reasoning_tokens: 12 }),
        };
        let ir_usage = usage_from_wire(&usage);
        assert_eq!(ir_usage.prompt_tokens, 100);
        assert_eq!(ir_usage.completion_tokens, 50);
        assert_eq!(ir_usage.total_tokens, 150);
        assert_eq!(ir_usage.prompt_details.cached_tokens, 75);
        assert_eq!(ir_usage.completion_details.reasoning_tokens, 12);
    }
}
