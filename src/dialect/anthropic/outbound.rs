//! Outbound codec: IR Request -> Anthropic wire Request (for the upstream
//! call) and Anthropic wire Response/stream -> IR Response (`spec.md` §4.2).
//! Grounded on `provider/anthropic.rs`'s request/response shuttling, minus
//! the actual `reqwest` call — that lives in the `HttpClient` collaborator.

use futures::StreamExt;

use crate::codec::{AggregateMeta, Outbound};
use crate::http as gw_http;
use crate::ir;
use crate::stream::EventStream;

use super::CLAUDE_CODE_METADATA_KEY;
use super::cache_plan::ensure_cache_control;
use super::platform::{self, PlatformConfig};
use super::wire;

pub struct AnthropicOutbound {
    pub platform: PlatformConfig,
}

impl AnthropicOutbound {
    pub fn new(platform: PlatformConfig) -> Self {
        Self { platform }
    }

    fn build_wire_request(&self, request: &ir::Request) -> crate::Result<wire::Request> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == ir::Role::System)
            .map(|m| wire::SystemPrompt::Text(m.content.as_text().unwrap_or_default().to_string()));

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != ir::Role::System)
            .map(to_wire_message)
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(to_wire_tool).collect())
        };

        Ok(wire::Request {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens.unwrap_or(4096),
            system,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: None,
            stop_sequences: match &request.stop {
                Some(ir::StopSequences::Single(s)) => Some(vec![s.clone()]),
                Some(ir::StopSequences::Many(many)) => Some(many.clone()),
                None => None,
            },
            stream: request.stream,
            metadata: None,
            tools,
            tool_choice: request.tool_choice.as_ref().map(to_wire_tool_choice),
            container: None,
            context_management: None,
            mcp_servers: None,
            service_tier: None,
            thinking: request.reasoning_budget.map(|budget_tokens| wire::ThinkingConfig::Enabled {
                budget_tokens,
                unknown_fields: Default::default(),
            }),
            unknown_fields: Default::default(),
        })
    }
}

impl Outbound for AnthropicOutbound {
    fn transform_request(&self, request: ir::Request) -> crate::Result<gw_http::Request> {
        request.validate()?;

        let mut wire_request = self.build_wire_request(&request)?;
        ensure_cache_control(&mut wire_request);

        let claude_code = request
            .metadata
            .get(CLAUDE_CODE_METADATA_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let streaming = wire_request.stream.unwrap_or(false);
        let composed = platform::compose_url(&self.platform, &wire_request.model, streaming)?;

        let mut headers = http::HeaderMap::new();
        let mut auth = request.auth.clone();
        platform::materialise_auth(&self.platform, &mut auth, &mut headers, claude_code)?;
        platform::apply_platform_quirks(&self.platform, &mut wire_request, &mut headers, claude_code);

        let mut body_json =
            serde_json::to_value(&wire_request).map_err(|e| crate::Error::decode(format!("failed to encode anthropic request: {e}")))?;
        if matches!(self.platform.platform_type, super::platform::PlatformType::Bedrock) {
            platform::clear_body_model_for_bedrock(&mut body_json);
        }
        let body =
            serde_json::to_vec(&body_json).map_err(|e| crate::Error::decode(format!("failed to serialize anthropic request: {e}")))?;

        headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

        // Claude Code's `?beta=true` query param, appended only if the
        // composed URL doesn't already carry it (`spec.md` §6).
        let mut url = composed.url;
        let mut query = Vec::new();
        if claude_code && !url.contains("beta=true") {
            query.push(("beta".to_string(), "true".to_string()));
            url = format!("{url}?beta=true");
        }

        Ok(gw_http::Request {
            method: gw_http::Method::Post,
            url,
            path: composed.path,
            query,
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
        if response.body.is_empty() {
            return Err(crate::Error::decode("empty anthropic response body"));
        }

        let wire_response: wire::Response =
            serde_json::from_slice(&response.body).map_err(|e| crate::Error::decode(format!("failed to parse anthropic response: {e}")))?;

        Ok(to_ir_response(wire_response, self.platform.platform_type))
    }

    fn transform_stream(&self, events: EventStream<ir::StreamEvent>) -> EventStream<ir::Response> {
        let platform_type = self.platform.platform_type;
        Box::pin(events.filter_map(move |event| async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            let wire_event: wire::StreamEvent = serde_json::from_slice(&event.data).ok()?;
            stream_event_to_response(wire_event, platform_type).map(Ok)
        }))
    }

    async fn aggregate_stream_chunks(&self, events: EventStream<ir::StreamEvent>) -> crate::Result<(ir::Response, AggregateMeta)> {
        super::aggregate::aggregate(events, self.platform.platform_type).await
    }

    fn transform_error(&self, error: gw_http::HttpError) -> crate::Error {
        match serde_json::from_slice::<wire::ErrorResponse>(&error.body) {
            Ok(envelope) => crate::Error::Upstream {
                status_code: error.status_code,
                message: envelope.error.message,
                error_type: Some(envelope.error.r#type),
                request_id: envelope.request_id,
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

fn to_wire_message(message: &ir::Message) -> wire::InputMessage {
    let role = match message.role {
        ir::Role::Assistant => wire::Role::Assistant,
        _ => wire::Role::User,
    };

    let mut blocks = Vec::new();
    match &message.content {
        ir::Content::Text(text) if !text.is_empty() => {
            blocks.push(wire::InputMessageStructuredContent::Text(wire::RequestTextBlock {
                text: text.clone(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }));
        }
        ir::Content::Parts(parts) => {
            for part in parts {
                if let ir::ContentPart::Text { text, .. } = part
                    && !text.is_empty()
                {
                    blocks.push(wire::InputMessageStructuredContent::Text(wire::RequestTextBlock {
                        text: text.clone(),
                        cache_control: None,
                        citations: None,
                        unknown_fields: Default::default(),
                    }));
                }
            }
        }
        _ => {}
    }

    for call in &message.tool_calls {
        blocks.push(wire::InputMessageStructuredContent::ToolUse(wire::RequestToolUseBlock {
            id: call.id.clone(),
            input: serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null),
            name: call.function.name.clone(),
            cache_control: None,
            unknown_fields: Default::default(),
        }));
    }

    if let Some(tool_call_id) = &message.tool_call_id {
        blocks.push(wire::InputMessageStructuredContent::ToolResult(wire::RequestToolResultBlock {
            tool_use_id: tool_call_id.clone(),
            content: message.content.as_text().map(|t| serde_json::Value::String(t.to_string())),
            is_error: None,
            cache_control: None,
            unknown_fields: Default::default(),
        }));
    }

    wire::InputMessage {
        role,
        content: wire::InputMessageContent::Items(blocks),
        unknown_fields: Default::default(),
    }
}

fn to_wire_tool(tool: &ir::Tool) -> wire::Tool {
    let kind = match &tool.kind {
        ir::ToolKind::Function => None,
        ir::ToolKind::Native(name) => Some(wire::ToolKind::Unknown(name.clone())),
    };
    wire::Tool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        kind,
        input_schema: Box::new(tool.parameters.clone().unwrap_or(serde_json::Value::Null)),
        cache_control: None,
        unknown_fields: Default::default(),
    }
}

fn to_wire_tool_choice(choice: &ir::ToolChoice) -> wire::ToolChoice {
    match choice {
        ir::ToolChoice::Auto => wire::ToolChoice::Auto {
            disable_parallel_tool_use: None,
            unknown_fields: Default::default(),
        },
        ir::ToolChoice::Required => wire::ToolChoice::Any {
            disable_parallel_tool_use: None,
            unknown_fields: Default::default(),
        },
        ir::ToolChoice::None => wire::ToolChoice::None {
            unknown_fields: Default::default(),
        },
        ir::ToolChoice::Function(name) => wire::ToolChoice::Tool {
            name: name.clone(),
            disable_parallel_tool_use: None,
            unknown_fields: Default::default(),
        },
    }
}

fn to_ir_response(response: wire::Response, platform_type: platform::PlatformType) -> ir::Response {
    let mut message = ir::Message::user(String::new());
    message.role = ir::Role::Assistant;
    message.content = ir::Content::Parts(
        response
            .content
            .iter()
            .filter_map(|block| match block {
                wire::ResponseContent::Text(b) => Some(ir::ContentPart::Text {
                    text: b.text.clone(),
                    cache_control: None,
                }),
                _ => None,
            })
            .collect(),
    );
    message.tool_calls = response
        .content
        .iter()
        .filter_map(|block| match block {
            wire::ResponseContent::ToolUse(b) => Some(ir::ToolCall {
                id: b.id.clone(),
                function: ir::ToolCallFunction {
                    name: b.name.clone(),
                    arguments: b.input.to_string(),
                },
                metadata: None,
            }),
            _ => None,
        })
        .collect();

    let (reasoning_content, reasoning_signature) = response
        .content
        .iter()
        .find_map(|block| match block {
            wire::ResponseContent::Thinking(b) => Some((Some(b.thinking.clone()), Some(ir::ReasoningSignature(b.signature.clone())))),
            _ => None,
        })
        .unwrap_or((None, None));
    message.reasoning_content = reasoning_content;
    message.reasoning_signature = reasoning_signature;

    let usage = to_ir_usage(&response.usage, platform_type);

    ir::Response {
        id: response.id,
        model: response.model,
        created: 0,
        choices: vec![ir::Choice {
            index: 0,
            body: ir::ChoiceBody::Message(message),
            finish_reason: map_stop_reason(response.stop_reason.as_ref()),
        }],
        usage,
        metadata: Default::default(),
    }
}

fn to_ir_usage(usage: &wire::Usage, platform_type: platform::PlatformType) -> ir::Usage {
    let cache_read = usage.cache_read_input_tokens.unwrap_or(0);
    let cache_write_5m = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_5m_input_tokens).unwrap_or(0);
    let cache_write_1h = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_1h_input_tokens).unwrap_or(0);
    let cache_creation = usage.cache_creation_input_tokens.unwrap_or(cache_write_5m + cache_write_1h);

    // Moonshot already folds cached tokens into `input_tokens`; adding
    // `cache_creation`/`cache_read` again would double-count (`spec.md` §4.6).
    let prompt_tokens = if platform_type == platform::PlatformType::Moonshot {
        usage.input_tokens
    } else {
        usage.input_tokens + cache_creation + cache_read
    };

    ir::Usage {
        prompt_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: prompt_tokens + usage.output_tokens,
        prompt_details: ir::PromptUsageDetails {
            cached_tokens: cache_read,
            cache_write_5m_tokens: cache_write_5m,
            cache_write_1h_tokens: cache_write_1h,
        },
        completion_details: ir::CompletionUsageDetails::default(),
    }
}

fn map_stop_reason(reason: Option<&wire::StopReason>) -> Option<ir::FinishReason> {
    reason.map(|r| match r {
        wire::StopReason::EndTurn | wire::StopReason::PauseTurn | wire::StopReason::Refusal => ir::FinishReason::Stop,
        wire::StopReason::MaxTokens => ir::FinishReason::Length,
        wire::StopReason::StopSequence => ir::FinishReason::Stop,
        wire::StopReason::ToolUse => ir::FinishReason::ToolCalls,
        wire::StopReason::Unknown(_) => ir::FinishReason::Stop,
    })
}

fn stream_event_to_response(event: wire::StreamEvent, platform_type: platform::PlatformType) -> Option<ir::Response> {
    match event {
        wire::StreamEvent::MessageStart(start) => Some(ir::Response {
            id: start.id,
            model: start.model,
            created: 0,
            choices: vec![ir::Choice {
                index: 0,
                body: ir::ChoiceBody::Delta(ir::Delta::default()),
                finish_reason: None,
            }],
            usage: to_ir_usage_from_stream(&start.usage, platform_type),
            metadata: Default::default(),
        }),
        wire::StreamEvent::ContentBlockDelta { delta, .. } => {
            let mut ir_delta = ir::Delta::default();
            if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                ir_delta.content = Some(text.to_string());
            }
            if let Some(thinking) = delta.get("thinking").and_then(|v| v.as_str()) {
                ir_delta.reasoning_content = Some(thinking.to_string());
            }
            if let Some(signature) = delta.get("signature").and_then(|v| v.as_str()) {
                ir_delta.reasoning_signature = Some(ir::ReasoningSignature(signature.to_string()));
            }
            Some(ir::Response {
                id: String::new(),
                model: String::new(),
                created: 0,
                choices: vec![ir::Choice {
                    index: 0,
                    body: ir::ChoiceBody::Delta(ir_delta),
                    finish_reason: None,
                }],
                usage: ir::Usage::default(),
                metadata: Default::default(),
            })
        }
        wire::StreamEvent::MessageDelta(delta) => Some(ir::Response {
            id: String::new(),
            model: String::new(),
            created: 0,
            choices: vec![ir::Choice {
                index: 0,
                body: ir::ChoiceBody::Delta(ir::Delta::default()),
                finish_reason: map_stop_reason(delta.delta.stop_reason.as_ref()),
            }],
            usage: delta.usage.as_ref().map(|u| to_ir_usage_from_stream(u, platform_type)).unwrap_or_default(),
            metadata: Default::default(),
        }),
        _ => None,
    }
}

fn to_ir_usage_from_stream(usage: &wire::StreamUsage, platform_type: platform::PlatformType) -> ir::Usage {
    let input = usage.input_tokens.unwrap_or(0);
    let output = usage.output_tokens.unwrap_or(0);
    let cache_read = usage.cache_read_input_tokens.unwrap_or(0);
    let cache_write_5m = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_5m_input_tokens).unwrap_or(0);
    let cache_write_1h = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_1h_input_tokens).unwrap_or(0);
    let cache_creation = usage.cache_creation_input_tokens.unwrap_or(cache_write_5m + cache_write_1h);
    let prompt_tokens = if platform_type == platform::PlatformType::Moonshot {
        input
    } else {
        input + cache_read + cache_creation
    };

    ir::Usage {
        prompt_tokens,
        completion_tokens: output,
        total_tokens: prompt_tokens + output,
        prompt_details: ir::PromptUsageDetails {
            cached_tokens: cache_read,
            cache_write_5m_tokens: cache_write_5m,
            cache_write_1h_tokens: cache_write_1h,
        },
        completion_details: ir::CompletionUsageDetails::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn claude_code_inbound_to_anthropic_outbound_scenario() {
        let outbound = AnthropicOutbound::new(PlatformConfig {
            platform_type: platform::PlatformType::Direct,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            raw_url: None,
            region: None,
            project_id: None,
        });

        let request = ir::Request {
            kind: ir::RequestKind::Chat,
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![ir::Message::user("Hello".to_string())],
            max_tokens: Some(1024),
            max_completion_tokens: None,
            temperature: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
            stop: None,
            tools: Vec::new(),
            tool_choice: None,
            response_format: None,
            stream: None,
            reasoning_effort: None,
            reasoning_budget: None,
            extra_body: None,
            auth: Some(ir::Auth {
                kind: ir::AuthKind::Bearer,
                api_key: Some(secrecy::SecretString::from("test-api-key".to_string())),
                header_key: None,
            }),
            raw_request: None,
            metadata: HashMap::from([(CLAUDE_CODE_METADATA_KEY.to_string(), serde_json::Value::Bool(true))]),
        };

        let wire_request = outbound.transform_request(request).unwrap();

        assert_eq!(wire_request.url, "https://api.anthropic.com/v1/messages?beta=true");
        assert_eq!(wire_request.headers.get(http::header::AUTHORIZATION).unwrap(), "Bearer test-api-key");
        assert_eq!(
            wire_request.headers.get(http::header::USER_AGENT).unwrap(),
            "claude-cli/1.0.83 (external, cli)"
        );
    }

    #[test]
    fn usage_mapping_adds_cache_fields_into_prompt_tokens() {
        let usage = wire::Usage {
            input_tokens: 10,
            output_tokens: 5,
            cache_creation: Some(wire::CacheCreation {
                ephemeral_5m_input_tokens: Some(3),
                ephemeral_1h_input_tokens: Some(0),
                unknown_fields: Default::default(),
            }),
            cache_creation_input_tokens: None,
            cache_read_input_tokens: Some(7),
            server_tool_use: None,
            service_tier: None,
            unknown_fields: Default::default(),
        };
        let ir_usage = to_ir_usage(&usage, platform::PlatformType::Direct);
        assert_eq!(ir_usage.prompt_tokens, 20);
        assert_eq!(ir_usage.prompt_details.cached_tokens, 7);
    }

    #[test]
    fn moonshot_usage_does_not_double_count_cached_tokens() {
        let usage = wire::Usage {
            input_tokens: 100,
            output_tokens: 50,
            cache_creation: None,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: Some(75),
            server_tool_use: None,
            service_tier: None,
            unknown_fields: Default::default(),
        };
        let ir_usage = to_ir_usage(&usage, platform::PlatformType::Moonshot);
        assert_eq!(ir_usage.prompt_tokens, 100);
        assert_eq!(ir_usage.completion_tokens, 50);
        assert_eq!(ir_usage.total_tokens, 150);
        assert_eq!(ir_usage.prompt_details.cached_tokens, 75);
    }
}
