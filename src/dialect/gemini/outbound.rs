//! Outbound codec: IR Request -> Gemini wire Request and Gemini wire
//! Response/stream -> IR Response (`spec.md` §4.2, §6). Grounded on
//! `provider/google/input.rs`'s `GoogleGenerateRequest` assembly, replacing
//! its OpenAI-request source type with the crate's own IR and adding the
//! Vertex URL variant and thought-signature handling the teacher never had
//! (it only ever called the Google AI Studio endpoint).

use futures::StreamExt;
use secrecy::ExposeSecret;

use crate::codec::{AggregateMeta, Outbound};
use crate::http as gw_http;
use crate::ir;
use crate::stream::EventStream;

use super::thought_signature::{SENTINEL_SIGNATURE, encode_gemini_thought_signature};
use super::wire;
use super::{NATIVE_TOOL_CODE_EXECUTION, NATIVE_TOOL_GOOGLE_SEARCH, NATIVE_TOOL_URL_CONTEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiPlatform {
    Direct,
    Vertex,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub platform: GeminiPlatform,
    pub base_url: String,
    pub api_version: String,
    pub api_key: Option<secrecy::SecretString>,
}

impl GeminiConfig {
    pub fn direct(base_url: impl Into<String>, api_key: secrecy::SecretString) -> Self {
        Self {
            platform: GeminiPlatform::Direct,
            base_url: base_url.into(),
            api_version: "v1beta".to_string(),
            api_key: Some(api_key),
        }
    }
}

pub struct GeminiOutbound {
    pub config: GeminiConfig,
}

impl GeminiOutbound {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    fn compose_url(&self, model: &str, streaming: bool) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.platform {
            GeminiPlatform::Vertex => {
                let action = if streaming { "streamGenerateContent" } else { "generateContent" };
                format!("{base}/v1/publishers/google/models/{model}:{action}{}", if streaming { "?alt=sse" } else { "" })
            }
            GeminiPlatform::Direct => {
                let version = &self.config.api_version;
                let action = if streaming { "streamGenerateContent" } else { "generateContent" };
                format!("{base}/{version}/models/{model}:{action}{}", if streaming { "?alt=sse" } else { "" })
            }
        }
    }

    fn build_wire_request(&self, request: &ir::Request) -> crate::Result<wire::GenerateContentRequest> {
        let system_instruction = request
            .messages
            .iter()
            .filter(|m| m.role == ir::Role::System)
            .map(|m| m.content.as_text().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n\n");

        let system_instruction = (!system_instruction.is_empty()).then(|| wire::Content {
            role: wire::Role::User,
            parts: vec![wire::Part {
                text: Some(system_instruction),
                ..Default::default()
            }],
        });

        let mut function_name_by_call_id = std::collections::HashMap::new();
        for message in &request.messages {
            for call in &message.tool_calls {
                function_name_by_call_id.insert(call.id.clone(), call.function.name.clone());
            }
        }

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != ir::Role::System)
            .map(|m| to_wire_content(m, &function_name_by_call_id))
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            let mut function_declarations = Vec::new();
            let mut native_tools = Vec::new();
            for tool in &request.tools {
                match &tool.kind {
                    ir::ToolKind::Function => function_declarations.push(wire::FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    }),
                    ir::ToolKind::Native(name) if name == NATIVE_TOOL_GOOGLE_SEARCH => native_tools.push(wire::Tool {
                        function_declarations: None,
                        google_search: Some(serde_json::json!({})),
                        code_execution: None,
                        url_context: None,
                    }),
                    ir::ToolKind::Native(name) if name == NATIVE_TOOL_CODE_EXECUTION => native_tools.push(wire::Tool {
                        function_declarations: None,
                        google_search: None,
                        code_execution: Some(serde_json::json!({})),
                        url_context: None,
                    }),
                    ir::ToolKind::Native(name) if name == NATIVE_TOOL_URL_CONTEXT => native_tools.push(wire::Tool {
                        function_declarations: None,
                        google_search: None,
                        code_execution: None,
                        url_context: Some(serde_json::json!({})),
                    }),
                    ir::ToolKind::Native(_) => {}
                }
            }
            let mut tools = native_tools;
            if !function_declarations.is_empty() {
                tools.push(wire::Tool {
                    function_declarations: Some(function_declarations),
                    google_search: None,
                    code_execution: None,
                    url_context: None,
                });
            }
            Some(tools)
        };

        let tool_config = request.tool_choice.as_ref().map(|choice| {
            let (mode, allowed) = match choice {
                ir::ToolChoice::Auto => (wire::FunctionCallingMode::Auto, None),
                ir::ToolChoice::None => (wire::FunctionCallingMode::None, None),
                ir::ToolChoice::Required => (wire::FunctionCallingMode::Any, None),
                ir::ToolChoice::Function(name) => (wire::FunctionCallingMode::Any, Some(vec![name.clone()])),
            };
            wire::ToolConfig {
                function_calling_config: Some(wire::FunctionCallingConfig {
                    mode: Some(mode),
                    allowed_function_names: allowed,
                }),
            }
        });

        let thinking_config = match (request.reasoning_budget, request.reasoning_effort) {
            (Some(budget), _) => Some(wire::ThinkingConfig {
                include_thoughts: Some(true),
                thinking_budget: Some(budget as i32),
                thinking_level: None,
            }),
            (None, Some(effort)) => Some(wire::ThinkingConfig {
                include_thoughts: Some(true),
                thinking_budget: None,
                thinking_level: Some(
                    match effort {
                        ir::ReasoningEffort::Low => "low",
                        ir::ReasoningEffort::Medium => "medium",
                        ir::ReasoningEffort::High => "high",
                    }
                    .to_string(),
                ),
            }),
            (None, None) => None,
        };

        Ok(wire::GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: Some(wire::GenerationConfig {
                stop_sequences: match &request.stop {
                    Some(ir::StopSequences::Single(s)) => Some(vec![s.clone()]),
                    Some(ir::StopSequences::Many(many)) => Some(many.clone()),
                    None => None,
                },
                response_mime_type: None,
                response_schema: None,
                response_modalities: None,
                candidate_count: Some(1),
                max_output_tokens: request.max_tokens.map(|t| t as i32),
                temperature: request.temperature,
                top_p: request.top_p,
                top_k: None,
                thinking_config,
                image_config: None,
            }),
            safety_settings: None,
            tools,
            tool_config,
            unknown_fields: Default::default(),
        })
    }
}

impl Outbound for GeminiOutbound {
    fn transform_request(&self, request: ir::Request) -> crate::Result<gw_http::Request> {
        request.validate()?;

        let wire_request = self.build_wire_request(&request)?;
        let streaming = request.stream.unwrap_or(false);
        let url = self.compose_url(&request.model, streaming);

        let mut headers = http::HeaderMap::new();
        let key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| crate::Error::config("gemini outbound requires an api key"))?;
        if key.expose_secret().is_empty() {
            return Err(crate::Error::config("gemini outbound requires a non-empty api key"));
        }
        let value = http::HeaderValue::from_str(key.expose_secret()).map_err(|e| crate::Error::invalid_request(format!("invalid api key: {e}")))?;
        headers.insert(http::HeaderName::from_static("x-goog-api-key"), value);
        headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

        let body = serde_json::to_vec(&wire_request).map_err(|e| crate::Error::decode(format!("failed to encode gemini request: {e}")))?;

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
        if response.body.is_empty() {
            return Err(crate::Error::decode("empty gemini response body"));
        }

        let wire_response: wire::GenerateContentResponse =
            serde_json::from_slice(&response.body).map_err(|e| crate::Error::decode(format!("failed to parse gemini response: {e}")))?;

        Ok(to_ir_response(wire_response))
    }

    fn transform_stream(&self, events: EventStream<ir::StreamEvent>) -> EventStream<ir::Response> {
        Box::pin(events.filter_map(|event| async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            if event.data.as_ref() == b"[DONE]" || event.data.is_empty() {
                return None;
            }
            let wire_response: wire::GenerateContentResponse = serde_json::from_slice(&event.data).ok()?;
            Some(Ok(to_ir_response(wire_response)))
        }))
    }

    async fn aggregate_stream_chunks(&self, events: EventStream<ir::StreamEvent>) -> crate::Result<(ir::Response, AggregateMeta)> {
        super::aggregate::aggregate_wire_events(events).await
    }

    fn transform_error(&self, error: gw_http::HttpError) -> crate::Error {
        match serde_json::from_slice::<wire::ErrorResponse>(&error.body) {
            Ok(envelope) => crate::Error::Upstream {
                status_code: error.status_code,
                message: envelope.error.message,
                error_type: envelope.error.status,
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

fn to_wire_content(message: &ir::Message, function_name_by_call_id: &std::collections::HashMap<String, String>) -> wire::Content {
    let role = match message.role {
        ir::Role::Assistant => wire::Role::Model,
        _ => wire::Role::User,
    };

    if message.role == ir::Role::Tool {
        let name = message
            .tool_call_name
            .clone()
            .or_else(|| message.tool_call_id.as_ref().and_then(|id| function_name_by_call_id.get(id).cloned()))
            .unwrap_or_else(|| "unknown_function".to_string());
        let response = match serde_json::from_str::<serde_json::Value>(message.content.as_text().unwrap_or_default()) {
            Ok(value) if value.is_object() => value,
            _ => serde_json::json!({ "result": message.content.as_text().unwrap_or_default() }),
        };
        return wire::Content {
            role: wire::Role::User,
            parts: vec![wire::Part {
                function_response: Some(wire::FunctionResponse {
                    name,
                    response,
                    id: message.tool_call_id.clone(),
                }),
                ..Default::default()
            }],
        };
    }

    let mut parts = Vec::new();

    if let Some(reasoning) = &message.reasoning_content {
        parts.push(wire::Part {
            text: Some(reasoning.clone()),
            thought: Some(true),
            ..Default::default()
        });
    }

    match &message.content {
        ir::Content::Text(text) if !text.is_empty() => parts.push(wire::Part {
            text: Some(text.clone()),
            ..Default::default()
        }),
        ir::Content::Parts(content_parts) => {
            for part in content_parts {
                match part {
                    ir::ContentPart::Text { text, .. } if !text.is_empty() => parts.push(wire::Part {
                        text: Some(text.clone()),
                        ..Default::default()
                    }),
                    ir::ContentPart::ImageUrl { url, .. } => parts.push(wire::Part {
                        file_data: Some(wire::FileData { mime_type: None, file_uri: url.clone() }),
                        ..Default::default()
                    }),
                    _ => {}
                }
            }
        }
        _ => {}
    }

    let has_signature = message.reasoning_signature.is_some();
    for (index, call) in message.tool_calls.iter().enumerate() {
        let thought_signature = if index == 0 {
            match &message.reasoning_signature {
                Some(signature) => Some(encode_gemini_thought_signature_or_raw(signature)),
                None if has_signature => None,
                None => Some(SENTINEL_SIGNATURE.to_string()),
            }
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

fn encode_gemini_thought_signature_or_raw(signature: &ir::ReasoningSignature) -> String {
    super::thought_signature::decode_gemini_thought_signature(signature)
        .map(str::to_string)
        .unwrap_or_else(|| signature.0.clone())
}

fn to_ir_response(response: wire::GenerateContentResponse) -> ir::Response {
    let usage = response.usage_metadata.as_ref().map(usage_from_wire).unwrap_or_default();
    let model = response.model_version.clone().unwrap_or_default();
    let id = response.response_id.clone().unwrap_or_default();

    let choices = response
        .candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| candidate_to_choice(candidate, i as u32))
        .collect();

    ir::Response {
        id,
        model,
        created: 0,
        choices,
        usage,
        metadata: Default::default(),
    }
}

fn candidate_to_choice(candidate: &wire::Candidate, fallback_index: u32) -> ir::Choice {
    let mut message = ir::Message::user(String::new());
    message.role = ir::Role::Assistant;

    let mut text_parts = Vec::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();
    let mut signature_captured = false;

    if let Some(content) = &candidate.content {
        for part in &content.parts {
            if let Some(text) = &part.text {
                if part.thought == Some(true) {
                    reasoning.push_str(text);
                } else {
                    text_parts.push(ir::ContentPart::Text { text: text.clone(), cache_control: None });
                }
            }
            if let Some(call) = &part.function_call {
                if !signature_captured
                    && let Some(raw_signature) = &part.thought_signature
                    && !raw_signature.is_empty()
                {
                    message.reasoning_signature = Some(encode_gemini_thought_signature(raw_signature));
                    signature_captured = true;
                }
                tool_calls.push(ir::ToolCall {
                    id: call.id.clone().unwrap_or_default(),
                    function: ir::ToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.args.to_string(),
                    },
                    metadata: None,
                });
            }
        }
    }

    message.content = ir::Content::Parts(text_parts);
    message.tool_calls = tool_calls;
    if !reasoning.is_empty() {
        message.reasoning_content = Some(reasoning);
    }

    ir::Choice {
        index: candidate.index.unwrap_or(fallback_index),
        body: ir::ChoiceBody::Message(message),
        finish_reason: candidate.finish_reason.map(map_finish_reason),
    }
}

fn map_finish_reason(reason: wire::FinishReason) -> ir::FinishReason {
    match reason {
        wire::FinishReason::Stop => ir::FinishReason::Stop,
        wire::FinishReason::MaxTokens => ir::FinishReason::Length,
        wire::FinishReason::Safety | wire::FinishReason::Recitation => ir::FinishReason::ContentFilter,
        wire::FinishReason::Other | wire::FinishReason::Unknown => ir::FinishReason::Stop,
    }
}

fn usage_from_wire(usage: &wire::UsageMetadata) -> ir::Usage {
    let prompt_tokens = usage.prompt_token_count;
    let completion_tokens = usage.candidates_token_count + usage.thoughts_token_count;
    ir::Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: usage.total_token_count,
        prompt_details: ir::PromptUsageDetails {
            cached_tokens: usage.cached_content_token_count,
            cache_write_5m_tokens: 0,
            cache_write_1h_tokens: 0,
        },
        completion_details: ir::CompletionUsageDetails {
            reasoning_tokens: usage.thoughts_token_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_mapping_matches_cache_hit_rate_scenario() {
        let usage = wire::UsageMetadata {
            prompt_token_count: 20981,
            candidates_token_count: 22,
            total_token_count: 21097,
            cached_content_token_count: 20350,
            thoughts_token_count: 94,
        };
        let ir_usage = usage_from_wire(&usage);
        assert_eq!(ir_usage.prompt_tokens, 20981);
        assert_eq!(ir_usage.prompt_details.cached_tokens, 20350);
        assert_eq!(ir_usage.completion_tokens, 116);
        assert_eq!(ir_usage.completion_details.reasoning_tokens, 94);
        assert_eq!(ir_usage.total_tokens, 21097);
    }

    #[test]
    fn only_first_function_call_part_carries_a_signature() {
        let mut message = ir::Message::user(String::new());
        message.role = ir::Role::Assistant;
        message.tool_calls = vec![
            ir::ToolCall { id: "1".into(), function: ir::ToolCallFunction { name: "a".into(), arguments: "{}".into() }, metadata: None },
            ir::ToolCall { id: "2".into(), function: ir::ToolCallFunction { name: "b".into(), arguments: "{}".into() }, metadata: None },
        ];
        let content = to_wire_content(&message, &std::collections::HashMap::new());
        let signatures: Vec<_> = content.parts.iter().filter_map(|p| p.thought_signature.clone()).collect();
        assert_eq!(signatures, vec![SENTINEL_SIGNATURE.to_string()]);
    }
}
