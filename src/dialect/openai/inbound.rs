//! Inbound codec: OpenAI-compatible wire Request/Response <-> IR
//! (`spec.md` §4.1, §6). Grounded on `messages/unified/from_openai.rs`'s
//! system-message hoisting and tool/tool_choice mapping.

use futures::StreamExt;

use crate::codec::{AggregateMeta, Inbound};
use crate::ir;
use crate::stream::EventStream;

use super::wire;

#[derive(Debug, Clone, Default)]
pub struct OpenAiInboundConfig;

pub struct OpenAiInbound {
    #[allow(dead_code)]
    pub config: OpenAiInboundConfig,
}

impl OpenAiInbound {
    pub fn new(config: OpenAiInboundConfig) -> Self {
        Self { config }
    }
}

impl Inbound for OpenAiInbound {
    type WireRequest = wire::ChatCompletionRequest;
    type WireResponse = wire::ChatCompletionResponse;
    type WireStreamEvent = wire::ChatCompletionChunk;

    fn transform_request(&self, wire: Self::WireRequest) -> crate::Result<ir::Request> {
        let messages = wire.messages.into_iter().map(from_wire_message).collect();

        let tools = wire
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| ir::Tool {
                kind: ir::ToolKind::Function,
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
                cache_control: None,
            })
            .collect();

        let tool_choice = wire.tool_choice.map(|choice| match choice {
            wire::ToolChoice::Mode(wire::ToolChoiceMode::None) => ir::ToolChoice::None,
            wire::ToolChoice::Mode(wire::ToolChoiceMode::Auto) => ir::ToolChoice::Auto,
            wire::ToolChoice::Mode(wire::ToolChoiceMode::Required) => ir::ToolChoice::Required,
            wire::ToolChoice::Specific { function, .. } => ir::ToolChoice::Function(function.name),
        });

        let stop = wire.stop.map(|stop| match stop {
            wire::StopValue::Single(s) => ir::StopSequences::Single(s),
            wire::StopValue::Many(many) => ir::StopSequences::Many(many),
        });

        let top_level_reasoning_effort = wire.reasoning_effort.as_deref().map(|effort| match effort {
            "low" | "minimal" => ir::ReasoningEffort::Low,
            "high" => ir::ReasoningEffort::High,
            _ => ir::ReasoningEffort::Medium,
        });

        let (google_reasoning_effort, reasoning_budget) = wire
            .google
            .as_ref()
            .and_then(|g| g.thinking_config.as_ref())
            .map(lift_thinking_config)
            .unwrap_or((None, None));
        let reasoning_effort = google_reasoning_effort.or(top_level_reasoning_effort);

        Ok(ir::Request {
            kind: ir::RequestKind::Chat,
            model: wire.model,
            messages,
            max_tokens: wire.max_tokens,
            max_completion_tokens: wire.max_completion_tokens,
            temperature: wire.temperature,
            top_p: wire.top_p,
            presence_penalty: wire.presence_penalty,
            frequency_penalty: wire.frequency_penalty,
            seed: wire.seed,
            stop,
            tools,
            tool_choice,
            response_format: wire.response_format.map(|format| match format.kind.as_str() {
                "json_object" => ir::ResponseFormat::JsonObject,
                "json_schema" => {
                    let name = format.json_schema.as_ref().and_then(|v| v.get("name")).and_then(|v| v.as_str()).map(str::to_string);
                    let schema = format.json_schema.as_ref().and_then(|v| v.get("schema")).cloned().unwrap_or(serde_json::Value::Null);
                    ir::ResponseFormat::JsonSchema { name, schema }
                }
                _ => ir::ResponseFormat::Text,
            }),
            stream: wire.stream,
            reasoning_effort,
            reasoning_budget,
            extra_body: None,
            auth: Some(ir::Auth {
                kind: ir::AuthKind::Bearer,
                api_key: None,
                header_key: None,
            }),
            raw_request: None,
            metadata: Default::default(),
        })
    }

    fn transform_response(&self, response: ir::Response) -> crate::Result<Self::WireResponse> {
        Ok(wire::ChatCompletionResponse {
            id: response.id,
            object: "chat.completion".to_string(),
            created: response.created,
            model: response.model,
            choices: response.choices.into_iter().map(to_wire_choice).collect(),
            usage: to_wire_usage(&response.usage),
            system_fingerprint: None,
            unknown_fields: Default::default(),
        })
    }

    fn transform_stream(&self, events: EventStream<ir::Response>) -> EventStream<Self::WireStreamEvent> {
        Box::pin(events.map(|event| {
            let response = event?;
            Ok(wire::ChatCompletionChunk {
                id: response.id,
                object: "chat.completion.chunk".to_string(),
                created: response.created,
                model: response.model,
                system_fingerprint: None,
                choices: response.choices.into_iter().map(to_wire_choice_delta).collect(),
                usage: Some(to_wire_usage(&response.usage)),
                unknown_fields: Default::default(),
            })
        }))
    }

    async fn aggregate_stream_chunks(&self, mut events: EventStream<Self::WireStreamEvent>) -> crate::Result<(Self::WireResponse, AggregateMeta)> {
        let mut choices: std::collections::BTreeMap<u32, (String, Option<wire::FinishReason>)> = std::collections::BTreeMap::new();
        let mut id = "chatcmpl_unknown".to_string();
        let mut model = String::new();
        let mut created = 0i64;
        let mut usage = None;

        while let Some(chunk) = events.next().await {
            let chunk = chunk?;
            id = chunk.id;
            if !chunk.model.is_empty() {
                model = chunk.model;
            }
            created = chunk.created;
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            for choice in chunk.choices {
                let entry = choices.entry(choice.index).or_insert((String::new(), None));
                if let Some(content) = choice.delta.content {
                    entry.0.push_str(&content);
                }
                if choice.finish_reason.is_some() {
                    entry.1 = choice.finish_reason;
                }
            }
        }

        let response = wire::ChatCompletionResponse {
            id: id.clone(),
            object: "chat.completion".to_string(),
            created,
            model,
            choices: choices
                .into_iter()
                .map(|(index, (content, finish_reason))| wire::ChatChoice {
                    index,
                    message: wire::ChatMessage {
                        role: wire::ChatRole::Assistant,
                        content: Some(wire::MessageContent::Text(content)),
                        name: None,
                        tool_calls: None,
                        tool_call_id: None,
                        unknown_fields: Default::default(),
                    },
                    finish_reason: finish_reason.unwrap_or(wire::FinishReason::Stop),
                    logprobs: None,
                })
                .collect(),
            usage: usage.clone().unwrap_or_default(),
            system_fingerprint: None,
            unknown_fields: Default::default(),
        };

        let meta = AggregateMeta {
            id: Some(id),
            usage: Some(super::outbound::usage_from_wire(&usage.unwrap_or_default())),
        };

        Ok((response, meta))
    }
}

fn from_wire_message(message: wire::ChatMessage) -> ir::Message {
    let role = match message.role {
        wire::ChatRole::System => ir::Role::System,
        wire::ChatRole::User => ir::Role::User,
        wire::ChatRole::Assistant => ir::Role::Assistant,
        wire::ChatRole::Tool => ir::Role::Tool,
    };

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

fn to_wire_choice(choice: ir::Choice) -> wire::ChatChoice {
    let message = match choice.body {
        ir::ChoiceBody::Message(message) => message,
        ir::ChoiceBody::Delta(delta) => ir::Message {
            role: delta.role.unwrap_or(ir::Role::Assistant),
            content: ir::Content::Text(delta.content.unwrap_or_default()),
            tool_calls: delta.tool_calls,
            tool_call_id: None,
            tool_call_name: None,
            reasoning_content: delta.reasoning_content,
            reasoning_signature: delta.reasoning_signature,
            redacted_reasoning_content: None,
            cache_control: None,
        },
    };

    wire::ChatChoice {
        index: choice.index,
        finish_reason: choice.finish_reason.map(map_finish_reason).unwrap_or(wire::FinishReason::Stop),
        message: to_wire_message(&message),
        logprobs: None,
    }
}

fn to_wire_choice_delta(choice: ir::Choice) -> wire::ChatChoiceDelta {
    let delta = match choice.body {
        ir::ChoiceBody::Delta(delta) => delta,
        ir::ChoiceBody::Message(message) => ir::Delta {
            role: Some(message.role),
            content: message.content.as_text().map(str::to_string),
            tool_calls: message.tool_calls,
            reasoning_content: message.reasoning_content,
            reasoning_signature: message.reasoning_signature,
        },
    };

    wire::ChatChoiceDelta {
        index: choice.index,
        delta: wire::ChatMessageDelta {
            role: delta.role.map(map_role),
            content: delta.content,
            tool_calls: (!delta.tool_calls.is_empty()).then(|| {
                delta
                    .tool_calls
                    .into_iter()
                    .enumerate()
                    .map(|(index, call)| wire::StreamingToolCall {
                        index: index as u32,
                        id: Some(call.id),
                        tool_type: Some(wire::ToolCallType::Function),
                        function: Some(wire::FunctionCallDelta {
                            name: Some(call.function.name),
                            arguments: Some(call.function.arguments),
                        }),
                    })
                    .collect()
            }),
        },
        finish_reason: choice.finish_reason.map(map_finish_reason),
        logprobs: None,
    }
}

fn to_wire_message(message: &ir::Message) -> wire::ChatMessage {
    wire::ChatMessage {
        role: map_role(message.role),
        content: match message.content.as_text() {
            Some(text) if !text.is_empty() => Some(wire::MessageContent::Text(text.to_string())),
            _ => None,
        },
        name: message.tool_call_name.clone(),
        tool_calls: (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| wire::ToolCall {
                    id: call.id.clone(),
                    tool_type: wire::ToolCallType::Function,
                    function: wire::FunctionCall { name: call.function.name.clone(), arguments: call.function.arguments.clone() },
                })
                .collect()
        }),
        tool_call_id: message.tool_call_id.clone(),
        unknown_fields: Default::default(),
    }
}

fn map_role(role: ir::Role) -> wire::ChatRole {
    match role {
        ir::Role::System => wire::ChatRole::System,
        ir::Role::User => wire::ChatRole::User,
        ir::Role::Assistant => wire::ChatRole::Assistant,
        ir::Role::Tool => wire::ChatRole::Tool,
    }
}

fn map_finish_reason(reason: ir::FinishReason) -> wire::FinishReason {
    match reason {
        ir::FinishReason::Stop => wire::FinishReason::Stop,
        ir::FinishReason::Length => wire::FinishReason::Length,
        ir::FinishReason::ToolCalls => wire::FinishReason::ToolCalls,
        ir::FinishReason::ContentFilter => wire::FinishReason::ContentFilter,
    }
}

fn lift_thinking_config(config: &wire::ThinkingConfig) -> (Option<ir::ReasoningEffort>, Option<u32>) {
    if let Some(level) = &config.thinking_level {
        return (Some(effort_from_level(level)), None);
    }
    match &config.thinking_budget {
        Some(wire::ThinkingBudget::Level(level)) => (Some(effort_from_level(level)), None),
        Some(wire::ThinkingBudget::Tokens(tokens)) => (None, Some(*tokens)),
        None => (None, None),
    }
}

fn effort_from_level(level: &str) -> ir::ReasoningEffort {
    match level {
        "minimal" | "low" => ir::ReasoningEffort::Low,
        "medium" => ir::ReasoningEffort::Medium,
        "high" => ir::ReasoningEffort::High,
        _ => ir::ReasoningEffort::Medium,
    }
}

fn to_wire_usage(usage: &ir::Usage) -> wire::Usage {
    wire::Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        prompt_tokens_details: Some(wire::PromptTokensDetails { cached_tokens: usage.prompt_details.cached_tokens }),
        completion_tokens_details: Some(wire::CompletionTokensDetails { reasoning_tokens: usage.completion_details.reasoning_tokens }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> OpenAiInbound {
        OpenAiInbound::new(OpenAiInboundConfig)
    }

    #[test]
    fn hoists_system_role_message_but_keeps_it_in_messages() {
        let wire_request = wire::ChatCompletionRequest {
            model: "gpt-test".to_string(),
            messages: vec![
                wire::ChatMessage {
                    role: wire::ChatRole::System,
                    content: Some(wire::MessageContent::Text("be terse".to_string())),
                    name: None,
                    tool_calls: None,
                    tool_call_id: None,
                    unknown_fields: Default::default(),
                },
                wire::ChatMessage {
                    role: wire::ChatRole::User,
                    content: Some(wire::MessageContent::Text("hi".to_string())),
                    name: None,
                    tool_calls: None,
                    tool_call_id: None,
                    unknown_fields: Default::default(),
                },
            ],
            max_tokens: None,
            max_completion_tokens: None,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            stop: None,
            stream: None,
            stream_options: None,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            response_format: None,
            reasoning_effort: None,
            google: None,
            unknown_fields: Default::default(),
        };

        let request = inbound().transform_request(wire_request).unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, ir::Role::System);
    }

    #[test]
    fn parses_json_fixture_and_maps_tool_choice_to_specific_function() {
        use indoc::indoc;

        let wire_request: wire::ChatCompletionRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "gpt-test",
                "messages": [
                    {"role": "user", "content": "what's the weather in nyc?"}
                ],
                "tools": [
                    {
                        "type": "function",
                        "function": {"name": "get_weather", "parameters": {"type": "object"}}
                    }
                ],
                "tool_choice": {
                    "type": "function",
                    "function": {"name": "get_weather"}
                }
            }
        "#})
        .unwrap();

        let request = inbound().transform_request(wire_request).unwrap();
        insta::assert_debug_snapshot!(request.tool_choice, @r#"
        Some(
            Function(
                "get_weather",
            ),
        )
        "#);
    }

    #[test]
    fn google_thinking_level_takes_priority_over_budget() {
        use indoc::indoc;

        let wire_request: wire::ChatCompletionRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "hi"}],
                "google": {"thinking_config": {"thinking_level": "high", "thinking_budget": 1000}}
            }
        "#})
        .unwrap();

        let request = inbound().transform_request(wire_request).unwrap();
        assert_eq!(request.reasoning_effort, Some(ir::ReasoningEffort::High));
        assert_eq!(request.reasoning_budget, None);
    }

    #[test]
    fn google_integer_thinking_budget_is_preserved() {
        use indoc::indoc;

        let wire_request: wire::ChatCompletionRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "hi"}],
                "google": {"thinking_config": {"thinking_budget": 2048}}
            }
        "#})
        .unwrap();

        let request = inbound().transform_request(wire_request).unwrap();
        assert_eq!(request.reasoning_effort, None);
        assert_eq!(request.reasoning_budget, Some(2048));
    }

    #[test]
    fn google_string_thinking_budget_normalises_minimal_to_low() {
        use indoc::indoc;

        let wire_request: wire::ChatCompletionRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "hi"}],
                "google": {"thinking_config": {"thinking_budget": "minimal"}}
            }
        "#})
        .unwrap();

        let request = inbound().transform_request(wire_request).unwrap();
        assert_eq!(request.reasoning_effort, Some(ir::ReasoningEffort::Low));
        assert_eq!(request.reasoning_budget, None);
    }

    #[test]
    fn delta_is_always_present_on_stream_chunks() {
        let choice = ir::Choice {
            index: 0,
            body: ir::ChoiceBody::Delta(ir::Delta::default()),
            finish_reason: None,
        };
        let wire_delta = to_wire_choice_delta(choice);
        let serialized = serde_json::to_value(&wire_delta).unwrap();
        assert!(serialized.get("delta").is_some());
    }
}
