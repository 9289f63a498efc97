//! Folds an OpenAI-compatible `chat.completion.chunk` SSE stream into one
//! non-streaming `ChatCompletionResponse`, mirroring the shape of the
//! Anthropic aggregator (`dialect/anthropic/aggregate.rs`) but keyed by
//! choice index and accumulating streamed tool-call argument fragments by
//! their `index` field per `spec.md` §4.6.

use std::collections::BTreeMap;

use futures::StreamExt;

use crate::codec::AggregateMeta;
use crate::ir;
use crate::stream::EventStream;

use super::outbound::usage_from_wire;
use super::wire;

#[derive(Default)]
struct ChoiceState {
    role: Option<wire::ChatRole>,
    content: String,
    tool_calls: BTreeMap<u32, ToolCallState>,
    finish_reason: Option<wire::FinishReason>,
}

#[derive(Default)]
struct ToolCallState {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

pub async fn aggregate(mut events: EventStream<ir::StreamEvent>) -> crate::Result<(ir::Response, AggregateMeta)> {
    let mut choices: BTreeMap<u32, ChoiceState> = BTreeMap::new();
    let mut id = "chatcmpl_unknown".to_string();
    let mut model = String::new();
    let mut created = 0i64;
    let mut usage: Option<wire::Usage> = None;

    while let Some(event) = events.next().await {
        let event = event?;
        if event.data.as_ref() == b"[DONE]" || event.data.is_empty() {
            continue;
        }
        let Ok(chunk) = serde_json::from_slice::<wire::ChatCompletionChunk>(&event.data) else {
            continue;
        };

        id = chunk.id;
        if !chunk.model.is_empty() {
            model = chunk.model;
        }
        created = chunk.created;
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }

        for choice in chunk.choices {
            let state = choices.entry(choice.index).or_default();
            if choice.delta.role.is_some() {
                state.role = choice.delta.role;
            }
            if let Some(content) = choice.delta.content {
                state.content.push_str(&content);
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let entry = state.tool_calls.entry(call.index).or_default();
                if call.id.is_some() {
                    entry.id = call.id;
                }
                if let Some(function) = call.function {
                    if function.name.is_some() {
                        entry.name = function.name;
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
            if choice.finish_reason.is_some() {
                state.finish_reason = choice.finish_reason;
            }
        }
    }

    let response_choices = choices
        .into_iter()
        .map(|(index, state)| {
            let tool_calls = state
                .tool_calls
                .into_values()
                .map(|call| ir::ToolCall {
                    id: call.id.unwrap_or_default(),
                    function: ir::ToolCallFunction {
                        name: call.name.unwrap_or_default(),
                        arguments: call.arguments,
                    },
                    metadata: None,
                })
                .collect();

            ir::Choice {
                index,
                body: ir::ChoiceBody::Message(ir::Message {
                    role: state.role.map(super_map_role).unwrap_or(ir::Role::Assistant),
                    content: ir::Content::Text(state.content),
                    tool_calls,
                    tool_call_id: None,
                    tool_call_name: None,
                    reasoning_content: None,
                    reasoning_signature: None,
                    redacted_reasoning_content: None,
                    cache_control: None,
                }),
                finish_reason: state.finish_reason.map(super_map_finish_reason),
            }
        })
        .collect();

    let ir_usage = usage.as_ref().map(usage_from_wire).unwrap_or_default();

    let response = ir::Response {
        id: id.clone(),
        model,
        created,
        choices: response_choices,
        usage: ir_usage,
        metadata: Default::default(),
    };

    let meta = AggregateMeta {
        id: Some(id),
        usage: Some(ir_usage),
    };

    Ok((response, meta))
}

fn super_map_role(role: wire::ChatRole) -> ir::Role {
    match role {
        wire::ChatRole::System => ir::Role::System,
        wire::ChatRole::User => ir::Role::User,
        wire::ChatRole::Assistant => ir::Role::Assistant,
        wire::ChatRole::Tool => ir::Role::Tool,
    }
}

fn super_map_finish_reason(reason: wire::FinishReason) -> ir::FinishReason {
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
    use bytes::Bytes;

    fn event(json: serde_json::Value) -> Result<ir::StreamEvent, crate::Error> {
        Ok(ir::StreamEvent {
            last_event_id: None,
            event_type: None,
            data: Bytes::from(json.to_string()),
        })
    }

    #[tokio::test]
    async fn accumulates_tool_call_arguments_across_chunks_by_index() {
        let events: Vec<Result<ir::StreamEvent, crate::Error>> = vec![
            event(serde_json::json!({
                "id": "chatcmpl_1", "object": "chat.completion.chunk", "created": 1, "model": "gpt-test",
                "choices": [{"index": 0, "delta": {"role": "assistant", "tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"loc"}}]}}],
            })),
            event(serde_json::json!({
                "id": "chatcmpl_1", "object": "chat.completion.chunk", "created": 1, "model": "gpt-test",
                "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\":\"NYC\"}"}}]}, "finish_reason": "tool_calls"}],
            })),
        ];
        let stream: EventStream<ir::StreamEvent> = Box::pin(futures::stream::iter(events));
        let (response, _) = aggregate(stream).await.unwrap();

        match &response.choices[0].body {
            ir::ChoiceBody::Message(message) => {
                assert_eq!(message.tool_calls.len(), 1);
                assert_eq!(message.tool_calls[0].function.arguments, "{\"loc\":\"NYC\"}");
            }
            _ => panic!("expected message body"),
        }
    }
}
