//! Folds an Anthropic streaming event sequence into one canonical
//! non-streaming `ir::Response` (`spec.md` §4.6). Grounded on
//! `provider/anthropic/output.rs`'s `AnthropicStreamProcessor` pattern of
//! accumulating state across `content_block_*` events, generalised to the
//! crate's decoded `wire::StreamEvent` enum instead of the teacher's
//! zero-copy `sonic_rs` event type.

use std::collections::BTreeMap;

use futures::StreamExt;

use crate::codec::AggregateMeta;
use crate::ir;
use crate::stream::EventStream;

use super::platform::PlatformType;
use super::wire;

#[derive(Default)]
struct BlockState {
    text: String,
    thinking: String,
    signature: String,
    tool_name: Option<String>,
    tool_id: Option<String>,
    tool_input_json: String,
    repaired_input: Option<serde_json::Value>,
}

pub async fn aggregate(mut events: EventStream<ir::StreamEvent>, platform_type: PlatformType) -> crate::Result<(ir::Response, AggregateMeta)> {
    let mut id = None;
    let mut model = String::new();
    let mut stop_reason = None;
    let mut usage = ir::Usage::default();
    let mut blocks: BTreeMap<u32, BlockState> = BTreeMap::new();
    let mut block_order: Vec<u32> = Vec::new();

    while let Some(event) = events.next().await {
        let event = event?;
        let Ok(wire_event) = serde_json::from_slice::<wire::StreamEvent>(&event.data) else {
            log::warn!("skipping unparseable anthropic stream event during aggregation");
            continue;
        };

        match wire_event {
            wire::StreamEvent::MessageStart(start) => {
                id = Some(start.id);
                model = start.model;
                usage = usage_from_stream(&start.usage, platform_type);
            }
            wire::StreamEvent::ContentBlockStart { index, content_block } => {
                block_order.push(index);
                let mut state = BlockState::default();
                match content_block {
                    wire::ResponseContent::ToolUse(b) => {
                        state.tool_name = Some(b.name);
                        state.tool_id = Some(b.id);
                    }
                    wire::ResponseContent::Text(b) => state.text = b.text,
                    wire::ResponseContent::Thinking(b) => {
                        state.thinking = b.thinking;
                        state.signature = b.signature;
                    }
                    _ => {}
                }
                blocks.insert(index, state);
            }
            wire::StreamEvent::ContentBlockDelta { index, delta } => {
                let state = blocks.entry(index).or_default();
                if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                    state.text.push_str(text);
                }
                if let Some(thinking) = delta.get("thinking").and_then(|v| v.as_str()) {
                    state.thinking.push_str(thinking);
                }
                if let Some(signature) = delta.get("signature").and_then(|v| v.as_str()) {
                    state.signature.push_str(signature);
                }
                if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                    state.tool_input_json.push_str(partial);
                }
            }
            wire::StreamEvent::ContentBlockStop { index } => {
                if let Some(state) = blocks.get_mut(&index)
                    && state.tool_name.is_some()
                {
                    state.repaired_input = Some(repair_json(&state.tool_input_json));
                }
            }
            wire::StreamEvent::MessageDelta(delta) => {
                stop_reason = delta.delta.stop_reason;
                if let Some(stream_usage) = delta.usage {
                    usage = usage_from_stream(&stream_usage, platform_type);
                }
            }
            wire::StreamEvent::MessageStop | wire::StreamEvent::Ping => {}
            wire::StreamEvent::Error { error } => {
                return Err(crate::Error::Upstream {
                    status_code: 0,
                    message: error.message,
                    error_type: Some(error.r#type),
                    request_id: None,
                });
            }
            wire::StreamEvent::Unknown(_) => {}
        }
    }

    let mut message = ir::Message::user(String::new());
    message.role = ir::Role::Assistant;

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut reasoning_content = None;
    let mut reasoning_signature = None;

    for index in &block_order {
        let Some(state) = blocks.get(index) else { continue };
        if let Some(name) = &state.tool_name {
            let input = state.repaired_input.clone().unwrap_or_else(|| repair_json(&state.tool_input_json));
            tool_calls.push(ir::ToolCall {
                id: state.tool_id.clone().unwrap_or_default(),
                function: ir::ToolCallFunction {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
                metadata: None,
            });
        } else if !state.thinking.is_empty() || !state.signature.is_empty() {
            if reasoning_content.is_none() {
                reasoning_content = Some(state.thinking.clone());
                reasoning_signature = Some(ir::ReasoningSignature(state.signature.clone()));
            }
        } else if !state.text.is_empty() {
            parts.push(ir::ContentPart::Text {
                text: state.text.clone(),
                cache_control: None,
            });
        }
    }

    message.content = ir::Content::Parts(parts);
    message.tool_calls = tool_calls;
    message.reasoning_content = reasoning_content;
    message.reasoning_signature = reasoning_signature;

    let finish_reason = stop_reason.map(|r| match r {
        wire::StopReason::EndTurn | wire::StopReason::PauseTurn | wire::StopReason::Refusal => ir::FinishReason::Stop,
        wire::StopReason::MaxTokens => ir::FinishReason::Length,
        wire::StopReason::StopSequence => ir::FinishReason::Stop,
        wire::StopReason::ToolUse => ir::FinishReason::ToolCalls,
        wire::StopReason::Unknown(_) => ir::FinishReason::Stop,
    });

    let response_id = id.clone().unwrap_or_else(|| "msg_unknown".to_string());
    let response = ir::Response {
        id: response_id,
        model: if model.is_empty() { "unknown".to_string() } else { model },
        created: 0,
        choices: vec![ir::Choice {
            index: 0,
            body: ir::ChoiceBody::Message(message),
            finish_reason,
        }],
        usage,
        metadata: Default::default(),
    };

    Ok((
        response,
        AggregateMeta {
            id,
            usage: Some(usage),
        },
    ))
}

/// Best-effort repair for a truncated/invalid partial-JSON accumulation: on
/// failure the original bytes are preserved as a JSON string so the caller
/// still sees the upstream's output instead of losing it to an empty object.
fn repair_json(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| {
        log::warn!("tool_use.input JSON repair failed, preserving original bytes");
        serde_json::Value::String(raw.to_string())
    })
}

fn usage_from_stream(usage: &wire::StreamUsage, platform_type: PlatformType) -> ir::Usage {
    let input = usage.input_tokens.unwrap_or(0);
    let output = usage.output_tokens.unwrap_or(0);
    let cache_read = usage.cache_read_input_tokens.unwrap_or(0);
    let cache_write_5m = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_5m_input_tokens).unwrap_or(0);
    let cache_write_1h = usage.cache_creation.as_ref().and_then(|c| c.ephemeral_1h_input_tokens).unwrap_or(0);
    let cache_creation = usage.cache_creation_input_tokens.unwrap_or(cache_write_5m + cache_write_1h);
    let prompt_tokens = if platform_type == PlatformType::Moonshot {
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
    use futures::stream;

    fn event(json: serde_json::Value) -> Result<ir::StreamEvent, crate::Error> {
        Ok(ir::StreamEvent {
            last_event_id: None,
            event_type: None,
            data: bytes::Bytes::from(json.to_string()),
        })
    }

    #[tokio::test]
    async fn defaults_to_msg_unknown_when_no_message_start() {
        let events: EventStream<ir::StreamEvent> = Box::pin(stream::iter(vec![event(serde_json::json!({
            "type": "message_stop"
        }))]));
        let (response, meta) = aggregate(events, PlatformType::Direct).await.unwrap();
        assert_eq!(response.id, "msg_unknown");
        assert!(meta.id.is_none());
    }

    #[tokio::test]
    async fn accumulates_text_across_deltas() {
        let events: EventStream<ir::StreamEvent> = Box::pin(stream::iter(vec![
            event(serde_json::json!({"type": "message_start", "message": {}, "id": "msg_1", "role": "assistant", "content": [], "model": "claude-3", "usage": {"input_tokens": 1, "output_tokens": 0}})),
            event(serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
            event(serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "hel"}})),
            event(serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}})),
            event(serde_json::json!({"type": "content_block_stop", "index": 0})),
            event(serde_json::json!({"type": "message_stop"})),
        ]));
        let (response, _meta) = aggregate(events, PlatformType::Direct).await.unwrap();
        let ir::ChoiceBody::Message(message) = &response.choices[0].body else {
            panic!("expected message body")
        };
        assert_eq!(message.content.text_concat(), "hello");
    }

    #[tokio::test]
    async fn malformed_tool_input_preserves_original_bytes() {
        let events: EventStream<ir::StreamEvent> = Box::pin(stream::iter(vec![
            event(serde_json::json!({"type": "message_start", "message": {}, "id": "msg_1", "role": "assistant", "content": [], "model": "claude-3", "usage": {"input_tokens": 1, "output_tokens": 0}})),
            event(serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {}}})),
            event(serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"a\": tru"}})),
            event(serde_json::json!({"type": "content_block_stop", "index": 0})),
            event(serde_json::json!({"type": "message_stop"})),
        ]));
        let (response, _meta) = aggregate(events, PlatformType::Direct).await.unwrap();
        let ir::ChoiceBody::Message(message) = &response.choices[0].body else {
            panic!("expected message body")
        };
        assert_eq!(message.tool_calls[0].function.arguments, "\"{\\\"a\\\": tru\"");
    }

    #[tokio::test]
    async fn moonshot_stream_usage_does_not_double_count_cached_tokens() {
        let events: EventStream<ir::StreamEvent> = Box::pin(stream::iter(vec![
            event(serde_json::json!({"type": "message_start", "message": {}, "id": "msg_1", "role": "assistant", "content": [], "model": "moonshot-v1", "usage": {"input_tokens": 100, "output_tokens": 0, "cache_read_input_tokens": 75}})),
            event(serde_json::json!({"type": "message_delta", "delta": {}, "usage": {"input_tokens": 100, "output_tokens": 50, "cache_read_input_tokens": 75}})),
            event(serde_json::json!({"type": "message_stop"})),
        ]));
        let (response, _meta) = aggregate(events, PlatformType::Moonshot).await.unwrap();
        assert_eq!(response.usage.prompt_tokens, 100);
        assert_eq!(response.usage.completion_tokens, 50);
        assert_eq!(response.usage.total_tokens, 150);
    }
}
