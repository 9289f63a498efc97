//! Folds a Gemini `streamGenerateContent` SSE stream into one non-streaming
//! `GenerateContentResponse`, mirroring the Anthropic aggregator's structure
//! (`dialect/anthropic/aggregate.rs`) but keyed by candidate index instead of
//! content-block index, since Gemini repeats the full candidate list on every
//! chunk rather than addressing individual deltas.

use std::collections::BTreeMap;

use futures::StreamExt;

use crate::codec::AggregateMeta;
use crate::ir;
use crate::stream::EventStream;

use super::wire;

#[derive(Default)]
struct CandidateState {
    text: String,
    reasoning: String,
    tool_calls: Vec<ir::ToolCall>,
    reasoning_signature: Option<ir::ReasoningSignature>,
    signature_captured: bool,
    finish_reason: Option<wire::FinishReason>,
    grounding_metadata: Option<serde_json::Value>,
}

pub async fn aggregate_wire_events(mut events: EventStream<ir::StreamEvent>) -> crate::Result<(ir::Response, AggregateMeta)> {
    let mut candidates: BTreeMap<u32, CandidateState> = BTreeMap::new();
    let mut model_version: Option<String> = None;
    let mut response_id: Option<String> = None;
    let mut usage: Option<wire::UsageMetadata> = None;

    while let Some(event) = events.next().await {
        let event = event?;
        if event.data.as_ref() == b"[DONE]" || event.data.is_empty() {
            continue;
        }
        let Ok(chunk) = serde_json::from_slice::<wire::GenerateContentResponse>(&event.data) else {
            continue;
        };

        if chunk.model_version.is_some() {
            model_version = chunk.model_version;
        }
        if chunk.response_id.is_some() {
            response_id = chunk.response_id;
        }
        if let Some(chunk_usage) = chunk.usage_metadata {
            usage = Some(chunk_usage);
        }

        for (index, candidate) in chunk.candidates.iter().enumerate() {
            let index = candidate.index.unwrap_or(index as u32);
            let state = candidates.entry(index).or_default();

            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if let Some(text) = &part.text {
                        if part.thought == Some(true) {
                            state.reasoning.push_str(text);
                        } else {
                            state.text.push_str(text);
                        }
                    }
                    if let Some(call) = &part.function_call {
                        if !state.signature_captured
                            && let Some(raw) = &part.thought_signature
                            && !raw.is_empty()
                        {
                            state.reasoning_signature = Some(super::thought_signature::encode_gemini_thought_signature(raw));
                            state.signature_captured = true;
                        }
                        state.tool_calls.push(ir::ToolCall {
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
            if let Some(reason) = candidate.finish_reason {
                state.finish_reason = Some(reason);
            }
            if candidate.grounding_metadata.is_some() {
                state.grounding_metadata = candidate.grounding_metadata.clone();
            }
        }
    }

    let choices = candidates
        .into_iter()
        .map(|(index, state)| {
            let mut message = ir::Message::user(String::new());
            message.role = ir::Role::Assistant;
            message.content = ir::Content::Text(state.text);
            message.tool_calls = state.tool_calls;
            message.reasoning_signature = state.reasoning_signature;
            if !state.reasoning.is_empty() {
                message.reasoning_content = Some(state.reasoning);
            }
            let _ = state.grounding_metadata;

            ir::Choice {
                index,
                body: ir::ChoiceBody::Message(message),
                finish_reason: state.finish_reason.map(|reason| match reason {
                    wire::FinishReason::Stop => ir::FinishReason::Stop,
                    wire::FinishReason::MaxTokens => ir::FinishReason::Length,
                    wire::FinishReason::Safety | wire::FinishReason::Recitation => ir::FinishReason::ContentFilter,
                    wire::FinishReason::Other | wire::FinishReason::Unknown => ir::FinishReason::Stop,
                }),
            }
        })
        .collect();

    let ir_usage = usage.as_ref().map(usage_from_wire).unwrap_or_default();

    let response = ir::Response {
        id: response_id.clone().unwrap_or_default(),
        model: model_version.unwrap_or_default(),
        created: 0,
        choices,
        usage: ir_usage,
        metadata: Default::default(),
    };

    let meta = AggregateMeta {
        id: response_id,
        usage: Some(ir_usage),
    };

    Ok((response, meta))
}

fn usage_from_wire(usage: &wire::UsageMetadata) -> ir::Usage {
    ir::Usage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count + usage.thoughts_token_count,
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
    use bytes::Bytes;

    fn event(json: serde_json::Value) -> Result<ir::StreamEvent, crate::Error> {
        Ok(ir::StreamEvent {
            last_event_id: None,
            event_type: None,
            data: Bytes::from(json.to_string()),
        })
    }

    #[tokio::test]
    async fn accumulates_text_across_candidate_chunks() {
        let events: Vec<Result<ir::StreamEvent, crate::Error>> = vec![
            event(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}, "index": 0}],
                "modelVersion": "gemini-2.5-pro",
            })),
            event(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}, "finishReason": "STOP", "index": 0}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2, "totalTokenCount": 12},
            })),
        ];
        let stream: EventStream<ir::StreamEvent> = Box::pin(futures::stream::iter(events));
        let (response, meta) = aggregate_wire_events(stream).await.unwrap();

        assert_eq!(response.choices.len(), 1);
        match &response.choices[0].body {
            ir::ChoiceBody::Message(message) => assert_eq!(message.content.as_text(), Some("Hello")),
            _ => panic!("expected message body"),
        }
        assert_eq!(meta.usage.unwrap().prompt_tokens, 10);
    }
}
