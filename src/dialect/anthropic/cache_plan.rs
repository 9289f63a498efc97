//! The Anthropic prompt-cache breakpoint planner (`spec.md` §4.4).
//!
//! Deterministically places at most 4 `cache_control` ephemeral markers on a
//! request regardless of what the client sent, so a client that over-marks,
//! under-marks, or doesn't mark at all still gets a valid, cache-efficient
//! plan. Grounded on the block union in `dialect::anthropic::wire::
//! input_message` (every block carries `cache_control` + `unknown_fields`)
//! and the marker type in `dialect::anthropic::wire::cache_control`.

use super::wire::{CacheControl, InputMessageContent, InputMessageStructuredContent, Request, RequestTextBlock, SystemInputMessage, SystemPrompt};

const MAX_MARKERS: usize = 4;
const DENSITY_WINDOW: usize = 20;

/// Re-plans `request`'s cache-control markers in place. Idempotent:
/// `ensure_cache_control(ensure_cache_control(r)) == ensure_cache_control(r)`.
pub fn ensure_cache_control(request: &mut Request) {
    normalise(request);
    clear(request);

    let mut budget = MAX_MARKERS;

    if let Some(tools) = request.tools.as_mut()
        && let Some(last) = tools.last_mut()
    {
        last.cache_control = Some(CacheControl::ephemeral(None));
        budget -= 1;
    }

    if let Some(SystemPrompt::Blocks(parts)) = request.system.as_mut()
        && let Some(last) = parts.last_mut()
    {
        set_system_cache_control(last, Some(CacheControl::ephemeral(None)));
        budget -= 1;
    }

    place_message_anchors(request, budget);
    sanitise(request);
}

fn normalise(request: &mut Request) {
    for message in &mut request.messages {
        if let InputMessageContent::Text(text) = &message.content {
            let block = InputMessageStructuredContent::Text(RequestTextBlock {
                text: text.clone(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            });
            message.content = InputMessageContent::Items(vec![block]);
        }
    }

    if let Some(SystemPrompt::Text(text)) = &request.system {
        let block = SystemInputMessage::Text(RequestTextBlock {
            text: text.clone(),
            cache_control: None,
            citations: None,
            unknown_fields: Default::default(),
        });
        request.system = Some(SystemPrompt::Blocks(vec![block]));
    }
}

fn clear(request: &mut Request) {
    if let Some(tools) = request.tools.as_mut() {
        for tool in tools {
            tool.cache_control = None;
        }
    }

    if let Some(SystemPrompt::Blocks(parts)) = request.system.as_mut() {
        for part in parts {
            set_system_cache_control(part, None);
        }
    }

    for message in &mut request.messages {
        if let InputMessageContent::Items(blocks) = &mut message.content {
            for block in blocks {
                block.clear_cache_control();
            }
        }
    }
}

/// Flat, message-then-block-ordered index into every cacheable block.
struct BlockRef {
    message_index: usize,
    block_index: usize,
}

fn collect_cacheable_blocks(request: &Request) -> Vec<BlockRef> {
    let mut refs = Vec::new();
    for (message_index, message) in request.messages.iter().enumerate() {
        if let InputMessageContent::Items(blocks) = &message.content {
            for (block_index, block) in blocks.iter().enumerate() {
                if block.is_cacheable() {
                    refs.push(BlockRef { message_index, block_index });
                }
            }
        }
    }
    refs
}

fn place_message_anchors(request: &mut Request, budget: usize) {
    let cacheable = collect_cacheable_blocks(request);
    let density = cacheable.len();

    let desired = if density == 0 {
        0
    } else if density < DENSITY_WINDOW {
        1
    } else {
        2
    };
    let desired = desired.min(budget);
    if desired == 0 {
        return;
    }

    let tail = density - 1;
    mark_block(request, &cacheable[tail]);

    if desired < 2 {
        return;
    }

    let target = tail.saturating_sub(DENSITY_WINDOW);
    let second = if tail.checked_sub(DENSITY_WINDOW).is_some() {
        target
    } else {
        // No position exists at or to the left of the target; scan right
        // from the start for the first distinct position.
        (0..density).find(|&i| i != tail).unwrap_or(tail)
    };

    if second != tail {
        mark_block(request, &cacheable[second]);
    }
}

fn mark_block(request: &mut Request, block_ref: &BlockRef) {
    if let Some(message) = request.messages.get_mut(block_ref.message_index)
        && let InputMessageContent::Items(blocks) = &mut message.content
        && let Some(block) = blocks.get_mut(block_ref.block_index)
    {
        block.set_cache_control(Some(CacheControl::ephemeral(None)));
    }
}

fn sanitise(request: &mut Request) {
    if let Some(SystemPrompt::Blocks(parts)) = request.system.as_mut() {
        for part in parts {
            if let SystemInputMessage::Text(block) = part
                && block.text.is_empty()
            {
                block.cache_control = None;
            }
        }
    }

    for message in &mut request.messages {
        if let InputMessageContent::Items(blocks) = &mut message.content {
            for block in blocks {
                if !block.is_cacheable() {
                    block.clear_cache_control();
                }
            }
        }
    }
}

fn set_system_cache_control(part: &mut SystemInputMessage, value: Option<CacheControl>) {
    match part {
        SystemInputMessage::Text(block) => block.cache_control = value,
        SystemInputMessage::Unknown(_) => {}
    }
}

fn count_markers(request: &Request) -> usize {
    let mut count = 0;
    if let Some(tools) = &request.tools {
        count += tools.iter().filter(|t| t.cache_control.is_some()).count();
    }
    if let Some(SystemPrompt::Blocks(parts)) = &request.system {
        count += parts
            .iter()
            .filter(|p| matches!(p, SystemInputMessage::Text(b) if b.cache_control.is_some()))
            .count();
    }
    for message in &request.messages {
        if let InputMessageContent::Items(blocks) = &message.content {
            count += blocks.iter().filter(|b| b.cache_control().is_some()).count();
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::anthropic::wire::{Role, Tool};
    use serde_json::json;

    fn text_message(role: Role, texts: &[&str]) -> crate::dialect::anthropic::wire::InputMessage {
        let blocks = texts
            .iter()
            .map(|t| {
                InputMessageStructuredContent::Text(RequestTextBlock {
                    text: t.to_string(),
                    cache_control: None,
                    citations: None,
                    unknown_fields: Default::default(),
                })
            })
            .collect();
        crate::dialect::anthropic::wire::InputMessage {
            role,
            content: InputMessageContent::Items(blocks),
            unknown_fields: Default::default(),
        }
    }

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: None,
            kind: None,
            input_schema: Box::new(json!({})),
            cache_control: None,
            unknown_fields: Default::default(),
        }
    }

    fn base_request() -> Request {
        Request {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![],
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
    fn bound_is_never_exceeded() {
        let mut request = base_request();
        request.tools = Some(vec![tool("a"), tool("b")]);
        request.system = Some(SystemPrompt::Blocks(vec![
            SystemInputMessage::Text(RequestTextBlock {
                text: "s1".into(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }),
            SystemInputMessage::Text(RequestTextBlock {
                text: "s2".into(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }),
        ]));
        request.messages = vec![
            text_message(Role::User, &["m1", "m2"]),
            text_message(Role::Assistant, &["a1"]),
            text_message(Role::User, &["u2"]),
        ];

        ensure_cache_control(&mut request);
        assert!(count_markers(&request) <= MAX_MARKERS);
    }

    #[test]
    fn s2_mixed_input_places_three_anchors() {
        let mut request = base_request();
        request.tools = Some(vec![tool("a"), tool("b")]);
        request.system = Some(SystemPrompt::Blocks(vec![
            SystemInputMessage::Text(RequestTextBlock {
                text: "s1".into(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }),
            SystemInputMessage::Text(RequestTextBlock {
                text: "s2".into(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }),
        ]));
        request.messages = vec![
            text_message(Role::User, &["m1", "m2"]),
            text_message(Role::Assistant, &["a1"]),
            text_message(Role::User, &["u2"]),
        ];

        ensure_cache_control(&mut request);

        assert_eq!(count_markers(&request), 3);
        assert!(request.tools.as_ref().unwrap()[1].cache_control.is_some());
        if let Some(SystemPrompt::Blocks(parts)) = &request.system {
            let SystemInputMessage::Text(block) = &parts[1] else {
                panic!("expected text block")
            };
            assert!(block.cache_control.is_some());
        }
        let last_message = &request.messages[2];
        let InputMessageContent::Items(blocks) = &last_message.content else {
            panic!("expected items")
        };
        assert!(blocks[0].cache_control().is_some());
    }

    #[test]
    fn client_supplied_six_markers_are_replanned() {
        let mut request = base_request();
        request.tools = Some(vec![tool("a"), tool("b")]);
        for tool in request.tools.as_mut().unwrap() {
            tool.cache_control = Some(CacheControl::ephemeral(None));
        }
        request.system = Some(SystemPrompt::Blocks(vec![SystemInputMessage::Text(RequestTextBlock {
            text: "s1".into(),
            cache_control: Some(CacheControl::ephemeral(None)),
            citations: None,
            unknown_fields: Default::default(),
        })]));
        let mut message = text_message(Role::User, &["m1", "m2", "m3"]);
        if let InputMessageContent::Items(blocks) = &mut message.content {
            for block in blocks.iter_mut() {
                block.set_cache_control(Some(CacheControl::ephemeral(None)));
            }
        }
        request.messages = vec![message];

        ensure_cache_control(&mut request);

        assert!(count_markers(&request) <= MAX_MARKERS);
        assert_eq!(count_markers(&request), 3);
    }

    #[test]
    fn idempotent() {
        let mut request = base_request();
        request.tools = Some(vec![tool("a")]);
        request.messages = vec![text_message(Role::User, &["m1"])];

        ensure_cache_control(&mut request);
        let first_pass = count_markers(&request);
        ensure_cache_control(&mut request);
        let second_pass = count_markers(&request);

        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn tail_message_of_thinking_blocks_scans_backward() {
        let mut request = base_request();
        request.messages = vec![
            text_message(Role::User, &["m1"]),
            crate::dialect::anthropic::wire::InputMessage {
                role: Role::Assistant,
                content: InputMessageContent::Items(vec![InputMessageStructuredContent::Thinking(
                    crate::dialect::anthropic::wire::RequestThinkingBlock {
                        signature: "sig".into(),
                        thinking: "...".into(),
                        unknown_fields: Default::default(),
                    },
                )]),
                unknown_fields: Default::default(),
            },
        ];

        ensure_cache_control(&mut request);

        let InputMessageContent::Items(blocks) = &request.messages[0].content else {
            panic!("expected items")
        };
        assert!(blocks[0].cache_control().is_some());
        let InputMessageContent::Items(blocks) = &request.messages[1].content else {
            panic!("expected items")
        };
        assert!(blocks[0].cache_control().is_none());
    }

    #[test]
    fn single_message_with_twenty_blocks_gets_two_anchors_same_message() {
        let mut request = base_request();
        let texts: Vec<String> = (0..25).map(|i| format!("block-{i}")).collect();
        let texts_ref: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        request.messages = vec![text_message(Role::User, &texts_ref)];

        ensure_cache_control(&mut request);

        assert_eq!(count_markers(&request), 2);
        let InputMessageContent::Items(blocks) = &request.messages[0].content else {
            panic!("expected items")
        };
        assert!(blocks[24].cache_control().is_some());
        assert!(blocks[4].cache_control().is_some());
    }

    #[test]
    fn no_cache_control_on_empty_text_or_thinking_blocks() {
        let mut request = base_request();
        request.messages = vec![crate::dialect::anthropic::wire::InputMessage {
            role: Role::User,
            content: InputMessageContent::Items(vec![
                InputMessageStructuredContent::Text(RequestTextBlock {
                    text: String::new(),
                    cache_control: None,
                    citations: None,
                    unknown_fields: Default::default(),
                }),
                InputMessageStructuredContent::RedactedThinking(
                    crate::dialect::anthropic::wire::RequestRedactedThinkingBlock {
                        data: "opaque".into(),
                        unknown_fields: Default::default(),
                    },
                ),
            ]),
            unknown_fields: Default::default(),
        }];

        ensure_cache_control(&mut request);

        let InputMessageContent::Items(blocks) = &request.messages[0].content else {
            panic!("expected items")
        };
        assert!(blocks.iter().all(|b| b.cache_control().is_none()));
    }
}
