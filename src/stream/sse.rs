//! Server-sent-events decoding.
//!
//! Wraps `eventsource_stream`'s `Eventsource` adaptor, exactly the way
//! `provider/anthropic.rs` and `provider/google.rs` turn
//! `response.bytes_stream()` into SSE events, and re-exposes events in the
//! `{last_event_id, type, data}` shape `spec.md` §3/§6 specifies.

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{StreamExt, stream::BoxStream};

use crate::{Error, ir::StreamEvent};

/// Raw bytes as produced by the external HTTP client collaborator's
/// `DoStream` — this crate never creates one of these itself, only consumes it.
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// Decodes `bytes` into `StreamEvent`s. Malformed frames become a terminal
/// `Error::Stream` — this is the "strict decoder" variant `spec.md` §4.3
/// reserves for non-aggregator consumers. Frames with no `data:` line
/// decode to an event with empty `data`, per §6.
pub fn decode_strict(bytes: ByteStream) -> BoxStream<'static, Result<StreamEvent, Error>> {
    bytes
        .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())))
        .eventsource()
        .map(|frame| match frame {
            Ok(event) => Ok(StreamEvent {
                last_event_id: (!event.id.is_empty()).then_some(event.id),
                event_type: (event.event != "message").then_some(event.event),
                data: Bytes::from(event.data),
            }),
            Err(e) => Err(Error::stream(e.to_string())),
        })
        .boxed()
}

/// Like [`decode_strict`] but skips malformed frames instead of failing the
/// whole stream — the variant aggregators use, per §4.3/§7 ("aggregators
/// skip unparseable stream chunks and log a warning; they never fail the
/// aggregation over a single bad frame").
pub fn decode_lenient(bytes: ByteStream) -> BoxStream<'static, Result<StreamEvent, Error>> {
    bytes
        .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())))
        .eventsource()
        .filter_map(|frame| {
            let mapped = match frame {
                Ok(event) => Some(Ok(StreamEvent {
                    last_event_id: (!event.id.is_empty()).then_some(event.id),
                    event_type: (event.event != "message").then_some(event.event),
                    data: Bytes::from(event.data),
                })),
                Err(e) => {
                    log::warn!("skipping malformed SSE frame: {e}");
                    None
                }
            };
            async move { mapped }
        })
        .boxed()
}

/// True when `event`'s data is the literal OpenAI-convention `[DONE]` sentinel.
pub fn is_done(event: &StreamEvent) -> bool {
    event.data.as_ref() == b"[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_stream(chunks: &[&str]) -> ByteStream {
        let chunks: Vec<Result<Bytes, Error>> = chunks.iter().map(|c| Ok(Bytes::from(c.to_string()))).collect();
        futures::stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn decodes_data_lines() {
        let stream = bytes_stream(&["data: hello\n\n"]);
        let events: Vec<_> = decode_strict(stream).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().data.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn recognises_done_sentinel() {
        let stream = bytes_stream(&["data: [DONE]\n\n"]);
        let events: Vec<_> = decode_strict(stream).collect().await;
        assert!(is_done(events[0].as_ref().unwrap()));
    }

    #[tokio::test]
    async fn carries_event_type_and_id() {
        let stream = bytes_stream(&["id: 42\nevent: content_block_delta\ndata: {}\n\n"]);
        let events: Vec<_> = decode_strict(stream).collect().await;
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.last_event_id.as_deref(), Some("42"));
        assert_eq!(event.event_type.as_deref(), Some("content_block_delta"));
    }
}
