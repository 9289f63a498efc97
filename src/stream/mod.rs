//! Lazy, cancellable, single-consumer event streams.
//!
//! `spec.md` §4.3 describes a `Next`/`Current`/`Err` iterator; this crate
//! models the same contract on top of `futures::Stream` rather than
//! hand-rolling a poll loop, because that is how the teacher repository
//! already consumes SSE bodies (`response.bytes_stream().eventsource()`,
//! `.map()`/`.chain()`/`.filter_map()` pipelines in `lib.rs` and
//! `provider/anthropic.rs`). A `futures::Stream<Item = Result<T, Error>>`
//! satisfies the same observable behaviour: polling again after the stream
//! has yielded `None` is the "false with nil Err" completion case, and a
//! yielded `Err` is the terminal error case.

mod cancel;
mod combinators;
pub mod sse;

pub use cancel::{CancellationToken, with_cancellation};
pub use combinators::{concat, filter, map, map_err, no_nil, slice_stream};

use crate::Error;
use futures::stream::BoxStream;

/// A boxed, owned event stream yielding fallible items — the Rust shape of
/// `spec.md`'s `Stream[T]` abstraction.
pub type EventStream<T> = BoxStream<'static, Result<T, Error>>;
