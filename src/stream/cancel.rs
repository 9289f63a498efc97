use super::EventStream;
use crate::Error;
use futures::StreamExt;

/// A cancellation handle derived from the caller's request scope.
///
/// Thin wrapper around `tokio_util::sync::CancellationToken` rather than a
/// bespoke context type: it already gives the "idempotent, observable
/// exactly once" semantics `spec.md` §5 asks for (`is_cancelled()` is safe
/// to poll repeatedly; `cancel()` is a no-op once already cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(tokio_util::sync::CancellationToken);

impl CancellationToken {
    pub fn new() -> Self {
        Self(tokio_util::sync::CancellationToken::new())
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub fn child_token(&self) -> Self {
        Self(self.0.child_token())
    }
}

/// Wraps `stream` so that once `token` is cancelled, the next poll yields a
/// terminal `Err(Error::Stream(..))` and no further items, matching the
/// "pending `Next` returns false with `Err = cancellation`" rule. The
/// underlying stream is dropped at that point, which is this crate's
/// equivalent of closing the upstream HTTP body on cancellation (actually
/// closing the body is the HTTP client collaborator's responsibility; this
/// crate only guarantees the stream stops being polled).
pub fn with_cancellation<T>(stream: EventStream<T>, token: CancellationToken) -> EventStream<T>
where
    T: Send + 'static,
{
    futures::stream::unfold((stream, token, false), |(mut stream, token, mut done)| async move {
        if done {
            return None;
        }
        if token.is_cancelled() {
            done = true;
            return Some((Err(Error::stream("cancelled")), (stream, token, done)));
        }
        match stream.next().await {
            Some(item) => {
                if item.is_err() {
                    done = true;
                }
                Some((item, (stream, token, done)))
            }
            None => None,
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::slice_stream;

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let stream = with_cancellation(slice_stream(vec![1, 2, 3]), token);
        let out: Vec<_> = stream.collect().await;
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[tokio::test]
    async fn uncancelled_passes_through() {
        let token = CancellationToken::new();
        let stream = with_cancellation(slice_stream(vec![1, 2, 3]), token);
        let out: Vec<_> = stream.collect().await;
        assert_eq!(out.len(), 3);
    }
}
