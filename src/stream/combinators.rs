use super::EventStream;
use crate::Error;
use futures::StreamExt;

/// A finite stream over an in-memory slice, restartable in the sense that a
/// fresh call produces a fresh stream — used pervasively by tests and by
/// `AggregateStreamChunks` implementations that replay fixture events.
pub fn slice_stream<T>(items: Vec<T>) -> EventStream<T>
where
    T: Send + 'static,
{
    futures::stream::iter(items.into_iter().map(Ok)).boxed()
}

/// Applies a pure function elementwise, short-circuiting on the first error.
pub fn map<T, U, F>(stream: EventStream<T>, mut f: F) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    stream.map(move |item| item.map(&mut f)).boxed()
}

/// Applies a fallible function elementwise; the first error stops iteration
/// and becomes the stream's terminal `Err`.
pub fn map_err<T, U, F>(stream: EventStream<T>, mut f: F) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Result<U, Error> + Send + 'static,
{
    stream
        .scan(false, move |done, item| {
            if *done {
                return futures::future::ready(None);
            }
            let mapped = item.and_then(&mut f);
            if mapped.is_err() {
                *done = true;
            }
            futures::future::ready(Some(mapped))
        })
        .boxed()
}

/// Skips elements for which `f` returns `None`, used because transformers
/// may intentionally collapse `[DONE]` sentinels to nothing.
pub fn no_nil<T, U, F>(stream: EventStream<T>, mut f: F) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Option<U> + Send + 'static,
{
    stream
        .filter_map(move |item| {
            let mapped = match item {
                Ok(value) => f(value).map(Ok),
                Err(e) => Some(Err(e)),
            };
            async move { mapped }
        })
        .boxed()
}

/// Keeps only elements for which the predicate holds; errors always pass
/// through untouched.
pub fn filter<T, F>(stream: EventStream<T>, mut predicate: F) -> EventStream<T>
where
    T: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    stream
        .filter_map(move |item| {
            let keep = match &item {
                Ok(value) => predicate(value),
                Err(_) => true,
            };
            async move { keep.then_some(item) }
        })
        .boxed()
}

/// Concatenates two streams, preserving arrival order within each but
/// making no ordering claim across the boundary (per `spec.md` §4.3/§5).
pub fn concat<T>(first: EventStream<T>, second: EventStream<T>) -> EventStream<T>
where
    T: Send + 'static,
{
    first.chain(second).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn slice_stream_yields_in_order() {
        let items: Vec<Result<i32, Error>> = slice_stream(vec![1, 2, 3]).collect().await;
        let values: Vec<i32> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn no_nil_drops_sentinels() {
        let stream = slice_stream(vec![Some(1), None, Some(2)]);
        let out: Vec<i32> = no_nil(stream, |x| x).collect::<Vec<_>>().await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, vec![1, 2]);
    }

    #[tokio::test]
    async fn map_err_stops_at_first_error() {
        let stream = slice_stream(vec![1, 2, 3]);
        let mapped = map_err(stream, |x| if x == 2 { Err(Error::stream("boom")) } else { Ok(x) });
        let out: Vec<_> = mapped.collect().await;
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }
}
