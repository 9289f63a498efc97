//! The `Inbound`/`Outbound` transformer contract (`spec.md` §4.1/§4.2).
//!
//! Marshalling, cache-planning, and aggregation are synchronous (`spec.md`
//! §5: "operations inside a transformer are CPU-bound and non-suspending");
//! only `aggregate_stream_chunks` actually drives a stream to completion and
//! is therefore `async`. Native `async fn` in traits (stable since the 2024
//! edition) is sufficient here — nothing in this crate needs `dyn
//! Inbound`/`dyn Outbound` objects, so `async-trait` is not needed.

use crate::{
    Error,
    http,
    ir,
    stream::EventStream,
};

/// Metadata a non-streaming `AggregateStreamChunks` call recovers alongside
/// the reconstructed body, per `spec.md` §4.1/§4.2.
#[derive(Debug, Clone, Default)]
pub struct AggregateMeta {
    pub id: Option<String>,
    pub usage: Option<ir::Usage>,
}

/// Converts caller-dialect wire into IR and IR back into caller-dialect wire.
pub trait Inbound {
    type WireRequest;
    type WireResponse;
    type WireStreamEvent: Send + 'static;

    fn transform_request(&self, wire: Self::WireRequest) -> Result<ir::Request, Error>;
    fn transform_response(&self, response: ir::Response) -> Result<Self::WireResponse, Error>;
    fn transform_stream(&self, events: EventStream<ir::Response>) -> EventStream<Self::WireStreamEvent>;

    fn aggregate_stream_chunks(
        &self,
        events: EventStream<Self::WireStreamEvent>,
    ) -> impl std::future::Future<Output = Result<(Self::WireResponse, AggregateMeta), Error>> + Send;
}

/// Converts IR into the upstream provider's wire and the provider's wire
/// back into IR.
pub trait Outbound {
    fn transform_request(&self, request: ir::Request) -> Result<http::Request, Error>;
    fn transform_response(&self, response: http::Response) -> Result<ir::Response, Error>;
    fn transform_stream(&self, events: EventStream<ir::StreamEvent>) -> EventStream<ir::Response>;

    fn aggregate_stream_chunks(
        &self,
        events: EventStream<ir::StreamEvent>,
    ) -> impl std::future::Future<Output = Result<(ir::Response, AggregateMeta), Error>> + Send;

    fn transform_error(&self, error: http::HttpError) -> Error;
}
