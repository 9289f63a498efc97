//! HTTP boundary types consumed by the core and produced by the external
//! HTTP client collaborator (`spec.md` §6). This crate never performs an
//! HTTP call itself; it only defines the shapes `Do`/`DoStream` exchange.

pub mod header;

use std::collections::HashMap;

use crate::ir;
use crate::stream::sse::ByteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outbound wire request assembled by an `Outbound` codec and handed to the
/// HTTP client collaborator's `Do`/`DoStream`.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: http::HeaderMap,
    pub content_type: Option<String>,
    pub body: bytes::Bytes,
    /// Alternative log-friendly body, used when `body` has already been
    /// through a non-JSON encoding step (e.g. sonic-rs's faster encoder).
    pub json_body: Option<bytes::Bytes>,
    pub auth: Option<ir::Auth>,
    pub request_id: Option<String>,
    pub raw_request: Option<ir::RawRequest>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A non-2xx upstream response, already classified as an error by the HTTP
/// client collaborator so the core can call `Outbound::transform_error`
/// without re-parsing HTTP status handling.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status_code: u16,
    pub headers: http::HeaderMap,
    pub body: bytes::Bytes,
}

/// Non-streaming upstream response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub headers: http::HeaderMap,
    pub body: bytes::Bytes,
}

/// What `DoStream` returns: a live decoder over upstream SSE bytes.
pub struct StreamDecoder {
    pub status_code: u16,
    pub headers: http::HeaderMap,
    pub bytes: ByteStream,
}

/// The HTTP client contract this crate depends on but never implements.
/// An embedding application supplies a concrete implementation (typically
/// backed by `reqwest`, matching the teacher's `provider::HttpProvider`
/// split between "build the request" and "run the event loop" — this
/// crate keeps only the former).
pub trait HttpClient: Send + Sync {
    fn do_request(
        &self,
        request: Request,
        token: crate::stream::CancellationToken,
    ) -> impl std::future::Future<Output = Result<Response, HttpError>> + Send;

    fn do_stream(
        &self,
        request: Request,
        token: crate::stream::CancellationToken,
    ) -> impl std::future::Future<Output = Result<StreamDecoder, HttpError>> + Send;
}
