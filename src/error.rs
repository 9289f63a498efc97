use thiserror::Error;

/// Error taxonomy by kind, not by provider or call site — every dialect
/// codec and the stream core raise one of these six kinds; the exact
/// message is provider-specific but the kind drives the HTTP status a
/// caller-facing layer maps it to.
#[derive(Debug, Error)]
pub enum Error {
    /// An IR value failed validation (empty model, no messages, non-positive
    /// `max_tokens`, unsupported request kind, missing Vertex project/region).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation is recognised but not implemented for this codec path.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The HTTP client returned a non-2xx response from the provider.
    #[error("upstream error ({status_code}): {message}")]
    Upstream {
        status_code: u16,
        message: String,
        error_type: Option<String>,
        request_id: Option<String>,
    },

    /// A response body could not be parsed (empty, malformed JSON, wrong shape).
    #[error("could not decode response body: {0}")]
    Decode(String),

    /// SSE decoder failure or mid-stream cancellation.
    #[error("stream error: {0}")]
    Stream(String),

    /// Misconfiguration, e.g. bearer auth requested without a key.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status a caller-facing layer would surface for this kind.
    /// `Upstream` defaults to 500 when the provider's own status was absent,
    /// per `spec.md` §7.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::Unsupported(_) => 400,
            Self::Upstream { status_code, .. } => {
                if *status_code == 0 {
                    500
                } else {
                    *status_code
                }
            }
            Self::Decode(_) => 502,
            Self::Stream(_) => 502,
            Self::Config(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
