use serde::{Deserialize, Serialize};

use crate::unknown_fields::UnknownFields;

pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";
pub const ERROR_TYPE_AUTHENTICATION: &str = "authentication_error";
pub const ERROR_TYPE_PERMISSION: &str = "permission_error";
pub const ERROR_TYPE_NOT_FOUND: &str = "not_found_error";
pub const ERROR_TYPE_RATE_LIMIT: &str = "rate_limit_error";
pub const ERROR_TYPE_API: &str = "api_error";
pub const ERROR_TYPE_OVERLOADED: &str = "overloaded_error";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    pub error: Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl Error {
    pub fn new(r#type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            message: message.into(),
            unknown_fields: UnknownFields::default(),
        }
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ERROR_TYPE_API, message)
    }
}

impl From<crate::Error> for ErrorResponse {
    fn from(error: crate::Error) -> Self {
        let (r#type, message, request_id): (String, String, Option<String>) = match error {
            crate::Error::InvalidRequest(message) => (ERROR_TYPE_INVALID_REQUEST.to_string(), message, None),
            crate::Error::Unsupported(message) => (ERROR_TYPE_INVALID_REQUEST.to_string(), message, None),
            crate::Error::Upstream {
                message,
                error_type,
                request_id,
                ..
            } => (error_type.unwrap_or_else(|| ERROR_TYPE_API.to_string()), message, request_id),
            crate::Error::Decode(message) => (ERROR_TYPE_API.to_string(), message, None),
            crate::Error::Stream(message) => (ERROR_TYPE_API.to_string(), message, None),
            crate::Error::Config(message) => (ERROR_TYPE_API.to_string(), message, None),
        };

        ErrorResponse {
            request_id,
            error: Error::new(r#type, message),
        }
    }
}
