//! The Gemini `generateContent` dialect: wire types, the thought-signature
//! preservation rule, and the Inbound/Outbound codecs.

pub mod aggregate;
pub mod inbound;
pub mod outbound;
pub mod thought_signature;
pub mod wire;

pub const NATIVE_TOOL_GOOGLE_SEARCH: &str = "google_search";
pub const NATIVE_TOOL_CODE_EXECUTION: &str = "google_code_execution";
pub const NATIVE_TOOL_URL_CONTEXT: &str = "google_url_context";
