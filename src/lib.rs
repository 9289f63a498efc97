//! Provider-agnostic LLM protocol gateway core (`spec.md` §1-§2).
//!
//! This crate owns the canonical IR, the per-dialect `Inbound`/`Outbound`
//! transformers, the streaming pipeline, and the dialect-specific
//! invariants (Anthropic cache-control planning, Gemini thought-signature
//! preservation). It does not perform HTTP calls, select auth/channels,
//! persist anything, or expose a server/admin surface — those are external
//! collaborators (`spec.md` §1) that embed this crate, the way
//! `provider/*.rs` embeds `reqwest`/`axum` in the teacher repository.

pub mod codec;
pub mod dialect;
mod error;
pub mod http;
pub mod ir;
pub mod stream;
mod unknown_fields;

pub use error::{Error, Result};
