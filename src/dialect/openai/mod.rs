//! The OpenAI-compatible `/chat/completions` dialect: wire types and the
//! Inbound/Outbound codecs.

pub mod aggregate;
pub mod inbound;
pub mod outbound;
pub mod wire;
