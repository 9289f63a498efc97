//! Wraps Gemini's opaque `thoughtSignature` so that an Anthropic outbound
//! transformer never mistakes it for `redacted_thinking` data (`spec.md`
//! §4.5). Grounded on `provider/google/input.rs`'s `GoogleFunctionCall`,
//! which carries a bare `thought_signature: Option<String>` with no
//! provenance marker — this module is what that teacher was missing.

const PREFIX: &str = "gemini-thought-signature:";

/// The sentinel Gemini expects on the first function-call part of an
/// assistant turn that has tool calls but no real signature to echo back.
pub const SENTINEL_SIGNATURE: &str = "context_engineering_is_the_way_to_go";

pub fn encode_gemini_thought_signature(raw: &str) -> crate::ir::ReasoningSignature {
    crate::ir::ReasoningSignature(format!("{PREFIX}{raw}"))
}

pub fn decode_gemini_thought_signature(signature: &crate::ir::ReasoningSignature) -> Option<&str> {
    signature.0.strip_prefix(PREFIX)
}

pub fn is_gemini_thought_signature(signature: &crate::ir::ReasoningSignature) -> bool {
    signature.0.starts_with(PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let wrapped = encode_gemini_thought_signature("sig-123");
        assert!(is_gemini_thought_signature(&wrapped));
        assert_eq!(decode_gemini_thought_signature(&wrapped), Some("sig-123"));
    }

    #[test]
    fn anthropic_origin_signature_is_not_mistaken_for_gemini() {
        let anthropic_signature = crate::ir::ReasoningSignature("abc123==".to_string());
        assert!(!is_gemini_thought_signature(&anthropic_signature));
    }
}
