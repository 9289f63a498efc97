/// A prompt-cache breakpoint attached to a tool, a system part, a message
/// content block, or a tool-result block.
///
/// Semantic meaning (what gets cached, how it is billed) is dialect-specific
/// and is defined in `dialect::anthropic::cache_plan`; the IR only carries
/// the marker itself so it survives a round-trip or a re-plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheControl {
    pub ttl: CacheControlTtl,
}

/// Time-to-live for an ephemeral cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheControlTtl {
    #[default]
    FiveMinutes,
    OneHour,
}
