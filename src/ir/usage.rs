/// Token accounting. Invariant: `total == prompt + completion`;
/// `prompt_details.cached_tokens <= prompt`. Dialect-specific conversions
/// (Anthropic additive cache accounting vs. Moonshot's already-included
/// convention, Gemini's `promptTokenCount` already including cached tokens)
/// are applied by each aggregator/outbound codec before producing this type;
/// `Usage` itself carries only the OpenAI-style normalised convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub prompt_details: PromptUsageDetails,
    pub completion_details: CompletionUsageDetails,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            prompt_details: PromptUsageDetails::default(),
            completion_details: CompletionUsageDetails::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptUsageDetails {
    pub cached_tokens: u32,
    pub cache_write_5m_tokens: u32,
    pub cache_write_1h_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionUsageDetails {
    pub reasoning_tokens: u32,
}
