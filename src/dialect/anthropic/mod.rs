//! The Anthropic Messages dialect: wire types, the prompt-cache planner,
//! platform-specific URL/auth/body rules, and the Inbound/Outbound codecs.

pub mod aggregate;
pub mod cache_plan;
pub mod inbound;
pub mod outbound;
pub mod platform;
pub mod wire;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

const CLAUDE_CODE_SYSTEM_PROMPT: &str = "You are Claude Code, Anthropic's official CLI for Claude.";
const CLAUDE_CODE_USER_AGENT: &str = "claude-cli/1.0.83 (external, cli)";
const CLAUDE_CODE_BETA_HEADER: &str =
    "claude-code-20250219,oauth-2025-04-20,interleaved-thinking-2025-05-14,fine-grained-tool-streaming-2025-05-14";

const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";
const WEB_SEARCH_BETA: &str = "web-search-2025-03-05";

/// `ir::Request.metadata` key the inbound codec sets when it recognises a
/// Claude Code caller, read back by the outbound codec so the superset
/// headers/query param (`spec.md` §4.2/§6) are applied regardless of which
/// upstream platform is configured.
pub(crate) const CLAUDE_CODE_METADATA_KEY: &str = "anthropic_claude_code";
