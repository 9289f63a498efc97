//! Per-platform URL composition, auth materialisation, and body rewriting
//! for the Anthropic outbound codec (`spec.md` §4.2). Grounded on
//! `provider/anthropic.rs`'s `base_url.unwrap_or_else(...)` + header-setting
//! pattern, generalised across the platform list the spec adds; this crate
//! never performs the HTTP call itself, so there is no `reqwest::Client`
//! here, only string/header/body assembly.

use secrecy::ExposeSecret;

use crate::ir;

use super::{
    ANTHROPIC_VERSION, BEDROCK_ANTHROPIC_VERSION, CLAUDE_CODE_BETA_HEADER, CLAUDE_CODE_USER_AGENT, VERTEX_ANTHROPIC_VERSION, WEB_SEARCH_BETA,
    WEB_SEARCH_TOOL_TYPE,
};
use super::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformType {
    Direct,
    Bedrock,
    Vertex,
    Deepseek,
    Doubao,
    Moonshot,
    Zhipu,
    Zai,
    Longcat,
    ClaudeCode,
}

impl PlatformType {
    /// Bedrock, LongCat, and Claude Code authenticate with a bearer token;
    /// everything else (direct Anthropic included) uses the `X-API-Key`
    /// header.
    fn uses_bearer_auth(self) -> bool {
        matches!(self, Self::Bedrock | Self::Vertex | Self::Longcat | Self::ClaudeCode)
    }
}

/// Outbound codec configuration for one configured Anthropic-dialect
/// upstream (`spec.md` §4.2 "Environment/configuration of each outbound
/// codec").
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub platform_type: PlatformType,
    pub base_url: String,
    pub api_key: Option<secrecy::SecretString>,
    pub raw_url: Option<bool>,
    pub region: Option<String>,
    pub project_id: Option<String>,
}

/// Where a composed request ends up and what streaming mode it requested.
pub struct ComposedUrl {
    pub url: String,
    pub path: String,
}

/// Composes the outbound URL per `spec.md` §4.2's representative rules.
pub fn compose_url(config: &PlatformConfig, model: &str, streaming: bool) -> crate::Result<ComposedUrl> {
    let base = config.base_url.trim_end_matches('/');

    match config.platform_type {
        PlatformType::Bedrock => {
            let action = if streaming { "invoke-with-response-stream" } else { "invoke" };
            let path = format!("/model/{model}/{action}");
            Ok(ComposedUrl {
                url: format!("{base}{path}"),
                path,
            })
        }
        PlatformType::Vertex => {
            let project = config
                .project_id
                .as_deref()
                .ok_or_else(|| crate::Error::invalid_request("vertex platform requires project_id"))?;
            let region = config
                .region
                .as_deref()
                .ok_or_else(|| crate::Error::invalid_request("vertex platform requires region"))?;
            let action = if streaming { "streamRawPredict" } else { "rawPredict" };
            let path = format!("/v1/projects/{project}/locations/{region}/publishers/anthropic/models/{model}:{action}");
            Ok(ComposedUrl {
                url: format!("{base}{path}"),
                path,
            })
        }
        _ => {
            let raw_url = config.raw_url.unwrap_or(false) || config.base_url.ends_with('#');
            if raw_url {
                let stripped = base.trim_end_matches('#');
                let path = "/messages".to_string();
                return Ok(ComposedUrl {
                    url: format!("{stripped}{path}"),
                    path,
                });
            }

            let path = if base.ends_with("/v1") { "/messages" } else { "/v1/messages" };
            Ok(ComposedUrl {
                url: format!("{base}{path}"),
                path: path.to_string(),
            })
        }
    }
}

/// Materialises `auth` into the exact header the platform expects, and
/// clears the IR `Auth` in place so downstream observers never see the
/// secret twice (`spec.md` §4.2). `claude_code` forces bearer auth even on
/// a platform that otherwise uses the `X-API-Key` header (Direct Anthropic
/// included), matching the Claude Code superset's "authentication is forced
/// to bearer regardless of the incoming auth scheme" rule (`spec.md` §6).
pub fn materialise_auth(config: &PlatformConfig, auth: &mut Option<ir::Auth>, headers: &mut http::HeaderMap, claude_code: bool) -> crate::Result<()> {
    let uses_bearer = config.platform_type.uses_bearer_auth() || claude_code;
    let Some(credentials) = auth.take() else {
        return Err(crate::Error::invalid_request("missing auth credentials"));
    };

    if uses_bearer {
        let key = credentials
            .api_key
            .as_ref()
            .ok_or_else(|| crate::Error::invalid_request("bearer auth requires a non-empty api key"))?;
        if key.expose_secret().is_empty() {
            return Err(crate::Error::invalid_request("bearer auth requires a non-empty api key"));
        }
        let value = http::HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
            .map_err(|e| crate::Error::invalid_request(format!("invalid auth header value: {e}")))?;
        headers.insert(http::header::AUTHORIZATION, value);
    } else {
        let key = credentials
            .api_key
            .as_ref()
            .ok_or_else(|| crate::Error::invalid_request("x-api-key auth requires a non-empty api key"))?;
        if key.expose_secret().is_empty() {
            return Err(crate::Error::invalid_request("x-api-key auth requires a non-empty api key"));
        }
        let header_name = credentials.header_key.as_deref().unwrap_or("x-api-key");
        let name = http::HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| crate::Error::invalid_request(format!("invalid auth header name: {e}")))?;
        let value = http::HeaderValue::from_str(key.expose_secret())
            .map_err(|e| crate::Error::invalid_request(format!("invalid auth header value: {e}")))?;
        headers.insert(name, value);
    }

    Ok(())
}

/// Rewrites platform-specific body fields and headers after the request is
/// otherwise fully assembled (`spec.md` §4.2 "Platform quirks"). `claude_code`
/// is the flag the inbound codec threaded through `ir::Request.metadata`
/// after recognising a Claude Code caller (`spec.md` §6 "Claude Code
/// superset") — it forces the superset headers regardless of which upstream
/// platform is configured, same as a `PlatformType::ClaudeCode` deployment.
pub fn apply_platform_quirks(config: &PlatformConfig, request: &mut wire::Request, headers: &mut http::HeaderMap, claude_code: bool) {
    headers.insert(
        http::HeaderName::from_static("anthropic-version"),
        http::HeaderValue::from_static(anthropic_version(config.platform_type)),
    );

    let has_web_search = request
        .tools
        .as_ref()
        .is_some_and(|tools| tools.iter().any(|t| t.kind.as_ref().is_some_and(|k| matches!(k, wire::ToolKind::Unknown(raw) if raw == WEB_SEARCH_TOOL_TYPE))));

    match config.platform_type {
        PlatformType::Bedrock => {
            request.stream = None;
            if has_web_search {
                push_anthropic_beta_body_field(request, WEB_SEARCH_BETA);
            }
        }
        PlatformType::Vertex => {
            // Vertex carries the model in the URL and never sends the beta header.
        }
        _ => {
            if has_web_search {
                append_beta_header(headers, WEB_SEARCH_BETA);
            }
        }
    }

    if claude_code || config.platform_type == PlatformType::ClaudeCode {
        append_beta_header(headers, CLAUDE_CODE_BETA_HEADER);
        headers.insert(
            http::HeaderName::from_static("anthropic-dangerous-direct-browser-access"),
            http::HeaderValue::from_static("true"),
        );
        headers.insert(http::HeaderName::from_static("x-app"), http::HeaderValue::from_static("cli"));
        if !headers.contains_key(http::header::USER_AGENT) {
            headers.insert(http::header::USER_AGENT, http::HeaderValue::from_static(CLAUDE_CODE_USER_AGENT));
        }
    }
}

fn anthropic_version(platform_type: PlatformType) -> &'static str {
    match platform_type {
        PlatformType::Bedrock => BEDROCK_ANTHROPIC_VERSION,
        PlatformType::Vertex => VERTEX_ANTHROPIC_VERSION,
        _ => ANTHROPIC_VERSION,
    }
}

fn append_beta_header(headers: &mut http::HeaderMap, value: &str) {
    let name = http::HeaderName::from_static("anthropic-beta");
    match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.split(',').any(|part| part.trim() == value) => {
            let combined = format!("{existing},{value}");
            if let Ok(header_value) = http::HeaderValue::from_str(&combined) {
                headers.insert(name, header_value);
            }
        }
        Some(_) => {}
        None => {
            headers.insert(name, http::HeaderValue::from_str(value).expect("ascii beta flag"));
        }
    }
}

fn push_anthropic_beta_body_field(request: &mut wire::Request, value: &str) {
    let entry = request.unknown_fields.get("anthropic_beta").cloned();
    let mut flags: Vec<String> = match entry {
        Some(serde_json::Value::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    if !flags.iter().any(|f| f == value) {
        flags.push(value.to_string());
    }
    request
        .unknown_fields
        .insert("anthropic_beta", serde_json::Value::Array(flags.into_iter().map(serde_json::Value::String).collect()));
}

/// Bedrock clears `model` from the body (it's in the URL).
pub fn clear_body_model_for_bedrock(body: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = body {
        map.remove("model");
        map.remove("stream");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(platform_type: PlatformType, base_url: &str) -> PlatformConfig {
        PlatformConfig {
            platform_type,
            base_url: base_url.to_string(),
            api_key: Some(secrecy::SecretString::from("key".to_string())),
            raw_url: None,
            region: None,
            project_id: None,
        }
    }

    #[test]
    fn default_appends_v1_messages() {
        let composed = compose_url(&config(PlatformType::Direct, "https://api.anthropic.com"), "claude-3", false).unwrap();
        assert_eq!(composed.url, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn base_ending_in_v1_skips_duplicate_segment() {
        let composed = compose_url(&config(PlatformType::Direct, "https://api.anthropic.com/v1"), "claude-3", false).unwrap();
        assert_eq!(composed.url, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn raw_url_sentinel_strips_trailing_hash() {
        let composed = compose_url(&config(PlatformType::Direct, "https://gateway.internal/proxy#"), "claude-3", false).unwrap();
        assert_eq!(composed.url, "https://gateway.internal/proxy/messages");
    }

    #[test]
    fn bedrock_composes_model_scoped_invoke_path() {
        let composed = compose_url(&config(PlatformType::Bedrock, "https://bedrock.example"), "anthropic.claude-3", true).unwrap();
        assert_eq!(composed.url, "https://bedrock.example/model/anthropic.claude-3/invoke-with-response-stream");
    }

    #[test]
    fn vertex_requires_project_and_region() {
        let err = compose_url(&config(PlatformType::Vertex, "https://vertex.example"), "claude-3", false).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidRequest(_)));
    }

    #[test]
    fn vertex_composes_publisher_path() {
        let mut cfg = config(PlatformType::Vertex, "https://vertex.example");
        cfg.project_id = Some("proj".to_string());
        cfg.region = Some("us-central1".to_string());
        let composed = compose_url(&cfg, "claude-3", true).unwrap();
        assert_eq!(
            composed.url,
            "https://vertex.example/v1/projects/proj/locations/us-central1/publishers/anthropic/models/claude-3:streamRawPredict"
        );
    }

    #[test]
    fn bearer_auth_sets_authorization_header() {
        let cfg = config(PlatformType::Bedrock, "https://bedrock.example");
        let mut auth = Some(ir::Auth {
            kind: ir::AuthKind::Bearer,
            api_key: Some(secrecy::SecretString::from("tok".to_string())),
            header_key: None,
        });
        let mut headers = http::HeaderMap::new();
        materialise_auth(&cfg, &mut auth, &mut headers, false).unwrap();
        assert_eq!(headers.get(http::header::AUTHORIZATION).unwrap(), "Bearer tok");
        assert!(auth.is_none());
    }

    #[test]
    fn api_key_auth_sets_x_api_key_header() {
        let cfg = config(PlatformType::Direct, "https://api.anthropic.com");
        let mut auth = Some(ir::Auth {
            kind: ir::AuthKind::ApiKeyHeader,
            api_key: Some(secrecy::SecretString::from("tok".to_string())),
            header_key: None,
        });
        let mut headers = http::HeaderMap::new();
        materialise_auth(&cfg, &mut auth, &mut headers, false).unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "tok");
    }

    #[test]
    fn claude_code_flag_injects_superset_headers() {
        let cfg = config(PlatformType::Direct, "https://api.anthropic.com");
        let mut request = wire::Request {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: Vec::new(),
            max_tokens: 1024,
            system: None,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            stream: None,
            metadata: None,
            tools: None,
            tool_choice: None,
            container: None,
            context_management: None,
            mcp_servers: None,
            service_tier: None,
            thinking: None,
            unknown_fields: Default::default(),
        };
        let mut headers = http::HeaderMap::new();
        apply_platform_quirks(&cfg, &mut request, &mut headers, true);

        assert_eq!(headers.get("anthropic-beta").unwrap(), CLAUDE_CODE_BETA_HEADER);
        assert_eq!(headers.get("anthropic-dangerous-direct-browser-access").unwrap(), "true");
        assert_eq!(headers.get("x-app").unwrap(), "cli");
        assert_eq!(headers.get(http::header::USER_AGENT).unwrap(), CLAUDE_CODE_USER_AGENT);
    }

    #[test]
    fn empty_bearer_key_is_rejected() {
        let cfg = config(PlatformType::Bedrock, "https://bedrock.example");
        let mut auth = Some(ir::Auth {
            kind: ir::AuthKind::Bearer,
            api_key: Some(secrecy::SecretString::from(String::new())),
            header_key: None,
        });
        let mut headers = http::HeaderMap::new();
        assert!(materialise_auth(&cfg, &mut auth, &mut headers, false).is_err());
    }
}
