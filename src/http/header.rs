//! Header forwarding hygiene.
//!
//! Extends `proxy/utils/headers.rs`'s single hop-by-hop strip list into the
//! three-category allowlist model `spec.md` §4.2 requires: headers are
//! either library-managed (never forwarded, the transport layer sets its
//! own), blocked (never forwarded, routing/browser internals), sensitive
//! (never forwarded raw, but redacted to `******` rather than dropped when
//! logged), or ordinary (forwarded as-is, unless listed in the
//! merge-with-append set, in which case inbound and outbound values are
//! appended and deduplicated instead of one overwriting the other).

use std::collections::HashSet;
use std::sync::OnceLock;

use http::HeaderName;

const REDACTED: &str = "******";

fn library_managed() -> &'static HashSet<HeaderName> {
    static SET: OnceLock<HashSet<HeaderName>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            http::header::CONTENT_LENGTH,
            http::header::TRANSFER_ENCODING,
            http::header::ACCEPT_ENCODING,
            http::header::HOST,
        ]
        .into_iter()
        .collect()
    })
}

fn blocked() -> &'static HashSet<HeaderName> {
    static SET: OnceLock<HashSet<HeaderName>> = OnceLock::new();
    SET.get_or_init(|| {
        let mut set: HashSet<HeaderName> = [
            http::header::CONTENT_TYPE,
            http::header::CONNECTION,
            http::header::ORIGIN,
            http::header::REFERER,
        ]
        .into_iter()
        .collect();
        for name in [
            "x-real-ip",
            "x-forwarded-for",
            "x-forwarded-host",
            "x-forwarded-proto",
            "sec-fetch-site",
            "sec-fetch-mode",
            "sec-fetch-dest",
            "sec-fetch-user",
            "x-channel-id",
            "x-project-id",
        ] {
            set.insert(HeaderName::from_static(name));
        }
        set
    })
}

fn sensitive() -> &'static HashSet<HeaderName> {
    static SET: OnceLock<HashSet<HeaderName>> = OnceLock::new();
    SET.get_or_init(|| {
        let mut set: HashSet<HeaderName> = [http::header::AUTHORIZATION, http::header::COOKIE].into_iter().collect();
        for name in ["api-key", "x-api-key", "x-goog-api-key"] {
            set.insert(HeaderName::from_static(name));
        }
        set
    })
}

/// Process-wide default merge-with-append set; empty unless an embedding
/// application pushes entries in before serving any request, per §5's
/// "writes permitted only during initialisation" rule. Prefer
/// [`HeaderPolicy`] in tests so neighbouring tests can't observe each
/// other's writes to this table.
fn default_merge_with_append() -> &'static HashSet<HeaderName> {
    static SET: OnceLock<HashSet<HeaderName>> = OnceLock::new();
    SET.get_or_init(HashSet::new)
}

/// An immutable, independently constructible classification table — the
/// redesign `spec.md` §9 recommends in place of the process-wide statics,
/// offered alongside [`HeaderPolicy::default`] (which reads the statics)
/// so existing call sites keep working.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    merge_with_append: HashSet<HeaderName>,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            merge_with_append: default_merge_with_append().clone(),
        }
    }
}

impl HeaderPolicy {
    pub fn with_merge_with_append(names: impl IntoIterator<Item = HeaderName>) -> Self {
        Self {
            merge_with_append: names.into_iter().collect(),
        }
    }

    pub fn is_forwardable(&self, name: &HeaderName) -> bool {
        !library_managed().contains(name) && !blocked().contains(name) && !sensitive().contains(name)
    }

    pub fn is_sensitive(&self, name: &HeaderName) -> bool {
        sensitive().contains(name)
    }

    pub fn merges_with_append(&self, name: &HeaderName) -> bool {
        self.merge_with_append.contains(name)
    }

    /// Builds the header set to forward upstream: drops library-managed,
    /// blocked, and sensitive headers from `inbound`, then layers `outbound`
    /// on top — merge-with-append headers get inbound and outbound values
    /// concatenated and deduplicated, everything else in `outbound` wins.
    pub fn forward(&self, inbound: &http::HeaderMap, outbound: &http::HeaderMap) -> http::HeaderMap {
        let mut result = http::HeaderMap::new();

        for (name, value) in inbound.iter() {
            if self.is_forwardable(name) {
                result.append(name.clone(), value.clone());
            }
        }

        for name in outbound.keys() {
            if self.merges_with_append(name) {
                continue;
            }
            result.remove(name);
        }

        for (name, value) in outbound.iter() {
            result.append(name.clone(), value.clone());
        }

        result
    }

    /// Renders `headers` for logs with every sensitive value replaced by
    /// `******`, preserving ordinary headers verbatim.
    pub fn redact_for_logging(&self, headers: &http::HeaderMap) -> http::HeaderMap {
        let mut redacted = http::HeaderMap::new();
        for (name, value) in headers.iter() {
            if self.is_sensitive(name) {
                redacted.append(name.clone(), http::HeaderValue::from_static(REDACTED));
            } else {
                redacted.append(name.clone(), value.clone());
            }
        }
        redacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> http::HeaderMap {
        let mut map = http::HeaderMap::new();
        for (name, value) in pairs {
            map.append(HeaderName::from_bytes(name.as_bytes()).unwrap(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn drops_blocked_and_sensitive_headers() {
        let policy = HeaderPolicy::default();
        let inbound = header_map(&[
            ("authorization", "Bearer secret"),
            ("x-forwarded-for", "1.2.3.4"),
            ("x-custom", "keep-me"),
        ]);
        let forwarded = policy.forward(&inbound, &http::HeaderMap::new());
        assert!(forwarded.get("authorization").is_none());
        assert!(forwarded.get("x-forwarded-for").is_none());
        assert_eq!(forwarded.get("x-custom").unwrap(), "keep-me");
    }

    #[test]
    fn redacts_sensitive_values_for_logging() {
        let policy = HeaderPolicy::default();
        let headers = header_map(&[("authorization", "Bearer secret")]);
        let redacted = policy.redact_for_logging(&headers);
        assert_eq!(redacted.get("authorization").unwrap(), "******");
    }

    #[test]
    fn merge_with_append_concatenates_instead_of_overwriting() {
        let policy = HeaderPolicy::with_merge_with_append([HeaderName::from_static("x-trace")]);
        let inbound = header_map(&[("x-trace", "a")]);
        let outbound = header_map(&[("x-trace", "b")]);
        let forwarded = policy.forward(&inbound, &outbound);
        let values: Vec<_> = forwarded.get_all("x-trace").iter().collect();
        assert_eq!(values.len(), 2);
    }
}
