//! Outbound request identity.
//!
//! Assembles the browser-fingerprint header set and session cookie sent with
//! every claim attempt. Built once per claim invocation and immutable
//! afterwards; the only mutation reserved for the future is the injection of
//! a challenge-resolution cookie or header supplied by a resolver.

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

/// Baseline browser fingerprint sent with every request.
const BASELINE_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br"),
    ("connection", "keep-alive"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

/// Immutable identity used for every attempt within one claim invocation.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub method: Method,
    pub headers: HeaderMap,
    pub payload: Option<serde_json::Value>,
}

impl RequestIdentity {
    /// Build the identity from an optional session cookie and extra headers.
    pub fn new(
        method: Method,
        cookie: Option<&str>,
        extra: Option<&HashMap<String, String>>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            method,
            headers: build_headers(cookie, extra),
            payload,
        }
    }
}

/// Merge the baseline fingerprint with the session cookie and caller extras.
///
/// The cookie is trimmed of surrounding whitespace and quote characters; a
/// missing or empty cookie simply yields headers without a `Cookie` entry.
/// Extras win on key collision. Invalid header names or values are skipped
/// with a warning rather than failing the build.
pub fn build_headers(cookie: Option<&str>, extra: Option<&HashMap<String, String>>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in BASELINE_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    if let Some(raw) = cookie {
        let cleaned = raw.trim().trim_matches('"');
        if !cleaned.is_empty() {
            match HeaderValue::from_str(cleaned) {
                Ok(value) => {
                    headers.insert(http::header::COOKIE, value);
                }
                Err(_) => log::warn!("cookie contains invalid header characters; skipping"),
            }
        }
    }

    if let Some(extra) = extra {
        for (name, value) in extra {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                log::warn!("invalid extra header name `{name}`; skipping");
                continue;
            };
            let Ok(header_value) = HeaderValue::from_str(value) else {
                log::warn!("invalid extra header value for `{name}`; skipping");
                continue;
            };
            headers.insert(header_name, header_value);
        }
    }

    headers
}

static COOKIE_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"url=([^;\s]+)",
        r"task_url=([^;\s]+)",
        r"claim_url=([^;\s]+)",
        r"endpoint=([^;\s]+)",
        r"api_url=([^;\s]+)",
        r"target=([^;\s]+)",
        r"https?://[^;\s]+",
    ]
    .iter()
    .map(|pattern| build_regex(pattern))
    .collect()
});

static COOKIE_DOMAIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"domain=([^;\s]+)", r"host=([^;\s]+)", r"site=([^;\s]+)"]
        .iter()
        .map(|pattern| build_regex(pattern))
        .collect()
});

/// Claim paths probed when only a domain can be recovered from the cookie.
const COMMON_CLAIM_PATHS: &[&str] = &["/claim", "/api/claim", "/task/claim", "/airdrop/claim"];

/// Recover a claim endpoint embedded in the session cookie.
///
/// Tries explicit URL-bearing keys first, then a bare URL, then falls back to
/// constructing an endpoint from a `domain=`/`host=`/`site=` value and a
/// well-known claim path.
pub fn extract_url_from_cookie(cookie: &str) -> Option<Url> {
    for pattern in COOKIE_URL_PATTERNS.iter() {
        for captures in pattern.captures_iter(cookie) {
            let raw = match captures.get(1) {
                Some(group) => group.as_str(),
                None => &captures[0],
            };
            let candidate = raw.trim().trim_matches('"').trim_matches('\'');
            if candidate.starts_with("http://") || candidate.starts_with("https://") {
                if let Ok(url) = Url::parse(candidate) {
                    if url.host_str().is_some() {
                        log::info!("extracted claim URL from cookie: {url}");
                        return Some(url);
                    }
                }
            }
        }
    }

    for pattern in COOKIE_DOMAIN_PATTERNS.iter() {
        for captures in pattern.captures_iter(cookie) {
            let Some(group) = captures.get(1) else {
                continue;
            };
            let domain = group.as_str().trim().trim_matches('"');
            if !domain.contains('.') {
                continue;
            }
            let path = COMMON_CLAIM_PATHS[0];
            if let Ok(url) = Url::parse(&format!("https://{domain}{path}")) {
                log::info!("constructed claim URL from cookie domain: {url}");
                return Some(url);
            }
        }
    }

    log::warn!("could not extract a claim URL from the cookie");
    None
}

fn build_regex(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|err| panic!("invalid cookie pattern `{pattern}`: {err}"))
}
