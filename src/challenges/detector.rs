//! Bot-challenge classification.
//!
//! Keyword-based heuristics over the response body plus the 403/429 status
//! check. Deliberately over-inclusive: a false positive just routes the
//! response to the resolution policy, which can fail fast. The keyword list
//! is kept here so the retry loop never depends on it directly.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

use crate::http::AttemptResponse;

/// Body markers that flag a response as a probable challenge page.
const CHALLENGE_MARKERS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "cloudflare",
    "challenge",
    "verification",
    "robot",
    "human",
];

/// Statuses commonly returned by bot-mitigation layers.
const CHALLENGE_STATUSES: &[u16] = &[403, 429];

/// Challenge families the resolver policy can distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    Recaptcha,
    Hcaptcha,
    Cloudflare,
    Generic,
    Unknown,
}

impl ChallengeKind {
    /// Kinds a token-solving service can be asked to handle.
    pub fn is_token_solvable(self) -> bool {
        matches!(self, ChallengeKind::Recaptcha | ChallengeKind::Hcaptcha)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeKind::Recaptcha => "recaptcha",
            ChallengeKind::Hcaptcha => "hcaptcha",
            ChallengeKind::Cloudflare => "cloudflare",
            ChallengeKind::Generic => "generic",
            ChallengeKind::Unknown => "unknown",
        }
    }
}

/// What the classifier learned about a flagged response.
///
/// Derived purely from the response in hand; never persisted beyond the
/// current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeInfo {
    pub kind: ChallengeKind,
    pub site_key: Option<String>,
    pub source_url: Url,
}

static SITE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"data-sitekey=["']([^"']+)["']"#)
        .case_insensitive(true)
        .build()
        .expect("invalid site-key regex")
});

/// Whether the response looks like a bot challenge.
pub fn detect_challenge(response: &AttemptResponse) -> bool {
    if CHALLENGE_STATUSES.contains(&response.status) {
        return true;
    }

    let body = response.text().to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Classify a flagged response by keyword priority and extract the site key.
pub fn extract_challenge_info(response: &AttemptResponse) -> ChallengeInfo {
    let text = response.text();
    let body = text.to_lowercase();

    let kind = if body.contains("recaptcha") || body.contains("g-recaptcha") {
        ChallengeKind::Recaptcha
    } else if body.contains("hcaptcha") || body.contains("h-captcha") {
        ChallengeKind::Hcaptcha
    } else if body.contains("cloudflare") || body.contains("cf-challenge") {
        ChallengeKind::Cloudflare
    } else if ["challenge", "verification", "robot"]
        .iter()
        .any(|marker| body.contains(marker))
    {
        ChallengeKind::Generic
    } else {
        ChallengeKind::Unknown
    };

    let site_key = SITE_KEY_RE
        .captures(&text)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str().to_string());

    ChallengeInfo {
        kind,
        site_key,
        source_url: response.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;

    fn response(body: &str, status: u16) -> AttemptResponse {
        AttemptResponse {
            url: Url::parse("https://drop.example.com/claim").unwrap(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn keyword_in_body_flags_challenge() {
        assert!(detect_challenge(&response("please verify you are HUMAN", 200)));
    }

    #[test]
    fn forbidden_status_flags_challenge_regardless_of_body() {
        assert!(detect_challenge(&response("{}", 403)));
        assert!(detect_challenge(&response("{}", 429)));
    }

    #[test]
    fn clean_response_is_not_a_challenge() {
        assert!(!detect_challenge(&response(
            r#"{"status":"claimed","amount":100}"#,
            200
        )));
    }

    #[test]
    fn recaptcha_wins_keyword_priority() {
        // "recaptcha" also contains "captcha"; the specific marker must win.
        let info = extract_challenge_info(&response(
            r#"<div class="g-recaptcha" data-sitekey="6LeIxAcTAAAAAJcZ"></div> cloudflare"#,
            200,
        ));
        assert_eq!(info.kind, ChallengeKind::Recaptcha);
        assert_eq!(info.site_key.as_deref(), Some("6LeIxAcTAAAAAJcZ"));
    }

    #[test]
    fn hcaptcha_classified_before_cloudflare() {
        let info = extract_challenge_info(&response(
            r#"<div class="h-captcha" data-sitekey='abc-def'></div> served by cloudflare"#,
            200,
        ));
        assert_eq!(info.kind, ChallengeKind::Hcaptcha);
        assert_eq!(info.site_key.as_deref(), Some("abc-def"));
    }

    #[test]
    fn cloudflare_page_without_captcha_markers() {
        let info = extract_challenge_info(&response("cf-challenge in progress", 403));
        assert_eq!(info.kind, ChallengeKind::Cloudflare);
        assert!(info.site_key.is_none());
    }

    #[test]
    fn generic_fallback_for_verification_pages() {
        let info = extract_challenge_info(&response("identity verification required", 403));
        assert_eq!(info.kind, ChallengeKind::Generic);
    }

    #[test]
    fn unknown_when_only_status_matched() {
        let info = extract_challenge_info(&response("access refused", 403));
        assert_eq!(info.kind, ChallengeKind::Unknown);
    }

    #[test]
    fn site_key_match_is_case_insensitive() {
        let info = extract_challenge_info(&response(
            r#"recaptcha DATA-SITEKEY="KeyValue123""#,
            200,
        ));
        assert_eq!(info.site_key.as_deref(), Some("KeyValue123"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let resp = response(
            r#"<div class="g-recaptcha" data-sitekey="abc123"></div>"#,
            429,
        );
        let first = extract_challenge_info(&resp);
        let second = extract_challenge_info(&resp);
        assert_eq!(first, second);
    }
}
