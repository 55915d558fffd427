//! Challenge resolution strategies.
//!
//! Given a classified challenge, a strategy either clears the way for the
//! blocked attempt to be re-issued or gives up. The policy mirrors the
//! operator-facing contract: when interactive resolution is enabled its
//! verdict is final; otherwise an automated solving service is consulted for
//! token-solvable challenges.

pub mod captcha;
pub mod manual;

pub use captcha::{CaptchaServiceResolver, SolverPacing};
pub use manual::ManualResolver;

use std::sync::Arc;

use async_trait::async_trait;

use crate::challenges::detector::ChallengeInfo;
use crate::http::AttemptResponse;

/// Verdict of a resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The attempt may be re-issued. A solving service may supply a token;
    /// injecting it into the retried request (header or cookie) is a
    /// reserved extension point. Today the origin is expected to
    /// re-evaluate session state on the bare retry.
    Resolved { token: Option<String> },
    /// The challenge stands; the claim must fail.
    GaveUp,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// A single interchangeable resolution strategy.
#[async_trait]
pub trait ChallengeResolver: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self, challenge: &ChallengeInfo, response: &AttemptResponse) -> Resolution;
}

/// Ordered strategy selection applied by the claim loop.
#[derive(Default, Clone)]
pub struct ResolutionPolicy {
    manual: Option<Arc<dyn ChallengeResolver>>,
    automated: Option<Arc<dyn ChallengeResolver>>,
}

impl ResolutionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the interactive strategy. When present, its answer is final and
    /// the automated path is never consulted.
    pub fn with_manual(mut self, resolver: Arc<dyn ChallengeResolver>) -> Self {
        self.manual = Some(resolver);
        self
    }

    /// Attach the automated solving-service strategy.
    pub fn with_automated(mut self, resolver: Arc<dyn ChallengeResolver>) -> Self {
        self.automated = Some(resolver);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.manual.is_none() && self.automated.is_none()
    }

    /// Run the applicable strategy for this challenge.
    pub async fn handle(
        &self,
        challenge: &ChallengeInfo,
        response: &AttemptResponse,
    ) -> Resolution {
        if let Some(manual) = &self.manual {
            log::info!("attempting manual challenge resolution");
            return manual.resolve(challenge, response).await;
        }

        if let Some(automated) = &self.automated {
            log::info!("attempting automated challenge resolution");
            return automated.resolve(challenge, response).await;
        }

        log::warn!("no resolution strategy configured; giving up on challenge");
        Resolution::GaveUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenges::detector::ChallengeKind;
    use bytes::Bytes;
    use http::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct Scripted {
        verdict: Resolution,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(verdict: Resolution) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChallengeResolver for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn resolve(&self, _: &ChallengeInfo, _: &AttemptResponse) -> Resolution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn fixture() -> (ChallengeInfo, AttemptResponse) {
        let url = Url::parse("https://drop.example.com/claim").unwrap();
        (
            ChallengeInfo {
                kind: ChallengeKind::Recaptcha,
                site_key: Some("key".into()),
                source_url: url.clone(),
            },
            AttemptResponse {
                url,
                status: 403,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"recaptcha"),
            },
        )
    }

    #[tokio::test]
    async fn manual_verdict_is_final_even_on_give_up() {
        let manual = Scripted::new(Resolution::GaveUp);
        let automated = Scripted::new(Resolution::Resolved { token: None });
        let policy = ResolutionPolicy::new()
            .with_manual(manual.clone())
            .with_automated(automated.clone());

        let (challenge, response) = fixture();
        assert_eq!(policy.handle(&challenge, &response).await, Resolution::GaveUp);
        assert_eq!(manual.calls.load(Ordering::SeqCst), 1);
        assert_eq!(automated.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn automated_runs_when_manual_is_absent() {
        let automated = Scripted::new(Resolution::Resolved {
            token: Some("tok".into()),
        });
        let policy = ResolutionPolicy::new().with_automated(automated.clone());

        let (challenge, response) = fixture();
        assert!(policy.handle(&challenge, &response).await.is_resolved());
        assert_eq!(automated.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_policy_gives_up() {
        let (challenge, response) = fixture();
        let policy = ResolutionPolicy::new();
        assert!(policy.is_empty());
        assert_eq!(policy.handle(&challenge, &response).await, Resolution::GaveUp);
    }
}
