//! Claim orchestration.
//!
//! Wires the transport, challenge classifier, resolution policy, artifact
//! store, and notifier into the retry-bounded request loop. The loop owns
//! every decision: one immutable identity per invocation, a strictly
//! increasing attempt counter, client errors terminal on sight, transient
//! failures retried up to the bound, and challenges routed through the
//! resolution policy with a free re-issue of the same attempt on success.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::artifacts::{ArtifactStore, FileArtifactStore};
use crate::challenges::detector::{ChallengeInfo, detect_challenge, extract_challenge_info};
use crate::challenges::resolver::{
    CaptchaServiceResolver, ChallengeResolver, ManualResolver, Resolution, ResolutionPolicy,
    SolverPacing,
};
use crate::config::{ClaimerConfig, ConfigError};
use crate::external_deps::captcha::{SolverClient, SolverError, TwoCaptchaClient};
use crate::external_deps::notify::{ClaimEvent, Notifier};
use crate::http::{AttemptResponse, ClaimHttpClient, ClaimHttpError, ReqwestClaimHttpClient};
use crate::identity::RequestIdentity;

/// Characters of body included in previews and result messages.
const PREVIEW_CHARS: usize = 500;
/// Characters of a final message forwarded to the notification collaborator.
const NOTIFICATION_CHARS: usize = 1000;

/// Construction-time failures. The claim loop itself never errors.
#[derive(Debug, Error)]
pub enum ClaimerError {
    #[error("http client initialisation failed: {0}")]
    Http(#[from] ClaimHttpError),
    #[error("solver initialisation failed: {0}")]
    Solver(#[from] SolverError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// One claim invocation: target, method, optional payload, and optional
/// per-call overrides of the configured retry parameters.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub url: Url,
    pub method: Method,
    pub payload: Option<serde_json::Value>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub retry_delay: Option<Duration>,
}

impl ClaimRequest {
    pub fn get(url: Url) -> Self {
        Self::new(url, Method::GET)
    }

    pub fn post(url: Url) -> Self {
        Self::new(url, Method::POST)
    }

    fn new(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            payload: None,
            max_retries: None,
            timeout: None,
            retry_delay: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

/// Terminal verdict of one claim invocation.
#[derive(Debug, Clone)]
pub struct ClaimResult {
    pub success: bool,
    pub message: String,
    /// Handle to the last archived response, when persistence is enabled.
    pub artifact: Option<PathBuf>,
    /// Attempt the loop ended on.
    pub attempts: u32,
}

impl ClaimResult {
    fn succeeded(message: String, attempts: u32, artifact: Option<PathBuf>) -> Self {
        Self {
            success: true,
            message,
            artifact,
            attempts,
        }
    }

    fn failed(message: String, attempts: u32, artifact: Option<PathBuf>) -> Self {
        Self {
            success: false,
            message,
            artifact,
            attempts,
        }
    }
}

/// Classification of a received response.
///
/// Requests that never produce a response surface as [`ClaimHttpError`],
/// whose variants (timeout, connection failure, other transport fault) are
/// the transport half of the outcome taxonomy.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success { status: u16, preview: String },
    ClientError { status: u16, preview: String },
    ServerError { status: u16, preview: String },
    ChallengeDetected(ChallengeInfo),
}

/// Map a received response onto the outcome taxonomy.
///
/// Challenge detection runs before status classification so that a flagged
/// 403/429 (or a keyword-bearing 200) reaches the resolver instead of the
/// plain status policy.
pub(crate) fn classify_response(response: &AttemptResponse) -> AttemptOutcome {
    if detect_challenge(response) {
        return AttemptOutcome::ChallengeDetected(extract_challenge_info(response));
    }

    let status = response.status;
    let preview = body_preview(&response.text());
    match status {
        200..=299 => AttemptOutcome::Success { status, preview },
        400..=499 => AttemptOutcome::ClientError { status, preview },
        _ => AttemptOutcome::ServerError { status, preview },
    }
}

/// Bounded preview of a response body. JSON bodies are pretty-printed before
/// truncation so previews stay readable.
pub(crate) fn body_preview(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string());
            truncate_chars(&pretty, PREVIEW_CHARS)
        }
        Err(_) => truncate_chars(text, PREVIEW_CHARS),
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Fluent builder for [`Claimer`].
#[derive(Default)]
pub struct ClaimerBuilder {
    config: ClaimerConfig,
    http: Option<Arc<dyn ClaimHttpClient>>,
    notifier: Option<Arc<dyn Notifier>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    solver: Option<Arc<dyn SolverClient>>,
    manual_resolver: Option<Arc<dyn ChallengeResolver>>,
    automated_resolver: Option<Arc<dyn ChallengeResolver>>,
    solver_pacing: SolverPacing,
}

impl ClaimerBuilder {
    pub fn new() -> Self {
        Self {
            solver_pacing: SolverPacing::default(),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: ClaimerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn ClaimHttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn with_solver_client(mut self, solver: Arc<dyn SolverClient>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_solver_pacing(mut self, pacing: SolverPacing) -> Self {
        self.solver_pacing = pacing;
        self
    }

    /// Replace the interactive strategy (used when manual resolution is
    /// enabled in the configuration).
    pub fn with_manual_resolver(mut self, resolver: Arc<dyn ChallengeResolver>) -> Self {
        self.manual_resolver = Some(resolver);
        self
    }

    /// Replace the automated strategy entirely.
    pub fn with_automated_resolver(mut self, resolver: Arc<dyn ChallengeResolver>) -> Self {
        self.automated_resolver = Some(resolver);
        self
    }

    pub fn build(self) -> Result<Claimer, ClaimerError> {
        let http = match self.http {
            Some(client) => client,
            None => Arc::new(ReqwestClaimHttpClient::new()?),
        };

        let mut resolution = ResolutionPolicy::new();
        if self.config.manual_resolution {
            let manual = self
                .manual_resolver
                .unwrap_or_else(|| Arc::new(ManualResolver::new()));
            resolution = resolution.with_manual(manual);
        }
        if let Some(automated) = self.automated_resolver {
            resolution = resolution.with_automated(automated);
        } else if let Some(solver) = self.solver {
            resolution = resolution.with_automated(Arc::new(
                CaptchaServiceResolver::new(solver).with_pacing(self.solver_pacing),
            ));
        } else if let Some(ref key) = self.config.solver_api_key {
            let solver = Arc::new(TwoCaptchaClient::new(key.clone())?);
            resolution = resolution.with_automated(Arc::new(
                CaptchaServiceResolver::new(solver).with_pacing(self.solver_pacing),
            ));
        }

        let artifacts = match self.artifacts {
            Some(store) => Some(store),
            None => self.config.save_responses.then(|| {
                Arc::new(FileArtifactStore::new(self.config.responses_dir.clone()))
                    as Arc<dyn ArtifactStore>
            }),
        };

        Ok(Claimer {
            config: self.config,
            http,
            resolution,
            artifacts,
            notifier: self.notifier,
        })
    }
}

/// The claim-execution engine.
pub struct Claimer {
    config: ClaimerConfig,
    http: Arc<dyn ClaimHttpClient>,
    resolution: ResolutionPolicy,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Claimer {
    /// Construct a claimer with default configuration.
    pub fn new() -> Result<Self, ClaimerError> {
        ClaimerBuilder::new().build()
    }

    pub fn builder() -> ClaimerBuilder {
        ClaimerBuilder::new()
    }

    pub fn config(&self) -> &ClaimerConfig {
        &self.config
    }

    /// Execute the retry-bounded claim loop. Never errors: every failure mode
    /// is folded into the returned [`ClaimResult`].
    pub async fn claim(&self, request: ClaimRequest) -> ClaimResult {
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries).max(1);
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        let retry_delay = request.retry_delay.unwrap_or(self.config.retry_delay);

        // Built once; immutable for the remainder of the invocation.
        let identity = RequestIdentity::new(
            request.method.clone(),
            self.config.cookie.as_deref(),
            Some(&self.config.extra_headers),
            request.payload.clone(),
        );

        log::info!(
            "starting claim for {} (method {}, max retries {}, timeout {:?})",
            request.url,
            request.method,
            max_retries,
            timeout
        );
        self.dispatch(ClaimEvent::Start {
            url: request.url.clone(),
            method: request.method.to_string(),
        })
        .await;

        let mut artifact: Option<PathBuf> = None;
        let mut attempt: u32 = 1;

        let result = loop {
            log::info!("attempt {attempt}/{max_retries}");

            // Terminal outcomes break out with a result; retryable faults fall
            // through with the message to use once the bound is exhausted.
            let exhausted = match self.http.execute(&identity, &request.url, timeout).await {
                Ok(response) => {
                    log::info!("response status: {}", response.status);
                    let outcome = classify_response(&response);
                    let succeeded = matches!(outcome, AttemptOutcome::Success { .. });
                    if let Some(path) = self.persist(&response, succeeded).await {
                        artifact = Some(path);
                    }

                    match outcome {
                        AttemptOutcome::Success { status, preview } => {
                            log::info!("claim successful on attempt {attempt}");
                            break ClaimResult::succeeded(
                                format!("Status: {status}\nContent: {preview}"),
                                attempt,
                                artifact.take(),
                            );
                        }
                        AttemptOutcome::ClientError { status, preview } => {
                            // Client errors are not transient; never retried.
                            log::error!("client error ({status}) on attempt {attempt}");
                            break ClaimResult::failed(
                                format!(
                                    "Client error ({status}): Status: {status}\nContent: {preview}"
                                ),
                                attempt,
                                artifact.take(),
                            );
                        }
                        AttemptOutcome::ChallengeDetected(info) => {
                            log::warn!("challenge detected ({})", info.kind.as_str());
                            self.dispatch(ClaimEvent::ChallengeDetected {
                                url: request.url.clone(),
                                kind: info.kind,
                            })
                            .await;

                            match self.resolution.handle(&info, &response).await {
                                Resolution::Resolved { token } => {
                                    if let Some(token) = token {
                                        // Token injection into the retried request is
                                        // reserved; the origin is expected to honour
                                        // refreshed session state on the bare retry.
                                        log::info!(
                                            "solver returned a token ({} chars); retrying bare request",
                                            token.len()
                                        );
                                    }
                                    log::info!("challenge resolved; re-issuing attempt {attempt}");
                                    continue;
                                }
                                Resolution::GaveUp => {
                                    log::error!("challenge resolution failed");
                                    break ClaimResult::failed(
                                        format!(
                                            "Challenge resolution failed ({})",
                                            info.kind.as_str()
                                        ),
                                        attempt,
                                        artifact.take(),
                                    );
                                }
                            }
                        }
                        AttemptOutcome::ServerError { status, preview } => {
                            log::warn!("server error ({status}) on attempt {attempt}/{max_retries}");
                            format!("Server error ({status}): Status: {status}\nContent: {preview}")
                        }
                    }
                }
                Err(ClaimHttpError::Timeout) => {
                    log::warn!("request timeout on attempt {attempt}/{max_retries}");
                    format!("Request timeout after {attempt} attempts")
                }
                Err(ClaimHttpError::Connect(detail)) => {
                    log::warn!("connection error on attempt {attempt}/{max_retries}: {detail}");
                    format!("Connection error after {attempt} attempts: {detail}")
                }
                Err(ClaimHttpError::Transport(detail)) => {
                    log::error!("unexpected error on attempt {attempt}/{max_retries}: {detail}");
                    format!("Unexpected error after {attempt} attempts: {detail}")
                }
            };

            if attempt < max_retries {
                self.wait_before_retry(retry_delay).await;
                attempt += 1;
                continue;
            }
            break ClaimResult::failed(exhausted, attempt, artifact.take());
        };

        let summary = truncate_chars(&result.message, NOTIFICATION_CHARS);
        let event = if result.success {
            ClaimEvent::Success {
                url: request.url.clone(),
                message: summary,
                artifact: result.artifact.clone(),
            }
        } else {
            ClaimEvent::Failure {
                url: request.url.clone(),
                message: summary,
                artifact: result.artifact.clone(),
            }
        };
        self.dispatch(event).await;

        result
    }

    async fn wait_before_retry(&self, delay: Duration) {
        log::info!("waiting {:.0}s before retry", delay.as_secs_f64());
        sleep(delay).await;
    }

    /// Archive one response. Store failures never reach the loop.
    async fn persist(&self, response: &AttemptResponse, success: bool) -> Option<PathBuf> {
        let store = self.artifacts.as_ref()?;
        store.save_response(response, success).await
    }

    /// Best-effort event delivery; failures are logged and swallowed.
    async fn dispatch(&self, event: ClaimEvent) {
        if let Some(notifier) = &self.notifier {
            if let Err(err) = notifier.notify(&event).await {
                log::warn!("{} notification failed: {err}", notifier.name());
            }
        }
    }
}
