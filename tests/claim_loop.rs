//! End-to-end tests of the retry loop with scripted collaborators.
//!
//! All timing assertions run on tokio's paused clock, so the sleeps between
//! retries are observed as virtual time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use url::Url;

use airclaim::{
    AttemptResponse, ChallengeInfo, ChallengeResolver, ClaimEvent, ClaimHttpClient,
    ClaimHttpError, ClaimRequest, Claimer, ClaimerConfig, NotifyError, Notifier, RequestIdentity,
    Resolution,
};

struct ScriptedHttp {
    script: Mutex<VecDeque<Result<AttemptResponse, ClaimHttpError>>>,
    calls: Mutex<u32>,
}

impl ScriptedHttp {
    fn new(script: Vec<Result<AttemptResponse, ClaimHttpError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ClaimHttpClient for ScriptedHttp {
    async fn execute(
        &self,
        _identity: &RequestIdentity,
        _url: &Url,
        _timeout: Duration,
    ) -> Result<AttemptResponse, ClaimHttpError> {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("http script exhausted"))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &ClaimEvent) -> Result<(), NotifyError> {
        let label = match event {
            ClaimEvent::Start { .. } => "start",
            ClaimEvent::Success { .. } => "success",
            ClaimEvent::Failure { .. } => "failure",
            ClaimEvent::ChallengeDetected { .. } => "challenge",
        };
        self.events.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

struct ScriptedResolver {
    verdicts: Mutex<VecDeque<Resolution>>,
}

impl ScriptedResolver {
    fn new(verdicts: Vec<Resolution>) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts.into()),
        })
    }
}

#[async_trait]
impl ChallengeResolver for ScriptedResolver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn resolve(&self, _challenge: &ChallengeInfo, _response: &AttemptResponse) -> Resolution {
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Resolution::GaveUp)
    }
}

fn target() -> Url {
    Url::parse("https://drop.example.com/api/claim").unwrap()
}

fn response(status: u16, body: &str) -> Result<AttemptResponse, ClaimHttpError> {
    Ok(AttemptResponse {
        url: target(),
        status,
        headers: HeaderMap::new(),
        body: Bytes::from(body.to_string()),
    })
}

fn quiet_config() -> ClaimerConfig {
    ClaimerConfig {
        manual_resolution: false,
        save_responses: false,
        ..ClaimerConfig::default()
    }
}

fn claimer_with(http: Arc<ScriptedHttp>) -> Claimer {
    Claimer::builder()
        .with_config(quiet_config())
        .with_http_client(http)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn first_attempt_success_never_sleeps() {
    let http = ScriptedHttp::new(vec![response(200, r#"{"claimed":true}"#)]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer.claim(ClaimRequest::post(target())).await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(http.calls(), 1);
    assert!(result.message.contains("Status: 200"));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn client_error_is_terminal_on_first_sight() {
    let http = ScriptedHttp::new(vec![response(404, "not found")]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(5))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(http.calls(), 1);
    assert!(result.message.starts_with("Client error (404)"));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn server_errors_retry_up_to_the_bound() {
    let http = ScriptedHttp::new(vec![
        response(500, "err"),
        response(502, "err"),
        response(500, "err"),
    ]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer.claim(ClaimRequest::post(target())).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(http.calls(), 3);
    assert!(result.message.starts_with("Server error (500)"));
    // Two sleeps of the default 5s delay; no sleep after the final attempt.
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success() {
    let http = ScriptedHttp::new(vec![
        response(503, "maintenance"),
        response(200, "claimed"),
    ]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer.claim(ClaimRequest::post(target())).await;

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn unresolved_challenge_fails_without_retry() {
    let http = ScriptedHttp::new(vec![response(
        403,
        r#"<div class="g-recaptcha" data-sitekey="6LeKeyKey"></div>"#,
    )]);
    // No resolver configured, so the policy gives up immediately.
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(5))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(http.calls(), 1);
    assert_eq!(result.message, "Challenge resolution failed (recaptcha)");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn resolved_challenge_re_issues_the_same_attempt() {
    let http = ScriptedHttp::new(vec![
        response(403, "please complete the captcha"),
        response(200, "claimed"),
    ]);
    let claimer = Claimer::builder()
        .with_config(quiet_config())
        .with_http_client(http.clone())
        .with_automated_resolver(ScriptedResolver::new(vec![Resolution::Resolved {
            token: None,
        }]))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    // max_retries of 1: success proves the resolved challenge did not
    // consume the only attempt.
    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(1))
        .await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(http.calls(), 2);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retryable_and_reported() {
    let http = ScriptedHttp::new(vec![Err(ClaimHttpError::Timeout), Err(ClaimHttpError::Timeout)]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(2))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.message, "Request timeout after 2 attempts");
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn connection_errors_carry_their_detail() {
    let http = ScriptedHttp::new(vec![Err(ClaimHttpError::Connect("refused".into()))]);
    let claimer = claimer_with(http.clone());

    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(1))
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Connection error after 1 attempts: refused");
}

#[tokio::test(start_paused = true)]
async fn other_transport_faults_are_retried_then_reported() {
    let http = ScriptedHttp::new(vec![
        Err(ClaimHttpError::Transport("tls handshake failed".into())),
        Err(ClaimHttpError::Transport("tls handshake failed".into())),
    ]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer
        .claim(ClaimRequest::post(target()).with_max_retries(2))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(http.calls(), 2);
    assert_eq!(
        result.message,
        "Unexpected error after 2 attempts: tls handshake failed"
    );
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn per_request_overrides_beat_the_configured_delay() {
    let http = ScriptedHttp::new(vec![response(500, "err"), response(200, "ok")]);
    let claimer = claimer_with(http.clone());

    let started = tokio::time::Instant::now();
    let result = claimer
        .claim(
            ClaimRequest::post(target())
                .with_max_retries(2)
                .with_retry_delay(Duration::from_secs(1)),
        )
        .await;

    assert!(result.success);
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_reach_the_notifier_in_order() {
    let http = ScriptedHttp::new(vec![response(
        403,
        "our robot check could not verify you are human",
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let claimer = Claimer::builder()
        .with_config(quiet_config())
        .with_http_client(http)
        .with_notifier(notifier.clone())
        .build()
        .unwrap();

    let result = claimer.claim(ClaimRequest::get(target())).await;

    assert!(!result.success);
    assert_eq!(notifier.labels(), vec!["start", "challenge", "failure"]);
}

#[tokio::test(start_paused = true)]
async fn successful_claim_notifies_success() {
    let http = ScriptedHttp::new(vec![response(201, "minted")]);
    let notifier = Arc::new(RecordingNotifier::default());
    let claimer = Claimer::builder()
        .with_config(quiet_config())
        .with_http_client(http)
        .with_notifier(notifier.clone())
        .build()
        .unwrap();

    let result = claimer.claim(ClaimRequest::post(target())).await;

    assert!(result.success);
    assert_eq!(notifier.labels(), vec!["start", "success"]);
}
