//! Remote notification adapters.
//!
//! The claim loop reports lifecycle events here on a best-effort basis: a
//! delivery failure is logged and swallowed, never surfaced as a claim
//! failure.

mod telegram;

pub use telegram::TelegramNotifier;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::challenges::detector::ChallengeKind;

/// Lifecycle events emitted by the claim loop.
///
/// Message bodies carried here are already truncated to the 1000-character
/// notification bound by the loop.
#[derive(Debug, Clone)]
pub enum ClaimEvent {
    Start {
        url: Url,
        method: String,
    },
    Success {
        url: Url,
        message: String,
        artifact: Option<PathBuf>,
    },
    Failure {
        url: Url,
        message: String,
        artifact: Option<PathBuf>,
    },
    ChallengeDetected {
        url: Url,
        kind: ChallengeKind,
    },
}

/// Errors surfaced by notification backends.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier misconfigured: {0}")]
    Configuration(String),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, event: &ClaimEvent) -> Result<(), NotifyError>;
}
