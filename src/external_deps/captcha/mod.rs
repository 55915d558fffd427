//! Captcha solving service adapters.
//!
//! A solving service is driven through two calls: submit a task and poll for
//! the solution. The resolver layer owns the pacing (poll interval and
//! ceiling); adapters here only translate the vendor wire format.

mod twocaptcha;

pub use twocaptcha::TwoCaptchaClient;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::challenges::detector::ChallengeKind;

/// Challenge handed to a solving service.
#[derive(Debug, Clone)]
pub struct SolverTask {
    pub kind: ChallengeKind,
    pub site_key: String,
    pub page_url: Url,
}

impl SolverTask {
    pub fn new(kind: ChallengeKind, site_key: impl Into<String>, page_url: Url) -> Self {
        Self {
            kind,
            site_key: site_key.into(),
            page_url,
        }
    }
}

/// Vendor-side handle for a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(pub String);

/// Outcome of one poll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverPoll {
    /// Solution not ready yet; keep polling.
    Pending,
    /// Solved; carries the challenge token.
    Solved(String),
}

/// Errors surfaced by solving services.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver misconfigured: {0}")]
    Configuration(String),
    #[error("solver request failed: {0}")]
    Transport(String),
    #[error("solver rejected the task: {0}")]
    Rejected(String),
    #[error("challenge kind {0} is not supported by this solver")]
    UnsupportedKind(&'static str),
}

/// Submit/poll interface implemented by solving-service vendors.
#[async_trait]
pub trait SolverClient: Send + Sync {
    fn name(&self) -> &'static str;
    async fn submit(&self, task: &SolverTask) -> Result<JobId, SolverError>;
    async fn poll(&self, job: &JobId) -> Result<SolverPoll, SolverError>;
}
