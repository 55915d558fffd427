//! Automated resolution through a token-solving service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::challenges::detector::ChallengeInfo;
use crate::external_deps::captcha::{SolverClient, SolverPoll, SolverTask};
use crate::http::AttemptResponse;

use super::{ChallengeResolver, Resolution};

/// Polling cadence applied while waiting for a solution.
#[derive(Debug, Clone, Copy)]
pub struct SolverPacing {
    pub poll_interval: Duration,
    pub ceiling: Duration,
}

impl Default for SolverPacing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            ceiling: Duration::from_secs(300),
        }
    }
}

/// Submits token-solvable challenges to a solving service and polls until a
/// solution arrives or the ceiling is exhausted.
pub struct CaptchaServiceResolver {
    solver: Arc<dyn SolverClient>,
    pacing: SolverPacing,
}

impl CaptchaServiceResolver {
    pub fn new(solver: Arc<dyn SolverClient>) -> Self {
        Self {
            solver,
            pacing: SolverPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: SolverPacing) -> Self {
        self.pacing = pacing;
        self
    }
}

#[async_trait]
impl ChallengeResolver for CaptchaServiceResolver {
    fn name(&self) -> &'static str {
        "captcha_service"
    }

    async fn resolve(&self, challenge: &ChallengeInfo, _response: &AttemptResponse) -> Resolution {
        if !challenge.kind.is_token_solvable() {
            log::info!(
                "challenge kind {} cannot be solved by {}; giving up",
                challenge.kind.as_str(),
                self.solver.name()
            );
            return Resolution::GaveUp;
        }

        let Some(site_key) = challenge.site_key.clone() else {
            log::info!("no site key extracted; automated solving is not possible");
            return Resolution::GaveUp;
        };

        let task = SolverTask::new(challenge.kind, site_key, challenge.source_url.clone());
        let job = match self.solver.submit(&task).await {
            Ok(job) => job,
            Err(err) => {
                log::error!("{} submit failed: {err}", self.solver.name());
                return Resolution::GaveUp;
            }
        };

        let mut elapsed = Duration::ZERO;
        while elapsed < self.pacing.ceiling {
            sleep(self.pacing.poll_interval).await;
            elapsed += self.pacing.poll_interval;

            match self.solver.poll(&job).await {
                Ok(SolverPoll::Solved(token)) => {
                    log::info!("challenge solved by {}", self.solver.name());
                    return Resolution::Resolved { token: Some(token) };
                }
                Ok(SolverPoll::Pending) => {
                    log::debug!(
                        "solution not ready yet ({:.0}s elapsed)",
                        elapsed.as_secs_f64()
                    );
                }
                Err(err) => {
                    log::error!("{} poll failed: {err}", self.solver.name());
                    return Resolution::GaveUp;
                }
            }
        }

        log::error!(
            "{} did not solve the challenge within {:.0}s",
            self.solver.name(),
            self.pacing.ceiling.as_secs_f64()
        );
        Resolution::GaveUp
    }
}
