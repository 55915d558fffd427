//! 2captcha adapter (in.php / res.php JSON API).

use async_trait::async_trait;
use serde::Deserialize;

use crate::challenges::detector::ChallengeKind;

use super::{JobId, SolverClient, SolverError, SolverPoll, SolverTask};

const SUBMIT_URL: &str = "http://2captcha.com/in.php";
const RESULT_URL: &str = "http://2captcha.com/res.php";
const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Client for the 2captcha solving service.
pub struct TwoCaptchaClient {
    api_key: String,
    client: reqwest::Client,
}

/// Both endpoints answer `{"status": 0|1, "request": "...", "error_text": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: i32,
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    error_text: Option<String>,
}

impl TwoCaptchaClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SolverError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SolverError::Configuration("empty 2captcha API key".into()));
        }
        let client = reqwest::Client::new();
        Ok(Self { api_key, client })
    }

    fn method_for(kind: ChallengeKind) -> Result<&'static str, SolverError> {
        match kind {
            ChallengeKind::Recaptcha => Ok("userrecaptcha"),
            ChallengeKind::Hcaptcha => Ok("hcaptcha"),
            other => Err(SolverError::UnsupportedKind(other.as_str())),
        }
    }
}

#[async_trait]
impl SolverClient for TwoCaptchaClient {
    fn name(&self) -> &'static str {
        "2captcha"
    }

    async fn submit(&self, task: &SolverTask) -> Result<JobId, SolverError> {
        let method = Self::method_for(task.kind)?;

        // recaptcha tasks pass the site key as `googlekey`, hcaptcha as `sitekey`.
        let key_field = if task.kind == ChallengeKind::Recaptcha {
            "googlekey"
        } else {
            "sitekey"
        };

        let form = [
            ("key", self.api_key.as_str()),
            ("method", method),
            (key_field, task.site_key.as_str()),
            ("pageurl", task.page_url.as_str()),
            ("json", "1"),
        ];

        log::debug!("submitting {} task to 2captcha", task.kind.as_str());
        let response: ApiResponse = self
            .client
            .post(SUBMIT_URL)
            .form(&form)
            .send()
            .await
            .map_err(|err| SolverError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| SolverError::Transport(err.to_string()))?;

        if response.status != 1 {
            return Err(SolverError::Rejected(
                response.error_text.unwrap_or_else(|| "unknown error".into()),
            ));
        }

        let id = response
            .request
            .ok_or_else(|| SolverError::Rejected("submit accepted without an id".into()))?;
        log::info!("2captcha accepted task, id {id}");
        Ok(JobId(id))
    }

    async fn poll(&self, job: &JobId) -> Result<SolverPoll, SolverError> {
        let query = [
            ("key", self.api_key.as_str()),
            ("action", "get"),
            ("id", job.0.as_str()),
            ("json", "1"),
        ];

        let response: ApiResponse = self
            .client
            .get(RESULT_URL)
            .query(&query)
            .send()
            .await
            .map_err(|err| SolverError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| SolverError::Transport(err.to_string()))?;

        if response.status == 1 {
            let token = response
                .request
                .ok_or_else(|| SolverError::Rejected("solved without a token".into()))?;
            return Ok(SolverPoll::Solved(token));
        }

        // Depending on the endpoint version the not-ready marker arrives in
        // either `request` or `error_text`.
        let detail = response
            .error_text
            .or(response.request)
            .unwrap_or_else(|| NOT_READY.to_string());
        if detail == NOT_READY {
            Ok(SolverPoll::Pending)
        } else {
            Err(SolverError::Rejected(detail))
        }
    }
}
