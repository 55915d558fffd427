//! Transport seam used by the retry loop.
//!
//! The loop only ever talks to [`ClaimHttpClient`]; the reqwest-backed
//! implementation lives here and tests substitute a scripted mock. Transport
//! failures are pre-classified so the loop can map them onto its retry
//! policy without inspecting vendor error types.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use crate::identity::RequestIdentity;

/// One HTTP round trip as observed by the loop.
#[derive(Debug, Clone)]
pub struct AttemptResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AttemptResponse {
    /// Body decoded as UTF-8 text, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Transport failures, pre-classified for the retry policy.
#[derive(Debug, Error)]
pub enum ClaimHttpError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Issues one claim request and returns the raw response.
#[async_trait]
pub trait ClaimHttpClient: Send + Sync {
    async fn execute(
        &self,
        identity: &RequestIdentity,
        url: &Url,
        timeout: Duration,
    ) -> Result<AttemptResponse, ClaimHttpError>;
}

/// Reqwest-backed client used in production.
pub struct ReqwestClaimHttpClient {
    client: reqwest::Client,
}

impl ReqwestClaimHttpClient {
    pub fn new() -> Result<Self, ClaimHttpError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| ClaimHttpError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client (e.g. one sharing a cookie store with
    /// the rest of the hosting process).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClaimHttpClient for ReqwestClaimHttpClient {
    async fn execute(
        &self,
        identity: &RequestIdentity,
        url: &Url,
        timeout: Duration,
    ) -> Result<AttemptResponse, ClaimHttpError> {
        let mut builder = self
            .client
            .request(identity.method.clone(), url.clone())
            .headers(identity.headers.clone())
            .timeout(timeout);

        // Content-Type: application/json is set only when a payload exists.
        if identity.method == Method::POST {
            if let Some(ref payload) = identity.payload {
                builder = builder.json(payload);
            }
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(AttemptResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ClaimHttpError {
    if err.is_timeout() {
        ClaimHttpError::Timeout
    } else if err.is_connect() {
        ClaimHttpError::Connect(err.to_string())
    } else {
        ClaimHttpError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_response_text_is_lossy() {
        let response = AttemptResponse {
            url: Url::parse("https://example.com/claim").unwrap(),
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from_static(&[0x68, 0x69, 0xff]),
        };
        assert_eq!(response.text(), "hi\u{fffd}");
    }
}
