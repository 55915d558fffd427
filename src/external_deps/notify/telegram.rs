//! Telegram bot notifier (sendMessage API, HTML parse mode).

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::{ClaimEvent, Notifier, NotifyError};

/// Hard limit imposed by the Telegram API on message length.
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Sends claim lifecycle events to a Telegram chat.
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    client: reqwest::Client,
    disable_notification: bool,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_notification: bool,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let token = token.into();
        let chat_id = chat_id.into();
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(NotifyError::Configuration(
                "telegram token and chat id are required".into(),
            ));
        }
        Ok(Self {
            token,
            chat_id,
            client: reqwest::Client::new(),
            disable_notification: false,
        })
    }

    /// Deliver messages silently (no client-side notification sound).
    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }

    fn render(event: &ClaimEvent) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        match event {
            ClaimEvent::Start { url, method } => format!(
                "<b>Claim started</b>\n\
                 Time: {timestamp}\n\
                 URL: <code>{}</code>\n\
                 Method: {}",
                escape(url.as_str()),
                escape(method),
            ),
            ClaimEvent::Success {
                url,
                message,
                artifact,
            } => {
                let mut text = format!(
                    "<b>Claim SUCCESS</b>\n\
                     Time: {timestamp}\n\
                     URL: <code>{}</code>\n\n\
                     Response:\n<pre>{}</pre>",
                    escape(url.as_str()),
                    escape(message),
                );
                if let Some(path) = artifact {
                    text.push_str(&format!(
                        "\nResponse saved to: <code>{}</code>",
                        escape(&path.display().to_string())
                    ));
                }
                text
            }
            ClaimEvent::Failure {
                url,
                message,
                artifact,
            } => {
                let mut text = format!(
                    "<b>Claim FAILED</b>\n\
                     Time: {timestamp}\n\
                     URL: <code>{}</code>\n\n\
                     Error:\n<pre>{}</pre>",
                    escape(url.as_str()),
                    escape(message),
                );
                if let Some(path) = artifact {
                    text.push_str(&format!(
                        "\nResponse saved to: <code>{}</code>",
                        escape(&path.display().to_string())
                    ));
                }
                text.push_str("\nCheck logs for more details.");
                text
            }
            ClaimEvent::ChallengeDetected { url, kind } => format!(
                "<b>Challenge detected</b> ({})\n\
                 Time: {timestamp}\n\
                 URL: <code>{}</code>\n\
                 Manual intervention may be required; check the console prompt.",
                kind.as_str(),
                escape(url.as_str()),
            ),
        }
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn clamp(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, event: &ClaimEvent) -> Result<(), NotifyError> {
        let text = clamp(&Self::render(event), TELEGRAM_MESSAGE_LIMIT);
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "HTML",
            disable_notification: self.disable_notification,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(NotifyError::Delivery(format!(
                "telegram returned {status}: {body}"
            )));
        }

        log::debug!("telegram notification delivered");
        Ok(())
    }
}
