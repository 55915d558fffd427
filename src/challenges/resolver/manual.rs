//! Interactive resolution: hand the challenge to a human operator.

use async_trait::async_trait;

use crate::challenges::detector::ChallengeInfo;
use crate::claimer::truncate_chars;
use crate::http::AttemptResponse;

use super::{ChallengeResolver, Resolution};

/// Characters of response body shown in the operator prompt.
const PROMPT_PREVIEW_CHARS: usize = 500;

/// Prompts the operator on stdin to solve the challenge in a browser and
/// report back. Interruption or a closed stdin counts as giving up.
#[derive(Debug, Default)]
pub struct ManualResolver;

impl ManualResolver {
    pub fn new() -> Self {
        Self
    }

    fn banner(challenge: &ChallengeInfo, response: &AttemptResponse) -> String {
        let preview = truncate_chars(&response.text(), PROMPT_PREVIEW_CHARS);
        format!(
            "\n{sep}\nCHALLENGE DETECTED ({kind})\n{sep}\n\
             URL: {url}\nStatus: {status}\n\nResponse preview:\n{line}\n{preview}\n{line}\n\n\
             Instructions:\n\
             1. Open the URL in your browser\n\
             2. Complete the challenge\n\
             3. Enter 'success' if completed, or 'skip' to give up\n",
            sep = "=".repeat(60),
            line = "-".repeat(40),
            kind = challenge.kind.as_str(),
            url = challenge.source_url,
            status = response.status,
        )
    }

    fn read_verdict() -> Resolution {
        use std::io::{BufRead, Write};

        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            print!("Enter challenge result (success/skip): ");
            let _ = std::io::stdout().flush();
            line.clear();
            match stdin.lock().read_line(&mut line) {
                // EOF or error: the operator is gone, give up.
                Ok(0) | Err(_) => return Resolution::GaveUp,
                Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                    "success" => return Resolution::Resolved { token: None },
                    "skip" => return Resolution::GaveUp,
                    _ => println!("Invalid input. Please enter 'success' or 'skip'."),
                },
            }
        }
    }
}

#[async_trait]
impl ChallengeResolver for ManualResolver {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn resolve(&self, challenge: &ChallengeInfo, response: &AttemptResponse) -> Resolution {
        println!("{}", Self::banner(challenge, response));

        // Blocking stdin read; keep it off the async executor.
        match tokio::task::spawn_blocking(Self::read_verdict).await {
            Ok(verdict) => verdict,
            Err(err) => {
                log::warn!("operator prompt interrupted: {err}");
                Resolution::GaveUp
            }
        }
    }
}
