//! # airclaim
//!
//! A retry-bounded engine for claiming airdrops from HTTP endpoints that sit
//! behind bot-protection layers.
//!
//! The claim loop classifies every attempt into a small outcome taxonomy,
//! retries transient failures up to a bound, fails fast on client errors, and
//! routes detected challenges through pluggable resolution strategies (an
//! interactive operator prompt, an automated token-solving service, or both).
//! Raw responses can be archived per attempt and terminal outcomes forwarded
//! to a notification channel.
//!
//! ## Features
//!
//! - Bounded retry loop with a fixed inter-attempt delay
//! - Keyword and status based challenge detection with site-key extraction
//! - Manual and captcha-service resolution strategies
//! - Per-attempt response archiving to timestamped JSON files
//! - Telegram notifications for claim lifecycle events
//! - Builder-injected collaborators, all mockable behind traits
//!
//! ## Example
//!
//! ```no_run
//! use airclaim::{ClaimRequest, Claimer};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let claimer = Claimer::new()?;
//!     let url = Url::parse("https://drop.example.com/api/claim")?;
//!     let result = claimer.claim(ClaimRequest::post(url)).await;
//!     println!("{}: {}", result.success, result.message);
//!     Ok(())
//! }
//! ```

mod claimer;

pub mod artifacts;
pub mod challenges;
pub mod config;
pub mod external_deps;
pub mod http;
pub mod identity;

pub use crate::claimer::{
    AttemptOutcome,
    ClaimRequest,
    ClaimResult,
    Claimer,
    ClaimerBuilder,
    ClaimerError,
};

pub use crate::challenges::detector::{
    ChallengeInfo,
    ChallengeKind,
    detect_challenge,
    extract_challenge_info,
};

pub use crate::challenges::resolver::{
    CaptchaServiceResolver,
    ChallengeResolver,
    ManualResolver,
    Resolution,
    ResolutionPolicy,
    SolverPacing,
};

pub use crate::artifacts::{ArtifactEncryption, ArtifactError, ArtifactStore, FileArtifactStore};
pub use crate::config::{ClaimerConfig, ConfigError, ConfigOverride};
pub use crate::external_deps::captcha::{
    JobId,
    SolverClient,
    SolverError,
    SolverPoll,
    SolverTask,
    TwoCaptchaClient,
};
pub use crate::external_deps::notify::{ClaimEvent, NotifyError, Notifier, TelegramNotifier};
pub use crate::http::{AttemptResponse, ClaimHttpClient, ClaimHttpError, ReqwestClaimHttpClient};
pub use crate::identity::{RequestIdentity, build_headers, extract_url_from_cookie};

/// Crate version, straight from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
