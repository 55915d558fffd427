//! Adapters for third-party services the claim loop collaborates with.

pub mod captcha;
pub mod notify;
