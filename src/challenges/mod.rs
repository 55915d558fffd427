//! Challenge classification and resolution.

pub mod detector;
pub mod resolver;
