//! Resilience patterns for pipeline callers
//!
//! The pipeline itself never retries. Callers that want to retry transient
//! failures wrap their call in `retry_classified`, which follows the
//! `retriable` flag and any provider cooldown on the classified error.

mod retry;

pub use retry::{retry_classified, RetryPolicy};
