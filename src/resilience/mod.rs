//! Resilience layer for the SCC client.
//!
//! Provides the retry engine: bounded exponential backoff on transient
//! failures, `Retry-After` handling, and deadline-aware sleeping.

mod retry;

pub use retry::{retry_after_from_headers, RetryConfig, RetryPolicy};
