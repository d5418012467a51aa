//! Retry and backoff policy.
//!
//! This module wraps a fallible zero-argument operation (one completion
//! request) in an exponential backoff loop. Error classification lets the
//! policy optionally narrow retries to transient failures.

mod classify;
mod error;
mod policy;
mod run;
mod sleep;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::RetryExhausted;
pub use policy::{ErrorKind, RetryDecision, RetryOn, RetryPolicy};
pub use run::run_with_retry;
pub use sleep::{Sleeper, ThreadSleeper};
