//! Retry loop: run a closure until success or policy says stop.

use super::error::RetryExhausted;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use super::sleep::Sleeper;

/// Runs `f` until it succeeds or the retry policy says to stop, waiting
/// between attempts through `sleeper`.
///
/// No sleep happens after the final failed attempt.
pub fn run_with_retry<T, E, F, K, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    classify: K,
    mut f: F,
) -> Result<T, RetryExhausted<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Result<T, E>,
    K: Fn(&E) -> ErrorKind,
    S: Sleeper + ?Sized,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last: e,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(
                            attempt,
                            ?kind,
                            delay_ms = d.as_millis() as u64,
                            "attempt failed: {}; retrying",
                            e
                        );
                        sleeper.sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
