//! Error returned when the retry loop gives up.

/// All attempts failed (or the last failure was not retryable).
/// Carries the last observed error so callers can report it.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts actually made.
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last: E,
}
