//! External call adapter: turn a rendered prompt into summary text.
//!
//! The processor only depends on the [`Completer`] trait. The concrete
//! HTTP implementation speaks one [`ApiShape`], chosen from configuration
//! when the client is built; responses that do not match that shape are
//! reported as errors instead of being probed for other layouts.

mod http;
mod shape;

pub use http::{endpoint_for, HttpCompleter};
pub use shape::{extract_text, request_body, ApiShape};

/// Error from a single completion request.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Curl reported an error (timeout, connection, TLS, etc.).
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),
    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u32, body: String },
    /// The body was not valid JSON.
    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Valid JSON, but no (non-empty) text where the shape puts it.
    #[error("response has no text for the {shape} API shape")]
    MissingText { shape: ApiShape },
    /// The configured base URL cannot be turned into an endpoint.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Produces completion text for a prompt.
pub trait Completer {
    /// Returns the generated text, trimmed of surrounding whitespace.
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CallError>;
}

impl<C: Completer + ?Sized> Completer for &C {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CallError> {
        (**self).complete(prompt, model)
    }
}

impl<C: Completer + ?Sized> Completer for Box<C> {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CallError> {
        (**self).complete(prompt, model)
    }
}
