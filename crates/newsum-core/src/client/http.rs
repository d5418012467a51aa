//! Completion requests over HTTP using the curl crate (libcurl).

use std::time::Duration;
use url::Url;

use super::shape::{extract_text, request_body, ApiShape};
use super::{CallError, Completer};
use crate::config::{ApiConfig, ApiKey};

/// Longest slice of an error body kept in [`CallError::Http`].
const ERROR_BODY_LIMIT: usize = 512;

/// Full endpoint URL for `shape` under `base_url`.
///
/// The base is treated as a directory, so `https://host/v1` and
/// `https://host/v1/` both yield `https://host/v1/chat/completions`.
pub fn endpoint_for(base_url: &str, shape: ApiShape) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(shape.path())
}

/// Blocking HTTP client for one configured endpoint and credential.
pub struct HttpCompleter {
    endpoint: Url,
    api_key: ApiKey,
    shape: ApiShape,
    max_tokens: u32,
    temperature: f64,
    connect_timeout: Duration,
    timeout: Duration,
}

impl HttpCompleter {
    pub fn new(api: &ApiConfig, api_key: ApiKey) -> Result<Self, CallError> {
        let endpoint = endpoint_for(&api.base_url, api.shape)?;
        tracing::debug!(endpoint = %endpoint, shape = %api.shape, "completion client configured");
        Ok(Self {
            endpoint,
            api_key,
            shape: api.shape,
            max_tokens: api.max_tokens,
            temperature: api.temperature,
            connect_timeout: Duration::from_secs(api.connect_timeout_secs),
            timeout: Duration::from_secs(api.timeout_secs),
        })
    }

    /// POST `payload` and return (status, body).
    fn post(&self, payload: &[u8]) -> Result<(u32, Vec<u8>), CallError> {
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(self.endpoint.as_str())?;
        easy.post(true)?;
        easy.post_fields_copy(payload)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;

        let mut list = curl::easy::List::new();
        list.append("Content-Type: application/json")?;
        list.append("Accept: application/json")?;
        list.append(&format!("Authorization: Bearer {}", self.api_key.expose()))?;
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        Ok((code, body))
    }
}

impl Completer for HttpCompleter {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CallError> {
        let request = request_body(self.shape, model, prompt, self.max_tokens, self.temperature);
        let payload = serde_json::to_vec(&request)?;
        let (status, body) = self.post(&payload)?;
        if !(200..300).contains(&status) {
            return Err(CallError::Http {
                status,
                body: excerpt(&body),
            });
        }
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        extract_text(self.shape, &value).ok_or(CallError::MissingText { shape: self.shape })
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
