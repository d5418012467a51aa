//! Request bodies and response text extraction, one per supported API shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Wire shape of the text-generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiShape {
    /// `POST /chat/completions`, text at `choices[0].message.content`.
    #[default]
    Chat,
    /// `POST /completions`, text at `choices[0].text`.
    Completions,
    /// `POST /responses`, text at `output_text` or in `output[*].content[*].text`.
    Responses,
}

impl ApiShape {
    /// Path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            ApiShape::Chat => "chat/completions",
            ApiShape::Completions => "completions",
            ApiShape::Responses => "responses",
        }
    }
}

impl fmt::Display for ApiShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiShape::Chat => "chat",
            ApiShape::Completions => "completions",
            ApiShape::Responses => "responses",
        };
        f.write_str(s)
    }
}

/// Build the JSON request body for `shape`.
pub fn request_body(
    shape: ApiShape,
    model: &str,
    prompt: &str,
    max_tokens: u32,
    temperature: f64,
) -> Value {
    match shape {
        ApiShape::Chat => json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": temperature,
        }),
        ApiShape::Completions => json!({
            "model": model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "temperature": temperature,
        }),
        ApiShape::Responses => json!({
            "model": model,
            "input": prompt,
            "max_output_tokens": max_tokens,
        }),
    }
}

/// Pull the generated text out of a response body. Returns `None` when the
/// body does not carry non-blank text where `shape` puts it.
pub fn extract_text(shape: ApiShape, body: &Value) -> Option<String> {
    let text = match shape {
        ApiShape::Chat => body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
        ApiShape::Completions => body
            .pointer("/choices/0/text")
            .and_then(Value::as_str)
            .map(str::to_string),
        ApiShape::Responses => match body.get("output_text").and_then(Value::as_str) {
            Some(s) => Some(s.to_string()),
            None => responses_output(body),
        },
    }?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Concatenate `output[*].content[*].text` parts of a responses-style body.
fn responses_output(body: &Value) -> Option<String> {
    let parts: Vec<&str> = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}
