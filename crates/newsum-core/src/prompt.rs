//! Prompt templates with `{{NAME}}` placeholders.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder replaced by the row's `article` value.
pub const ARTICLE_PLACEHOLDER: &str = "{{ARTICLE}}";
const ARTICLE_NAME: &str = "ARTICLE";

/// Number of characters shown in a dry-run preview.
pub const PREVIEW_CHARS: usize = 1000;

/// Extra named values substituted into the template (`NAME` -> value).
pub type Extras = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a UTF-8 template file. A template without `{{ARTICLE}}` is
    /// accepted but logged, since every row would get the same prompt.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read prompt template {}", path.display()))?;
        let tpl = Self::new(text);
        let names = tpl.placeholders();
        if !names.contains(&ARTICLE_NAME) {
            tracing::warn!(
                path = %path.display(),
                "prompt template has no {} placeholder",
                ARTICLE_PLACEHOLDER
            );
        }
        tracing::debug!(path = %path.display(), placeholders = ?names, "prompt template loaded");
        Ok(tpl)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute `{{ARTICLE}}`, then each `{{NAME}}` from `extras`.
    /// Placeholders without a value are left as they are.
    pub fn render(&self, article: &str, extras: &Extras) -> String {
        let mut out = self.text.replace(ARTICLE_PLACEHOLDER, article);
        for (name, value) in extras {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else { break };
            let name = &after[..end];
            if is_placeholder_name(name) && !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + 2..];
        }
        names
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// First `limit` characters of `text`, cut on a char boundary.
pub fn preview(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parse `NAME=VALUE` into a pair (for `--var`).
pub fn parse_extra(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if !is_placeholder_name(name) {
        return Err(format!("invalid placeholder name '{name}'"));
    }
    if name == ARTICLE_NAME {
        return Err("ARTICLE is filled from the dataset and cannot be overridden".to_string());
    }
    Ok((name.to_string(), value.to_string()))
}
