//! Operator modules: a signature plus domain pre/post-processing.
//!
//! A module sanitizes inputs (whitespace normalization, truncation), renders
//! the signature's prompt, invokes the client, parses the declared output
//! fields, and logs the call with its usage. Composition replaces
//! inheritance: every operator is the same small runtime wrapped around a
//! different signature.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, SkillfabError};
use crate::lm::client::{LmClient, LmUsage};
use crate::lm::signature::Signature;

/// Per-input truncation bound, in characters.
pub const MAX_INPUT_CHARS: usize = 32_000;

/// Typed view over the parsed output fields of one invocation.
#[derive(Debug, Clone)]
pub struct ModuleOutput {
    fields: serde_json::Map<String, Value>,
    pub usage: LmUsage,
}

impl ModuleOutput {
    /// A required string field.
    pub fn require_str(&self, name: &str) -> Result<String> {
        match self.fields.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(SkillfabError::LmPermanent(format!(
                "missing output field {:?}",
                name
            ))),
        }
    }

    /// A list field: a JSON array of strings, or a comma-separated string.
    pub fn require_list(&self, name: &str) -> Result<Vec<String>> {
        match self.fields.get(name) {
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|s| !s.trim().is_empty())
                .collect()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()),
            Some(Value::Null) | None => Err(SkillfabError::LmPermanent(format!(
                "missing output field {:?}",
                name
            ))),
            Some(other) => Err(SkillfabError::LmPermanent(format!(
                "field {:?} is not a list: {}",
                name, other
            ))),
        }
    }

    /// A numeric field, clamped to [0, 1] for score-shaped outputs.
    pub fn require_unit_score(&self, name: &str) -> Result<f64> {
        let value = self.require_f64(name)?;
        Ok(value.clamp(0.0, 1.0))
    }

    /// A numeric field. String-wrapped numbers are tolerated.
    pub fn require_f64(&self, name: &str) -> Result<f64> {
        match self.fields.get(name) {
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
                SkillfabError::LmPermanent(format!("field {:?} is not finite", name))
            }),
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                SkillfabError::LmPermanent(format!("field {:?} is not numeric: {:?}", name, s))
            }),
            _ => Err(SkillfabError::LmPermanent(format!(
                "missing numeric field {:?}",
                name
            ))),
        }
    }

    /// A boolean field. String forms ("true"/"false"/"yes"/"no") are
    /// tolerated.
    pub fn require_bool(&self, name: &str) -> Result<bool> {
        match self.fields.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "pass" => Ok(true),
                "false" | "no" | "fail" => Ok(false),
                other => Err(SkillfabError::LmPermanent(format!(
                    "field {:?} is not boolean: {:?}",
                    name, other
                ))),
            },
            _ => Err(SkillfabError::LmPermanent(format!(
                "missing boolean field {:?}",
                name
            ))),
        }
    }

    /// The raw field map, for operators that post-process further.
    pub fn fields(&self) -> &serde_json::Map<String, Value> {
        &self.fields
    }
}

/// An invocable operator: signature + sanitization + validation + logging.
#[derive(Debug, Clone)]
pub struct LmModule {
    signature: Signature,
    max_input_chars: usize,
}

impl LmModule {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// A copy of this module driven by a replacement signature (used by the
    /// tuner to swap in a proposed instruction).
    pub fn with_signature(&self, signature: Signature) -> Self {
        Self {
            signature,
            max_input_chars: self.max_input_chars,
        }
    }

    /// Collapse whitespace runs and truncate one input value.
    fn sanitize(&self, value: &str) -> String {
        let trimmed = value.trim();
        let mut out = String::with_capacity(trimmed.len().min(self.max_input_chars));
        let mut last_was_space = false;
        for c in trimmed.chars() {
            if out.len() >= self.max_input_chars {
                break;
            }
            if c == '\n' {
                out.push('\n');
                last_was_space = false;
            } else if c.is_whitespace() {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            } else {
                out.push(c);
                last_was_space = false;
            }
        }
        out
    }

    /// Invoke the operator: sanitize, render, complete, parse, log.
    pub async fn invoke(
        &self,
        client: &LmClient,
        inputs: &[(&str, &str)],
    ) -> Result<ModuleOutput> {
        let mut values = HashMap::new();
        for (name, value) in inputs {
            values.insert((*name).to_string(), self.sanitize(value));
        }

        let system = self.signature.render_system();
        let user = self.signature.render_user(&values);

        let reply = client.complete(&system, &user).await?;
        let fields = self.signature.parse_reply(&reply.text)?;

        tracing::debug!(
            operator = %self.signature.id,
            version = self.signature.version,
            prompt_tokens = reply.usage.prompt_tokens,
            completion_tokens = reply.usage.completion_tokens,
            latency_ms = reply.usage.latency_ms,
            "operator completed"
        );

        Ok(ModuleOutput {
            fields,
            usage: reply.usage,
        })
    }

    /// Blocking form of [`invoke`](Self::invoke) for callers outside the
    /// runtime. Must not be called from within an async task.
    pub fn invoke_blocking(
        &self,
        client: &LmClient,
        inputs: &[(&str, &str)],
    ) -> Result<ModuleOutput> {
        futures::executor::block_on(self.invoke(client, inputs))
    }
}
