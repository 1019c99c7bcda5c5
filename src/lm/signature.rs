//! Declarative operator signatures.
//!
//! A signature names one LM call: ordered input fields, ordered output
//! fields, and an instruction. The runtime renders inputs into a prompt,
//! asks for a JSON object keyed by the output field names, and parses the
//! reply back into those fields. Versions are recorded with their score
//! deltas as the tuner refines instructions.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};

/// Declared type of an output field, used when parsing the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    List,
    Number,
    Boolean,
}

/// One named field in a signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            field_type: FieldType::Text,
        }
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }
}

/// A named input/output contract for one LM call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Stable operator id, e.g. `gather_requirements`
    pub id: String,
    /// Monotonic version, bumped by the tuner
    pub version: u32,
    /// The instruction rendered at the top of every prompt
    pub instruction: String,
    /// Ordered input fields
    pub inputs: Vec<FieldSpec>,
    /// Ordered output fields
    pub outputs: Vec<FieldSpec>,
}

impl Signature {
    pub fn new(id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            instruction: instruction.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, name: &str, description: &str) -> Self {
        self.inputs.push(FieldSpec::new(name, description));
        self
    }

    pub fn output(mut self, name: &str, description: &str, field_type: FieldType) -> Self {
        self.outputs
            .push(FieldSpec::new(name, description).typed(field_type));
        self
    }

    /// A copy with a replacement instruction and a bumped version.
    pub fn with_instruction(&self, instruction: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.instruction = instruction.into();
        next.version += 1;
        next
    }

    /// Render the system prompt: instruction plus the output contract.
    pub fn render_system(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.instruction);
        prompt.push_str("\n\nRespond with a single JSON object holding exactly these fields:\n");
        for field in &self.outputs {
            let shape = match field.field_type {
                FieldType::Text => "string",
                FieldType::List => "array of strings",
                FieldType::Number => "number",
                FieldType::Boolean => "boolean",
            };
            prompt.push_str(&format!("- \"{}\" ({}): {}\n", field.name, shape, field.description));
        }
        prompt.push_str("Do not add fields, commentary, or markdown fences around the JSON.");
        prompt
    }

    /// Render the user prompt from named input values.
    ///
    /// Inputs are rendered in declaration order; values for undeclared names
    /// are ignored, and declared-but-missing inputs render as empty.
    pub fn render_user(&self, values: &HashMap<String, String>) -> String {
        let mut prompt = String::new();
        for field in &self.inputs {
            let value = values.get(&field.name).map(String::as_str).unwrap_or("");
            prompt.push_str(&format!("[{}] ({})\n{}\n\n", field.name, field.description, value));
        }
        prompt
    }

    /// Parse an LM reply into the declared output fields.
    ///
    /// Tolerates fenced or chatty replies by extracting the outermost JSON
    /// object. A missing required field is a permanent failure.
    pub fn parse_reply(&self, raw: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
        let start = raw.find('{').ok_or_else(|| {
            SkillfabError::LmPermanent(format!("{}: reply contains no JSON object", self.id))
        })?;
        let end = raw.rfind('}').ok_or_else(|| {
            SkillfabError::LmPermanent(format!("{}: reply contains no JSON object", self.id))
        })?;
        if end < start {
            return Err(SkillfabError::LmPermanent(format!(
                "{}: malformed JSON reply",
                self.id
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&raw[start..=end]).map_err(|e| {
            SkillfabError::LmPermanent(format!("{}: reply is not valid JSON: {}", self.id, e))
        })?;
        let object = parsed.as_object().ok_or_else(|| {
            SkillfabError::LmPermanent(format!("{}: reply is not a JSON object", self.id))
        })?;

        // Unknown fields are discarded; missing required fields are permanent.
        let mut fields = serde_json::Map::new();
        for spec in &self.outputs {
            match object.get(&spec.name) {
                Some(value) => {
                    fields.insert(spec.name.clone(), value.clone());
                }
                None => {
                    return Err(SkillfabError::LmPermanent(format!(
                        "{}: reply missing required field {:?}",
                        self.id, spec.name
                    )));
                }
            }
        }
        Ok(fields)
    }
}

/// One recorded version of a signature with its evaluation score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureVersion {
    pub version: u32,
    pub instruction: String,
    /// Composite score observed for this version, if evaluated
    pub score: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Persisted signature data.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RegistryData {
    /// Version for future migrations
    version: u32,
    /// Version history per operator id
    history: HashMap<String, Vec<SignatureVersion>>,
}

/// Records signature versions and their scores across tuning iterations.
pub struct SignatureRegistry {
    path: PathBuf,
    data: RegistryData,
}

impl SignatureRegistry {
    /// Load the registry from `<data_dir>/signatures.json`, starting empty
    /// when the file is absent or unreadable.
    pub async fn load(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join("signatures.json");
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("signature registry unreadable, starting fresh: {}", e);
                RegistryData::default()
            }),
            Err(_) => RegistryData::default(),
        };
        Self { path, data }
    }

    /// Record a signature version with its observed score.
    pub fn record(&mut self, signature: &Signature, score: Option<f64>) {
        let entry = self.data.history.entry(signature.id.clone()).or_default();
        entry.push(SignatureVersion {
            version: signature.version,
            instruction: signature.instruction.clone(),
            score,
            recorded_at: Utc::now(),
        });
    }

    /// Version history for an operator id, oldest first.
    pub fn history(&self, id: &str) -> &[SignatureVersion] {
        self.data
            .history
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Persist to disk atomically (temp file + rename).
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| SkillfabError::Persistence(format!("signature registry: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
