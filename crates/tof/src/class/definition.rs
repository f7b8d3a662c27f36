//! Declared schema of model types.
//!
//! Definitions are static: activation never changes them. They are loaded
//! from a TOML file by the CLI or registered in code by the host.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TofError};
use crate::models::ContentType;

/// Primary key column present on every model table.
pub const ID_FIELD: &str = "id";

/// Storage kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
}

fn default_kind() -> FieldKind {
    FieldKind::Text
}

/// Declared schema of one model type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModelEntry", into = "ModelEntry")]
pub struct ModelDefinition {
    pub content_type: ContentType,
    pub table: String,
    pub fields: Vec<FieldDefinition>,
}

impl ModelDefinition {
    /// Start a definition stored in `{app_label}_{model}`.
    pub fn new(content_type: ContentType) -> Self {
        let table = format!("{}_{}", content_type.app_label, content_type.model);
        Self {
            content_type,
            table,
            fields: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        name == ID_FIELD || self.get_field(name).is_some()
    }

    /// Error unless `name` is a declared field. The primary key is not one.
    pub fn check_field(&self, name: &str) -> Result<()> {
        if self.get_field(name).is_some() {
            Ok(())
        } else {
            Err(TofError::unknown_field(self.content_type.to_string(), name))
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD || field.name.is_empty() || field.name.contains("__") {
                return Err(TofError::Internal(anyhow::anyhow!(
                    "invalid field name '{}' on {}",
                    field.name,
                    self.content_type
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(TofError::Internal(anyhow::anyhow!(
                    "field '{}' declared twice on {}",
                    field.name,
                    self.content_type
                )));
            }
        }
        Ok(())
    }
}

/// On-disk form of a model definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelEntry {
    app_label: String,
    model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

impl TryFrom<ModelEntry> for ModelDefinition {
    type Error = TofError;

    fn try_from(entry: ModelEntry) -> Result<Self> {
        let content_type: ContentType = format!("{}.{}", entry.app_label, entry.model).parse()?;
        let mut definition = ModelDefinition::new(content_type);
        if let Some(table) = entry.table {
            definition.table = table;
        }
        definition.fields = entry.fields;
        definition.validate()?;
        Ok(definition)
    }
}

impl From<ModelDefinition> for ModelEntry {
    fn from(def: ModelDefinition) -> Self {
        Self {
            app_label: def.content_type.app_label,
            model: def.content_type.model,
            table: Some(def.table),
            fields: def.fields,
        }
    }
}

/// Top level of a model definition file.
#[derive(Debug, Deserialize)]
pub(crate) struct DefinitionFile {
    #[serde(default, rename = "model")]
    pub models: Vec<ModelDefinition>,
}
