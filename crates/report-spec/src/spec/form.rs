use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::field::{FieldDescriptor, FieldType};

/// Reasons a form schema is rejected at load time.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse form schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field at position {index} has an empty id")]
    EmptyFieldId { index: usize },
    #[error("field id '{0}' is used more than once")]
    DuplicateFieldId(String),
    #[error("checkbox field '{0}' declares no options")]
    MissingOptions(String),
}

/// Top-level report form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSchema {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields in display order.
    pub fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    /// Parses and checks a schema document.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    /// Structural checks every loaded schema must pass.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.id.trim().is_empty() {
                return Err(SchemaError::EmptyFieldId { index });
            }
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateFieldId(field.id.clone()));
            }
            if field.kind == FieldType::Checkbox && field.options.is_empty() {
                return Err(SchemaError::MissingOptions(field.id.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}
