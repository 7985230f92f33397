use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::spec::{FieldDescriptor, FieldType, FormSchema};
use crate::state::{FieldValue, SubmissionState};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("number pattern compiles")
});

/// Per-field validation messages keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field_id: &str) -> Option<&str> {
        self.0.get(field_id).map(String::as_str)
    }

    pub fn insert(&mut self, field_id: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field_id.into(), message.into());
    }

    /// Drops the message for one field. Returns whether one was present.
    pub fn clear_field(&mut self, field_id: &str) -> bool {
        self.0.remove(field_id).is_some()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Checks every required field of `schema` against `state`.
pub fn validate(schema: &FormSchema, state: &SubmissionState) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for field in schema.fields.iter().filter(|field| field.required) {
        let value = state.get(&field.id).filter(|value| value.fits(field.kind));
        if let Some(message) = check_required(field, value) {
            errors.insert(field.id.clone(), message);
        }
    }
    errors
}

fn check_required(field: &FieldDescriptor, value: Option<&FieldValue>) -> Option<String> {
    let label = field.display_label();
    let missing = || Some(format!("{} is required", label));

    match (field.kind, value) {
        (_, None) => missing(),
        (FieldType::Number, Some(FieldValue::Text(raw))) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                missing()
            } else if !is_number(trimmed) {
                Some(format!("{} must be a valid number", label))
            } else {
                None
            }
        }
        (_, Some(value)) if value.is_blank() => missing(),
        _ => None,
    }
}

/// Finite decimal number with optional sign, fraction and exponent.
pub fn is_number(raw: &str) -> bool {
    NUMBER.is_match(raw) && raw.parse::<f64>().is_ok_and(f64::is_finite)
}
