use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::spec::{FieldType, FormSchema};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when an edit does not fit the loaded schema.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("field '{0}' is not part of this form")]
    UnknownField(String),
    #[error("field '{field}' expects a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    #[error("field '{field}' has no option '{option}'")]
    UnknownOption { field: String, option: String },
    #[error("field '{field}' has {len} file(s); index {index} is out of range")]
    ImageIndex {
        field: String,
        index: usize,
        len: usize,
    },
    #[error("answer for '{field}' is not usable: {reason}")]
    InvalidAnswer { field: String, reason: String },
    #[error(transparent)]
    File(#[from] FileError),
}

/// A picked file held in memory until submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = guess_content_type(&name).map(String::from);
        Self {
            name,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, FileError> {
        let bytes = fs::read(path).map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Current value of a single field, tagged by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Raw input for text and number fields.
    Text(String),
    /// Selected checkbox options.
    Choices(BTreeSet<String>),
    /// Picked files in upload order.
    Images(Vec<FileHandle>),
}

impl FieldValue {
    pub fn empty_for(kind: FieldType) -> Self {
        match kind {
            FieldType::Text | FieldType::Number => FieldValue::Text(String::new()),
            FieldType::Checkbox => FieldValue::Choices(BTreeSet::new()),
            FieldType::Image => FieldValue::Images(Vec::new()),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Choices(values.into_iter().map(Into::into).collect())
    }

    pub fn fits(&self, kind: FieldType) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Text(_), FieldType::Text | FieldType::Number)
                | (FieldValue::Choices(_), FieldType::Checkbox)
                | (FieldValue::Images(_), FieldType::Image)
        )
    }

    /// Empty in the sense used by required-field checks.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Choices(choices) => choices.is_empty(),
            FieldValue::Images(files) => files.is_empty(),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Choices(_) => "choices",
            FieldValue::Images(_) => "images",
        }
    }

    /// JSON view used by renderers; files are listed by name.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Choices(choices) => {
                Value::Array(choices.iter().cloned().map(Value::String).collect())
            }
            FieldValue::Images(files) => Value::Array(
                files
                    .iter()
                    .map(|file| Value::String(file.name.clone()))
                    .collect(),
            ),
        }
    }
}

/// Field id to value map for one form-filling session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionState {
    values: BTreeMap<String, FieldValue>,
}

impl SubmissionState {
    /// One empty entry per schema field.
    pub fn empty_for(schema: &FormSchema) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|field| (field.id.clone(), FieldValue::empty_for(field.kind)))
            .collect();
        Self { values }
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldValue> {
        self.values.get(field_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    /// Replaces a field value. Returns whether the stored value changed.
    pub fn set(
        &mut self,
        schema: &FormSchema,
        field_id: &str,
        value: FieldValue,
    ) -> Result<bool, StateError> {
        let field = schema
            .field(field_id)
            .ok_or_else(|| StateError::UnknownField(field_id.to_string()))?;
        if !value.fits(field.kind) {
            return Err(StateError::TypeMismatch {
                field: field_id.to_string(),
                expected: field.kind,
                found: value.shape(),
            });
        }
        if let FieldValue::Choices(choices) = &value
            && let Some(option) = choices.iter().find(|option| !field.options.contains(option))
        {
            return Err(StateError::UnknownOption {
                field: field_id.to_string(),
                option: option.clone(),
            });
        }
        if self.values.get(field_id) == Some(&value) {
            return Ok(false);
        }
        self.values.insert(field_id.to_string(), value);
        Ok(true)
    }

    pub fn reset(&mut self, schema: &FormSchema) {
        *self = Self::empty_for(schema);
    }

    /// Builds a state from an answers document such as
    /// `{"name": "Juan", "kind": ["flood"], "photos": ["a.png"]}`.
    ///
    /// Image entries are file references resolved through `load_file`.
    pub fn from_answers<F>(
        schema: &FormSchema,
        answers: &Value,
        mut load_file: F,
    ) -> Result<Self, StateError>
    where
        F: FnMut(&str) -> Result<FileHandle, FileError>,
    {
        let mut state = Self::empty_for(schema);
        let Some(map) = answers.as_object() else {
            return Err(StateError::InvalidAnswer {
                field: "<root>".into(),
                reason: "answers must be a JSON object".into(),
            });
        };

        for (field_id, raw) in map {
            let field = schema
                .field(field_id)
                .ok_or_else(|| StateError::UnknownField(field_id.clone()))?;
            if raw.is_null() {
                continue;
            }
            let value = match field.kind {
                FieldType::Text | FieldType::Number => match raw {
                    Value::String(text) => FieldValue::Text(text.clone()),
                    Value::Number(number) => FieldValue::Text(number.to_string()),
                    _ => return Err(invalid_answer(field_id, "expected a string or number")),
                },
                FieldType::Checkbox => FieldValue::Choices(
                    string_list(raw).ok_or_else(|| {
                        invalid_answer(field_id, "expected an array of option strings")
                    })?
                    .into_iter()
                    .collect(),
                ),
                FieldType::Image => {
                    let references = string_list(raw)
                        .ok_or_else(|| invalid_answer(field_id, "expected an array of file paths"))?;
                    let files = references
                        .iter()
                        .map(|reference| load_file(reference))
                        .collect::<Result<Vec<_>, _>>()?;
                    FieldValue::Images(files)
                }
            };
            state.set(schema, field_id, value)?;
        }

        Ok(state)
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(single) => Some(vec![single.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

fn invalid_answer(field: &str, reason: &str) -> StateError {
    StateError::InvalidAnswer {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FormSchema {
        serde_json::from_value(json!({
            "id": "incident",
            "title": "Incident",
            "fields": [
                { "id": "name", "type": "text", "label": "Name", "required": true },
                { "id": "age", "type": "number", "label": "Age" },
                { "id": "kind", "type": "checkbox", "label": "Kind", "options": ["flood", "fire"] },
                { "id": "photos", "type": "image", "label": "Photos" }
            ]
        }))
        .expect("schema")
    }

    #[test]
    fn empty_state_has_one_entry_per_field() {
        let schema = schema();
        let state = SubmissionState::empty_for(&schema);
        assert_eq!(state.len(), schema.fields.len());
        assert_eq!(state.get("name"), Some(&FieldValue::text("")));
        assert_eq!(state.get("age"), Some(&FieldValue::text("")));
        assert_eq!(state.get("kind"), Some(&FieldValue::Choices(BTreeSet::new())));
        assert_eq!(state.get("photos"), Some(&FieldValue::Images(Vec::new())));
    }

    #[test]
    fn set_rejects_shape_mismatch_and_unknown_fields() {
        let schema = schema();
        let mut state = SubmissionState::empty_for(&schema);
        assert!(matches!(
            state.set(&schema, "kind", FieldValue::text("flood")),
            Err(StateError::TypeMismatch { .. })
        ));
        assert!(matches!(
            state.set(&schema, "missing", FieldValue::text("x")),
            Err(StateError::UnknownField(_))
        ));
        assert!(matches!(
            state.set(&schema, "kind", FieldValue::choices(["storm"])),
            Err(StateError::UnknownOption { .. })
        ));
        assert_eq!(state, SubmissionState::empty_for(&schema));
    }

    #[test]
    fn set_reports_whether_value_changed() {
        let schema = schema();
        let mut state = SubmissionState::empty_for(&schema);
        assert!(state.set(&schema, "name", FieldValue::text("Juan")).unwrap());
        assert!(!state.set(&schema, "name", FieldValue::text("Juan")).unwrap());
    }

    #[test]
    fn from_answers_loads_files_through_callback() {
        let schema = schema();
        let answers = json!({
            "name": "Juan",
            "age": 42,
            "kind": ["fire"],
            "photos": ["front.png", "back.jpg"]
        });
        let state = SubmissionState::from_answers(&schema, &answers, |reference| {
            Ok(FileHandle::new(reference, vec![1, 2, 3]))
        })
        .expect("state");

        assert_eq!(state.get("age"), Some(&FieldValue::text("42")));
        let Some(FieldValue::Images(files)) = state.get("photos") else {
            panic!("expected images");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content_type.as_deref(), Some("image/png"));
        assert_eq!(files[1].content_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn from_answers_rejects_unknown_fields() {
        let schema = schema();
        let err = SubmissionState::from_answers(&schema, &json!({ "extra": "x" }), |reference| {
            Ok(FileHandle::new(reference, Vec::new()))
        })
        .unwrap_err();
        assert!(matches!(err, StateError::UnknownField(field) if field == "extra"));
    }
}
