use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    package::{MultipartPayload, package},
    preview::{PreviewHandle, PreviewStore},
    receipt::{ReceiptEntry, SubmissionReceipt},
    render::{RenderPayload, build_render_payload},
    spec::{FieldType, FormSchema, SchemaError},
    state::{FieldValue, FileHandle, StateError, SubmissionState},
    validate::{ValidationErrors, validate},
};

/// Schema, values, errors and previews for one form-filling session.
#[derive(Debug)]
pub struct FormSession {
    schema: FormSchema,
    state: SubmissionState,
    errors: ValidationErrors,
    previews: PreviewStore,
}

impl FormSession {
    pub fn new(schema: FormSchema) -> Result<Self, SchemaError> {
        schema.check()?;
        let state = SubmissionState::empty_for(&schema);
        Ok(Self {
            schema,
            state,
            errors: ValidationErrors::new(),
            previews: PreviewStore::new(),
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    /// Replaces a field value and clears that field's error.
    ///
    /// Returns whether the stored value changed; an identical value is a
    /// no-op.
    pub fn update_field(&mut self, field_id: &str, value: FieldValue) -> Result<bool, StateError> {
        let images = match &value {
            FieldValue::Images(files) => Some(files.clone()),
            _ => None,
        };
        let changed = self.state.set(&self.schema, field_id, value)?;
        if self.errors.clear_field(field_id) {
            debug!(field = field_id, "cleared validation error after edit");
        }
        if changed && let Some(files) = images {
            self.previews.replace_field(field_id, &files);
        }
        Ok(changed)
    }

    /// Adds or removes one checkbox option.
    pub fn toggle_option(&mut self, field_id: &str, option: &str) -> Result<bool, StateError> {
        let mut selected = match self.value_for(field_id, FieldType::Checkbox)? {
            FieldValue::Choices(selected) => selected.clone(),
            _ => BTreeSet::new(),
        };
        if !selected.remove(option) {
            selected.insert(option.to_string());
        }
        let checked = selected.contains(option);
        self.update_field(field_id, FieldValue::Choices(selected))?;
        Ok(checked)
    }

    /// Appends a file to an image field and issues its preview.
    pub fn attach_image(
        &mut self,
        field_id: &str,
        file: FileHandle,
    ) -> Result<PreviewHandle, StateError> {
        let mut files = match self.value_for(field_id, FieldType::Image)? {
            FieldValue::Images(files) => files.clone(),
            _ => Vec::new(),
        };
        files.push(file.clone());
        self.state
            .set(&self.schema, field_id, FieldValue::Images(files))?;
        self.errors.clear_field(field_id);
        Ok(self.previews.issue(field_id, &file))
    }

    /// Detaches the file and its preview at `index`.
    pub fn remove_image(&mut self, field_id: &str, index: usize) -> Result<FileHandle, StateError> {
        let mut files = match self.value_for(field_id, FieldType::Image)? {
            FieldValue::Images(files) => files.clone(),
            _ => Vec::new(),
        };
        if index >= files.len() {
            return Err(StateError::ImageIndex {
                field: field_id.to_string(),
                index,
                len: files.len(),
            });
        }
        let removed = files.remove(index);
        self.state
            .set(&self.schema, field_id, FieldValue::Images(files))?;
        self.previews.remove(field_id, index);
        self.errors.clear_field(field_id);
        Ok(removed)
    }

    /// Recomputes every validation error from scratch.
    pub fn validate(&mut self) -> &ValidationErrors {
        self.errors = validate(&self.schema, &self.state);
        &self.errors
    }

    pub fn package(&self) -> MultipartPayload {
        package(&self.schema, &self.state)
    }

    /// Back to empty values, no errors and no live previews.
    pub fn reset(&mut self) {
        self.state.reset(&self.schema);
        self.errors.clear();
        self.previews.revoke_all();
    }

    pub fn render(&self) -> RenderPayload {
        build_render_payload(&self.schema, &self.state, &self.errors, &self.previews)
    }

    /// Receipt for the current values, taken before a reset.
    pub fn receipt(&self, reference: Option<String>) -> SubmissionReceipt {
        let entries = self
            .schema
            .fields
            .iter()
            .filter_map(|field| {
                let value = self.state.get(&field.id)?;
                if value.is_blank() {
                    return None;
                }
                let display = match value {
                    FieldValue::Text(text) => text.trim().to_string(),
                    FieldValue::Choices(selected) => field
                        .options
                        .iter()
                        .filter(|option| selected.contains(*option))
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                    FieldValue::Images(files) => format!("{} file(s)", files.len()),
                };
                Some(ReceiptEntry {
                    label: field.display_label().to_string(),
                    value: display,
                })
            })
            .collect();

        SubmissionReceipt {
            form_id: self.schema.id.clone(),
            form_title: self.schema.display_title().to_string(),
            reference,
            entries,
        }
    }

    fn value_for(&self, field_id: &str, expected: FieldType) -> Result<&FieldValue, StateError> {
        let field = self
            .schema
            .field(field_id)
            .ok_or_else(|| StateError::UnknownField(field_id.to_string()))?;
        let value = self
            .state
            .get(field_id)
            .ok_or_else(|| StateError::UnknownField(field_id.to_string()))?;
        if field.kind != expected {
            return Err(StateError::TypeMismatch {
                field: field_id.to_string(),
                expected: field.kind,
                found: match expected {
                    FieldType::Checkbox => "choices",
                    FieldType::Image => "images",
                    FieldType::Text | FieldType::Number => "text",
                },
            });
        }
        Ok(value)
    }
}
