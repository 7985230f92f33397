use serde_json::{Map, Value, json};

use crate::{
    preview::{PreviewHandle, PreviewStore},
    spec::{FieldDescriptor, FieldType, FormSchema},
    state::{FieldValue, SubmissionState},
    validate::ValidationErrors,
};

/// Advisory accept filter for image pickers; not enforced.
pub const IMAGE_ACCEPT: &str = "image/*";

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Some required field is still blank.
    NeedInput,
    /// Every required field has a value.
    Ready,
    /// The last submit attempt left errors on the form.
    Invalid,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Ready => "ready",
            RenderStatus::Invalid => "invalid",
        }
    }
}

/// Filled-field counters exposed to renderers.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub filled: usize,
    pub total: usize,
}

/// Field metadata shared by every control.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckboxOption {
    pub value: String,
    pub checked: bool,
}

/// A picked file together with its preview handle.
#[derive(Debug, Clone)]
pub struct FilePreview {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub preview: Option<PreviewHandle>,
}

/// Input control derived from a field descriptor.
#[derive(Debug, Clone)]
pub enum Control {
    TextInput {
        field: RenderField,
        value: String,
    },
    NumberInput {
        field: RenderField,
        value: String,
    },
    CheckboxGroup {
        field: RenderField,
        options: Vec<CheckboxOption>,
    },
    FilePicker {
        field: RenderField,
        accept: &'static str,
        multiple: bool,
        files: Vec<FilePreview>,
    },
}

impl Control {
    pub fn field(&self) -> &RenderField {
        match self {
            Control::TextInput { field, .. }
            | Control::NumberInput { field, .. }
            | Control::CheckboxGroup { field, .. }
            | Control::FilePicker { field, .. } => field,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Control::TextInput { .. } => "text_input",
            Control::NumberInput { .. } => "number_input",
            Control::CheckboxGroup { .. } => "checkbox_group",
            Control::FilePicker { .. } => "file_picker",
        }
    }
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_title: String,
    pub description: Option<String>,
    pub status: RenderStatus,
    pub progress: RenderProgress,
    pub controls: Vec<Control>,
}

/// Build the renderer payload from the schema, current state and errors.
pub fn build_render_payload(
    schema: &FormSchema,
    state: &SubmissionState,
    errors: &ValidationErrors,
    previews: &PreviewStore,
) -> RenderPayload {
    let controls = schema
        .fields
        .iter()
        .map(|field| build_control(field, state.get(&field.id), errors, previews))
        .collect::<Vec<_>>();

    let filled = schema
        .fields
        .iter()
        .filter(|field| {
            state
                .get(&field.id)
                .is_some_and(|value| !value.is_blank())
        })
        .count();
    let required_blank = schema.fields.iter().any(|field| {
        field.required
            && state
                .get(&field.id)
                .is_none_or(|value| value.is_blank())
    });

    let status = if !errors.is_empty() {
        RenderStatus::Invalid
    } else if required_blank {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Ready
    };

    RenderPayload {
        form_id: schema.id.clone(),
        form_title: schema.display_title().to_string(),
        description: schema.description.clone(),
        status,
        progress: RenderProgress {
            filled,
            total: schema.fields.len(),
        },
        controls,
    }
}

fn build_control(
    field: &FieldDescriptor,
    value: Option<&FieldValue>,
    errors: &ValidationErrors,
    previews: &PreviewStore,
) -> Control {
    let render_field = RenderField {
        id: field.id.clone(),
        label: field.display_label().to_string(),
        description: field.description.clone(),
        required: field.required,
        error: errors.get(&field.id).map(String::from),
    };

    match field.kind {
        FieldType::Text | FieldType::Number => {
            let value = match value {
                Some(FieldValue::Text(text)) => text.clone(),
                _ => String::new(),
            };
            if field.kind == FieldType::Number {
                Control::NumberInput {
                    field: render_field,
                    value,
                }
            } else {
                Control::TextInput {
                    field: render_field,
                    value,
                }
            }
        }
        FieldType::Checkbox => {
            let options = field
                .options
                .iter()
                .map(|option| CheckboxOption {
                    value: option.clone(),
                    checked: matches!(
                        value,
                        Some(FieldValue::Choices(selected)) if selected.contains(option)
                    ),
                })
                .collect();
            Control::CheckboxGroup {
                field: render_field,
                options,
            }
        }
        FieldType::Image => {
            let handles = previews.previews(&field.id);
            let files = match value {
                Some(FieldValue::Images(files)) => files
                    .iter()
                    .enumerate()
                    .map(|(index, file)| FilePreview {
                        file_name: file.name.clone(),
                        content_type: file.content_type.clone(),
                        size: file.len(),
                        preview: handles.get(index).cloned(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Control::FilePicker {
                field: render_field,
                accept: IMAGE_ACCEPT,
                multiple: true,
                files,
            }
        }
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let controls = payload
        .controls
        .iter()
        .map(|control| {
            let field = control.field();
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("control".into(), Value::String(control.kind_label().into()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert(
                "description".into(),
                field
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert("required".into(), Value::Bool(field.required));
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            match control {
                Control::TextInput { value, .. } | Control::NumberInput { value, .. } => {
                    map.insert("value".into(), Value::String(value.clone()));
                }
                Control::CheckboxGroup { options, .. } => {
                    let options = options
                        .iter()
                        .map(|option| json!({ "value": option.value, "checked": option.checked }))
                        .collect();
                    map.insert("options".into(), Value::Array(options));
                }
                Control::FilePicker {
                    accept,
                    multiple,
                    files,
                    ..
                } => {
                    map.insert("accept".into(), Value::String((*accept).into()));
                    map.insert("multiple".into(), Value::Bool(*multiple));
                    let files = files
                        .iter()
                        .map(|file| {
                            json!({
                                "name": file.file_name,
                                "content_type": file.content_type,
                                "size": file.size,
                                "preview": file.preview.as_ref().map(PreviewHandle::as_str),
                            })
                        })
                        .collect();
                    map.insert("files".into(), Value::Array(files));
                }
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "description": payload.description,
        "status": payload.status.as_str(),
        "progress": {
            "filled": payload.progress.filled,
            "total": payload.progress.total,
        },
        "controls": controls,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Form: {} ({})",
        payload.form_title, payload.form_id
    ));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.filled,
        payload.progress.total
    ));
    if let Some(description) = &payload.description {
        lines.push(format!("About: {}", description));
    }

    lines.push("Fields:".to_string());
    for control in &payload.controls {
        let field = control.field();
        let mut entry = format!(" - {} ({})", field.id, field.label);
        if field.required {
            entry.push_str(" [required]");
        }
        match control {
            Control::TextInput { value, .. } | Control::NumberInput { value, .. } => {
                if !value.is_empty() {
                    entry.push_str(&format!(" = {}", value));
                }
            }
            Control::CheckboxGroup { options, .. } => {
                let rendered = options
                    .iter()
                    .map(|option| {
                        let mark = if option.checked { "x" } else { " " };
                        format!("[{}] {}", mark, option.value)
                    })
                    .collect::<Vec<_>>()
                    .join("  ");
                entry.push_str(&format!(": {}", rendered));
            }
            Control::FilePicker { files, .. } => {
                if files.is_empty() {
                    entry.push_str(": no files");
                } else {
                    let names = files
                        .iter()
                        .map(|file| file.file_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    entry.push_str(&format!(": {}", names));
                }
            }
        }
        lines.push(entry);
        if let Some(error) = &field.error {
            lines.push(format!("   ! {}", error));
        }
    }

    lines.join("\n")
}
