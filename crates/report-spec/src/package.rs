use crate::spec::FormSchema;
use crate::state::{FieldValue, FileHandle, SubmissionState};

/// Body of a single multipart entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    Text(String),
    File(FileHandle),
}

/// Named multipart entry. Names may repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub body: PartBody,
}

/// Transport-neutral multipart body built from a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    parts: Vec<Part>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::Text(value.into()),
        });
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: FileHandle) {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::File(file),
        });
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// All entries stored under `name`, in insertion order.
    pub fn entries<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PartBody> + 'a {
        self.parts
            .iter()
            .filter(move |part| part.name == name)
            .map(|part| &part.body)
    }

    /// First text entry stored under `name`.
    pub fn text<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.entries(name).find_map(|body| match body {
            PartBody::Text(text) => Some(text.as_str()),
            PartBody::File(_) => None,
        })
    }
}

/// Converts the submission state into multipart entries, in schema order.
///
/// Files go under their field id, one entry each. Checkbox selections are
/// joined with `,` following the schema's option order.
pub fn package(schema: &FormSchema, state: &SubmissionState) -> MultipartPayload {
    let mut payload = MultipartPayload::new();
    for field in &schema.fields {
        let Some(value) = state.get(&field.id) else {
            continue;
        };
        match value {
            FieldValue::Images(files) => {
                for file in files {
                    payload.push_file(field.id.clone(), file.clone());
                }
            }
            FieldValue::Choices(selected) => {
                let joined = field
                    .options
                    .iter()
                    .filter(|option| selected.contains(*option))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(",");
                payload.push_text(field.id.clone(), joined);
            }
            FieldValue::Text(text) => payload.push_text(field.id.clone(), text.clone()),
        }
    }
    payload
}
