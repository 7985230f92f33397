use async_trait::async_trait;
use report_spec::{FormSchema, MultipartPayload};
use serde_json::Value;

use crate::error::ClientError;

/// What the backend acknowledged for an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitResponse {
    pub reference_number: Option<String>,
}

impl SubmitResponse {
    /// Reads `reference_number` (or `referenceNumber`) from a JSON body.
    /// Empty or non-JSON bodies carry no reference.
    pub fn from_body(body: &str) -> Self {
        let reference_number = serde_json::from_str::<Value>(body)
            .ok()
            .as_ref()
            .and_then(|value| {
                value
                    .get("reference_number")
                    .or_else(|| value.get("referenceNumber"))
            })
            .and_then(|reference| match reference {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            });
        Self { reference_number }
    }
}

/// Remote collaborator serving form schemas and accepting responses.
#[async_trait]
pub trait FormBackend: Send + Sync {
    async fn fetch_schema(&self, form_id: &str) -> Result<FormSchema, ClientError>;

    async fn submit_response(
        &self,
        form_id: &str,
        payload: MultipartPayload,
    ) -> Result<SubmitResponse, ClientError>;
}
