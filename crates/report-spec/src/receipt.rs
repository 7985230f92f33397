use handlebars::{Handlebars, no_escape};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RECEIPT_TEMPLATE: &str = "\
Report submitted
Form: {{form_title}} ({{form_id}})
{{#if reference}}Reference number: {{reference}}
{{else}}Reference number: pending
{{/if}}
{{#each entries}}  {{label}}: {{value}}
{{/each}}";

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("receipt template is invalid: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("failed to render receipt: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// One submitted value as shown on the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub label: String,
    pub value: String,
}

/// Confirmation data shown after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub form_id: String,
    pub form_title: String,
    /// Server-issued reference number, when the backend returned one.
    pub reference: Option<String>,
    pub entries: Vec<ReceiptEntry>,
}

pub fn render_receipt(receipt: &SubmissionReceipt) -> Result<String, ReceiptError> {
    let mut engine = Handlebars::new();
    engine.register_escape_fn(no_escape);
    engine.register_template_string("receipt", RECEIPT_TEMPLATE)?;
    Ok(engine.render("receipt", receipt)?)
}
