#![allow(missing_docs)]

pub mod form_session;
pub mod package;
pub mod preview;
pub mod receipt;
pub mod render;
pub mod session;
pub mod spec;
pub mod state;
pub mod validate;

pub use form_session::FormSession;
pub use package::{MultipartPayload, Part, PartBody, package};
pub use preview::{PreviewEntry, PreviewHandle, PreviewStore};
pub use receipt::{ReceiptEntry, ReceiptError, SubmissionReceipt, render_receipt};
pub use render::{
    CheckboxOption, Control, FilePreview, RenderField, RenderPayload, RenderProgress,
    RenderStatus, build_render_payload, render_json_ui, render_text,
};
pub use session::{Session, SessionError};
pub use spec::{FieldDescriptor, FieldType, FormSchema, SchemaError};
pub use state::{FieldValue, FileError, FileHandle, StateError, SubmissionState};
pub use validate::{ValidationErrors, validate};
