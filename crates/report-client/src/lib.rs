pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod notify;

pub use backend::{FormBackend, SubmitResponse};
pub use config::{ClientConfig, ENV_BASE_URL, ENV_TIMEOUT_SECS};
pub use controller::{EditError, LoadOutcome, Phase, SubmissionController, SubmitOutcome};
pub use error::ClientError;
pub use http::HttpBackend;
pub use notify::{Notification, NotificationLevel};
