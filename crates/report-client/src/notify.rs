use serde::Serialize;

pub const LOAD_FAILED: &str = "Could not load the form. Please try again later.";
pub const SUBMIT_FAILED: &str = "Failed to submit your report. Please try again.";
pub const SUBMITTED: &str = "Report submitted successfully.";
pub const SUBMIT_IN_PROGRESS: &str = "Your report is still being sent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// User-facing toast raised by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
