use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use report_spec::{
    FieldValue, FileHandle, FormSchema, FormSession, PreviewHandle, RenderPayload, StateError,
    SubmissionReceipt, SubmissionState, ValidationErrors,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::FormBackend;
use crate::error::ClientError;
use crate::notify::{self, Notification};

/// Where a controller is in its form-filling lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Submitting,
    /// The schema could not be loaded; the user has been sent away.
    Redirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Redirected,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Accepted by the backend; the form has been reset.
    Submitted(SubmissionReceipt),
    /// Nothing was sent; errors are keyed by field id.
    Invalid(ValidationErrors),
    /// Sending failed; the entered values are kept for a manual retry.
    Failed,
    /// Another submission is still in flight.
    Busy,
    /// No form is loaded.
    NotReady,
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("no form is loaded")]
    NotLoaded,
    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    /// Bumped whenever a session starts or ends; a submit only applies its
    /// result to the generation it was packaged from.
    generation: u64,
    form_id: Option<String>,
    session: Option<FormSession>,
    notifications: Vec<Notification>,
}

/// Owns one form-filling session: schema load, edits, validation and the
/// single in-flight submission.
pub struct SubmissionController<B> {
    backend: B,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even when the submit future is dropped.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    inner: &'a Mutex<Inner>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.phase == Phase::Submitting {
            inner.phase = Phase::Ready;
        }
        self.flag.store(false, Ordering::Release);
    }
}

impl<B: FormBackend> SubmissionController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                generation: 0,
                form_id: None,
                session: None,
                notifications: Vec::new(),
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the schema and starts a fresh session. Any failure is fatal
    /// for this controller: it moves to `Phase::Redirected` and records a
    /// notification. There is no retry.
    pub async fn load_schema(&self, form_id: &str) -> LoadOutcome {
        {
            let mut inner = self.inner();
            inner.generation += 1;
            inner.phase = Phase::Loading;
        }
        let fetched = self.backend.fetch_schema(form_id).await;
        let session =
            fetched.and_then(|schema| FormSession::new(schema).map_err(ClientError::from));

        let mut inner = self.inner();
        match session {
            Ok(session) => {
                info!(
                    form_id,
                    fields = session.schema().fields.len(),
                    "form schema loaded"
                );
                inner.session = Some(session);
                inner.form_id = Some(form_id.to_string());
                inner.phase = Phase::Ready;
                LoadOutcome::Loaded
            }
            Err(err) => {
                warn!(form_id, error = %err, "could not load form schema");
                inner.session = None;
                inner.form_id = None;
                inner.phase = Phase::Redirected;
                inner
                    .notifications
                    .push(Notification::error(notify::LOAD_FAILED));
                LoadOutcome::Redirected
            }
        }
    }

    fn with_session<T>(
        &self,
        edit: impl FnOnce(&mut FormSession) -> Result<T, StateError>,
    ) -> Result<T, EditError> {
        let mut inner = self.inner();
        let session = inner.session.as_mut().ok_or(EditError::NotLoaded)?;
        Ok(edit(session)?)
    }

    /// Replaces a field value and optimistically clears its error.
    pub fn update_field(&self, field_id: &str, value: FieldValue) -> Result<bool, EditError> {
        self.with_session(|session| session.update_field(field_id, value))
    }

    pub fn toggle_option(&self, field_id: &str, option: &str) -> Result<bool, EditError> {
        self.with_session(|session| session.toggle_option(field_id, option))
    }

    pub fn attach_image(
        &self,
        field_id: &str,
        file: FileHandle,
    ) -> Result<PreviewHandle, EditError> {
        self.with_session(|session| session.attach_image(field_id, file))
    }

    pub fn remove_image(&self, field_id: &str, index: usize) -> Result<FileHandle, EditError> {
        self.with_session(|session| session.remove_image(field_id, index))
    }

    /// Validates, packages and posts the current values.
    pub async fn submit(&self) -> SubmitOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("submit ignored while another submission is in flight");
            self.inner()
                .notifications
                .push(Notification::info(notify::SUBMIT_IN_PROGRESS));
            return SubmitOutcome::Busy;
        }
        let _in_flight = InFlight {
            flag: &self.in_flight,
            inner: &self.inner,
        };

        let (generation, form_id, payload, draft) = {
            let mut guard = self.inner();
            let inner = &mut *guard;
            let (Some(session), Some(form_id)) = (inner.session.as_mut(), inner.form_id.clone())
            else {
                return SubmitOutcome::NotReady;
            };
            let errors = session.validate();
            if !errors.is_empty() {
                info!(
                    form_id = %form_id,
                    invalid = errors.len(),
                    "submission blocked by validation"
                );
                return SubmitOutcome::Invalid(errors.clone());
            }
            inner.phase = Phase::Submitting;
            (
                inner.generation,
                form_id,
                session.package(),
                session.receipt(None),
            )
        };

        let result = self.backend.submit_response(&form_id, payload).await;

        let mut inner = self.inner();
        if inner.generation != generation {
            debug!(form_id = %form_id, "session left during submission; result ignored");
            return match result {
                Ok(response) => SubmitOutcome::Submitted(SubmissionReceipt {
                    reference: response.reference_number,
                    ..draft
                }),
                Err(_) => SubmitOutcome::Failed,
            };
        }
        inner.phase = Phase::Ready;
        match result {
            Ok(response) => {
                info!(
                    form_id = %form_id,
                    reference = response.reference_number.as_deref().unwrap_or("-"),
                    "report submitted"
                );
                if let Some(session) = inner.session.as_mut() {
                    session.reset();
                }
                inner
                    .notifications
                    .push(Notification::success(notify::SUBMITTED));
                SubmitOutcome::Submitted(SubmissionReceipt {
                    reference: response.reference_number,
                    ..draft
                })
            }
            Err(err) => {
                warn!(form_id = %form_id, error = %err, "report submission failed");
                inner
                    .notifications
                    .push(Notification::error(notify::SUBMIT_FAILED));
                SubmitOutcome::Failed
            }
        }
    }

    /// Drops the session, its values and previews.
    pub fn navigate_away(&self) {
        let mut inner = self.inner();
        inner.generation += 1;
        inner.session = None;
        inner.form_id = None;
        if inner.phase != Phase::Redirected {
            inner.phase = Phase::Idle;
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner().phase
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn schema(&self) -> Option<FormSchema> {
        self.inner()
            .session
            .as_ref()
            .map(|session| session.schema().clone())
    }

    pub fn state(&self) -> Option<SubmissionState> {
        self.inner()
            .session
            .as_ref()
            .map(|session| session.state().clone())
    }

    pub fn errors(&self) -> ValidationErrors {
        self.inner()
            .session
            .as_ref()
            .map(|session| session.errors().clone())
            .unwrap_or_default()
    }

    pub fn render(&self) -> Option<RenderPayload> {
        self.inner().session.as_ref().map(FormSession::render)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner().notifications.clone()
    }

    pub fn drain_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.inner().notifications)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use report_spec::MultipartPayload;
    use serde_json::json;

    use super::*;
    use crate::backend::SubmitResponse;
    use crate::notify::NotificationLevel;

    #[derive(Default)]
    struct FakeBackend {
        schema: Option<FormSchema>,
        fail_submit: bool,
        delay: Option<Duration>,
        posted: Mutex<Vec<(String, MultipartPayload)>>,
    }

    #[async_trait]
    impl FormBackend for FakeBackend {
        async fn fetch_schema(&self, _form_id: &str) -> Result<FormSchema, ClientError> {
            self.schema.clone().ok_or(ClientError::Status {
                status: 404,
                body: "not found".into(),
            })
        }

        async fn submit_response(
            &self,
            form_id: &str,
            payload: MultipartPayload,
        ) -> Result<SubmitResponse, ClientError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.posted
                .lock()
                .unwrap()
                .push((form_id.to_string(), payload));
            if self.fail_submit {
                return Err(ClientError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(SubmitResponse {
                reference_number: Some("RPT-0001".into()),
            })
        }
    }

    fn name_schema() -> FormSchema {
        serde_json::from_value(json!({
            "id": "feedback",
            "fields": [{ "id": "name", "type": "text", "required": true }]
        }))
        .expect("schema")
    }

    fn backend() -> FakeBackend {
        FakeBackend {
            schema: Some(name_schema()),
            ..FakeBackend::default()
        }
    }

    #[tokio::test]
    async fn load_failure_redirects_with_notification() {
        let controller = SubmissionController::new(FakeBackend::default());
        assert_eq!(
            controller.load_schema("feedback").await,
            LoadOutcome::Redirected
        );
        assert_eq!(controller.phase(), Phase::Redirected);
        assert!(controller.state().is_none());
        let notes = controller.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert!(matches!(
            controller.update_field("name", FieldValue::text("x")),
            Err(EditError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn schema_failing_checks_is_a_load_failure() {
        let schema: FormSchema = serde_json::from_value(json!({
            "id": "dup",
            "fields": [
                { "id": "a", "type": "text" },
                { "id": "a", "type": "text" }
            ]
        }))
        .unwrap();
        let controller = SubmissionController::new(FakeBackend {
            schema: Some(schema),
            ..FakeBackend::default()
        });
        assert_eq!(controller.load_schema("dup").await, LoadOutcome::Redirected);
    }

    #[tokio::test]
    async fn load_initializes_empty_state() {
        let controller = SubmissionController::new(backend());
        assert_eq!(controller.load_schema("feedback").await, LoadOutcome::Loaded);
        assert_eq!(controller.phase(), Phase::Ready);
        let state = controller.state().expect("state");
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("name"), Some(&FieldValue::text("")));
    }

    #[tokio::test]
    async fn invalid_submission_makes_no_network_call() {
        let controller = SubmissionController::new(backend());
        controller.load_schema("feedback").await;

        let SubmitOutcome::Invalid(errors) = controller.submit().await else {
            panic!("expected validation errors");
        };
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({ "name": "name is required" })
        );
        assert!(controller.backend().posted.lock().unwrap().is_empty());
        assert_eq!(controller.errors(), errors);

        controller
            .update_field("name", FieldValue::text("J"))
            .unwrap();
        assert!(controller.errors().is_empty());
    }

    #[tokio::test]
    async fn successful_submission_posts_once_and_resets() {
        let controller = SubmissionController::new(backend());
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        let SubmitOutcome::Submitted(receipt) = controller.submit().await else {
            panic!("expected submission");
        };
        assert_eq!(receipt.reference.as_deref(), Some("RPT-0001"));
        assert_eq!(receipt.entries[0].value, "Juan");

        let posted = controller.backend().posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "feedback");
        assert_eq!(posted[0].1.text("name"), Some("Juan"));

        let state = controller.state().expect("state");
        assert_eq!(state.get("name"), Some(&FieldValue::text("")));
        assert_eq!(controller.phase(), Phase::Ready);
        assert!(!controller.is_submitting());
        let notes = controller.drain_notifications();
        assert_eq!(notes, vec![Notification::success(notify::SUBMITTED)]);
        assert!(controller.notifications().is_empty());
    }

    #[tokio::test]
    async fn failed_submission_keeps_values() {
        let controller = SubmissionController::new(FakeBackend {
            fail_submit: true,
            ..backend()
        });
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        assert!(matches!(controller.submit().await, SubmitOutcome::Failed));
        assert_eq!(
            controller.state().unwrap().get("name"),
            Some(&FieldValue::text("Juan"))
        );
        assert_eq!(
            controller.notifications(),
            vec![Notification::error(notify::SUBMIT_FAILED)]
        );
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_as_busy() {
        let controller = SubmissionController::new(FakeBackend {
            delay: Some(Duration::from_millis(50)),
            ..backend()
        });
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        let (first, second) = tokio::join!(controller.submit(), controller.submit());
        assert!(matches!(first, SubmitOutcome::Submitted(_)));
        assert!(matches!(second, SubmitOutcome::Busy));
        assert_eq!(controller.backend().posted.lock().unwrap().len(), 1);
        assert_eq!(
            controller.notifications(),
            vec![
                Notification::info(notify::SUBMIT_IN_PROGRESS),
                Notification::success(notify::SUBMITTED),
            ]
        );
    }

    #[tokio::test]
    async fn late_result_does_not_touch_a_reloaded_session() {
        let controller = SubmissionController::new(FakeBackend {
            delay: Some(Duration::from_millis(100)),
            ..backend()
        });
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        let (outcome, ()) = tokio::join!(controller.submit(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.navigate_away();
            assert_eq!(controller.load_schema("feedback").await, LoadOutcome::Loaded);
            controller
                .update_field("name", FieldValue::text("Maria"))
                .unwrap();
        });

        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert_eq!(
            controller.state().unwrap().get("name"),
            Some(&FieldValue::text("Maria"))
        );
        assert!(controller.notifications().is_empty());
        assert_eq!(controller.phase(), Phase::Ready);
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn late_failure_does_not_notify_a_different_form() {
        let controller = SubmissionController::new(FakeBackend {
            delay: Some(Duration::from_millis(100)),
            fail_submit: true,
            ..backend()
        });
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        let (outcome, ()) = tokio::join!(controller.submit(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.navigate_away();
            controller.load_schema("other").await;
            controller
                .update_field("name", FieldValue::text("Maria"))
                .unwrap();
        });

        assert!(matches!(outcome, SubmitOutcome::Failed));
        assert_eq!(
            controller.state().unwrap().get("name"),
            Some(&FieldValue::text("Maria"))
        );
        assert!(controller.notifications().is_empty());
    }

    #[tokio::test]
    async fn cancelled_submit_releases_the_controller() {
        let controller = SubmissionController::new(FakeBackend {
            delay: Some(Duration::from_millis(50)),
            ..backend()
        });
        controller.load_schema("feedback").await;
        controller
            .update_field("name", FieldValue::text("Juan"))
            .unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), controller.submit()).await;
        assert!(cancelled.is_err());
        assert!(!controller.is_submitting());
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(
            controller.state().unwrap().get("name"),
            Some(&FieldValue::text("Juan"))
        );

        assert!(matches!(
            controller.submit().await,
            SubmitOutcome::Submitted(_)
        ));
        assert_eq!(controller.backend().posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn navigate_away_discards_session() {
        let controller = SubmissionController::new(backend());
        controller.load_schema("feedback").await;
        controller.navigate_away();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.state().is_none());
        assert!(matches!(controller.submit().await, SubmitOutcome::NotReady));
    }
}
