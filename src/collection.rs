//! Local mirror of one backend collection.
//!
//! A [`CollectionView`] owns the last successfully loaded copy of a collection
//! and keeps it in step with the server by refetching after every successful
//! write. Server-derived fields are never patched locally: the only way items
//! change is a completed [`CollectionView::load`].

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SchoolApi};

/// A backend collection the view can read, add to and delete from.
#[async_trait]
pub trait Resource: Send + Sync {
    type Item: Clone + Send + Sync;
    type Input: Send + Sync;
    type Id: Copy + Display + Send + Sync;

    /// Singular noun used in prompts and logs, e.g. "student".
    fn noun(&self) -> &'static str;

    fn notices(&self) -> &'static Notices;

    async fn fetch_all(&self, api: &dyn SchoolApi) -> Result<Vec<Self::Item>, ApiError>;
    async fn create(&self, api: &dyn SchoolApi, input: &Self::Input) -> Result<(), ApiError>;
    async fn delete(&self, api: &dyn SchoolApi, id: Self::Id) -> Result<(), ApiError>;
}

/// Required-field and number checks done before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} must be a non-negative number, got {value:?}")]
    InvalidAmount { field: &'static str, value: String },
}

/// Fixed wording shown after a write on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notices {
    pub created: &'static str,
    /// Prefix for the backend or transport message.
    pub create_failed: &'static str,
    pub deleted: &'static str,
    pub delete_failed: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] FormError),

    #[error("{0} has not been loaded")]
    NotLoaded(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SubmitError {
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Invalid(err) => err.to_string(),
            SubmitError::NotLoaded(_) => self.to_string(),
            SubmitError::Api(err) => err.user_message(),
        }
    }
}

/// Interactive yes/no gate in front of destructive actions.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// User-facing notice left behind by an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Success(String),
    Error(String),
}

impl Feedback {
    pub fn message(&self) -> &str {
        match self {
            Feedback::Success(message) | Feedback::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Feedback::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// The read failed; previous items were kept.
    Failed,
    /// The view was torn down before the reply arrived.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted,
    Failed,
}

/// Handed out when a read starts. A reply is only applied if no newer read
/// was started and the view is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    epoch: u64,
}

pub struct CollectionView<R: Resource> {
    resource: R,
    api: Arc<dyn SchoolApi>,
    items: Vec<R::Item>,
    loading: bool,
    loaded: bool,
    closed: bool,
    epoch: u64,
    feedback: Option<Feedback>,
}

impl<R: Resource> CollectionView<R> {
    pub fn new(resource: R, api: Arc<dyn SchoolApi>) -> Self {
        Self {
            resource,
            api,
            items: Vec::new(),
            loading: false,
            loaded: false,
            closed: false,
            epoch: 0,
            feedback: None,
        }
    }

    pub fn api(&self) -> &Arc<dyn SchoolApi> {
        &self.api
    }

    pub fn items(&self) -> &[R::Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether at least one read has completed successfully.
    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub(crate) fn set_feedback(&mut self, feedback: Feedback) {
        self.feedback = Some(feedback);
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.epoch += 1;
        self.loading = true;
        LoadTicket { epoch: self.epoch }
    }

    /// Applies a finished read. Failures are logged and leave the previous
    /// items untouched. Replies for a torn-down view, or overtaken by a newer
    /// read, are dropped.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<R::Item>, ApiError>,
    ) -> LoadOutcome {
        if self.closed || ticket.epoch != self.epoch {
            debug!(noun = self.resource.noun(), "discarding stale or closed reply");
            return LoadOutcome::Discarded;
        }

        self.loading = false;
        match result {
            Ok(items) => {
                debug!(noun = self.resource.noun(), count = items.len(), "collection loaded");
                self.items = items;
                self.loaded = true;
                LoadOutcome::Applied
            }
            Err(err) => {
                warn!(noun = self.resource.noun(), error = %err, "failed to load collection");
                LoadOutcome::Failed
            }
        }
    }

    pub async fn load(&mut self) -> LoadOutcome {
        let ticket = self.begin_load();
        let result = self.resource.fetch_all(self.api.as_ref()).await;
        self.finish_load(ticket, result)
    }

    /// Sends a create. On success the collection is reloaded; on failure the
    /// most specific message is left as feedback and the error returned so the
    /// caller can keep its form populated.
    pub async fn submit_create(&mut self, input: &R::Input) -> Result<(), ApiError> {
        let noun = self.resource.noun();
        let notices = self.resource.notices();
        match self.resource.create(self.api.as_ref(), input).await {
            Ok(()) => {
                info!(noun, "record created");
                self.feedback = Some(Feedback::Success(notices.created.to_string()));
                self.load().await;
                Ok(())
            }
            Err(err) => {
                self.feedback = Some(Feedback::Error(format!(
                    "{}: {}",
                    notices.create_failed,
                    err.user_message()
                )));
                Err(err)
            }
        }
    }

    /// Deletes after confirmation. Declining issues no request.
    pub async fn submit_delete(&mut self, id: R::Id, confirm: &mut dyn Confirm) -> DeleteOutcome {
        let noun = self.resource.noun();
        let notices = self.resource.notices();
        if !confirm.confirm(&format!("Are you sure you want to delete this {noun}?")) {
            return DeleteOutcome::Declined;
        }

        match self.resource.delete(self.api.as_ref(), id).await {
            Ok(()) => {
                info!(noun, %id, "record deleted");
                self.feedback = Some(Feedback::Success(notices.deleted.to_string()));
                self.load().await;
                DeleteOutcome::Deleted
            }
            Err(err) => {
                warn!(noun, %id, error = %err, "delete failed");
                self.feedback = Some(Feedback::Error(notices.delete_failed.to_string()));
                DeleteOutcome::Failed
            }
        }
    }

    /// Marks the view as gone. Any read still in flight is ignored when it lands.
    pub fn teardown(&mut self) {
        self.closed = true;
        self.epoch += 1;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::students::StudentResource;
    use crate::testing::{sample_student, FakeApi};

    fn view(api: &Arc<FakeApi>) -> CollectionView<StudentResource> {
        CollectionView::new(StudentResource, api.clone())
    }

    #[tokio::test]
    async fn load_replaces_items_wholesale() {
        let api = Arc::new(FakeApi::with_students(vec![
            sample_student(1, "10A"),
            sample_student(2, "10B"),
        ]));
        let mut view = view(&api);

        assert!(!view.has_loaded());
        assert_eq!(view.load().await, LoadOutcome::Applied);
        assert_eq!(view.len(), 2);
        assert!(!view.is_loading());
    }

    #[tokio::test]
    async fn failed_read_keeps_previous_items() {
        let api = Arc::new(FakeApi::with_students(vec![sample_student(1, "10A")]));
        let mut view = view(&api);
        view.load().await;

        api.fail_reads(true);
        assert_eq!(view.load().await, LoadOutcome::Failed);
        assert_eq!(view.len(), 1);
        assert!(view.has_loaded());
        assert!(!view.is_loading());
        assert!(view.feedback().is_none());
    }

    #[tokio::test]
    async fn failed_first_read_leaves_empty_state() {
        let api = Arc::new(FakeApi::default());
        api.fail_reads(true);
        let mut view = view(&api);

        assert_eq!(view.load().await, LoadOutcome::Failed);
        assert!(view.is_empty());
        assert!(!view.has_loaded());
    }

    #[tokio::test]
    async fn reply_after_teardown_is_discarded() {
        let api = Arc::new(FakeApi::with_students(vec![sample_student(1, "10A")]));
        let mut view = view(&api);

        let ticket = view.begin_load();
        let result = api.list_students().await;
        view.teardown();

        assert_eq!(view.finish_load(ticket, result), LoadOutcome::Discarded);
        assert!(view.is_empty());
        assert!(!view.has_loaded());
    }

    #[tokio::test]
    async fn older_reply_cannot_overwrite_newer_load() {
        let api = Arc::new(FakeApi::default());
        let mut view = view(&api);

        let older = view.begin_load();
        let newer = view.begin_load();
        let fresh = vec![sample_student(1, "10A"), sample_student(2, "10A")];

        assert_eq!(view.finish_load(newer, Ok(fresh.clone())), LoadOutcome::Applied);
        assert_eq!(
            view.finish_load(older, Ok(vec![sample_student(9, "9Z")])),
            LoadOutcome::Discarded
        );
        assert_eq!(view.items(), fresh.as_slice());
        assert!(!view.is_loading());
    }

    #[tokio::test]
    async fn older_failure_does_not_clear_loading_of_newer_read() {
        let api = Arc::new(FakeApi::default());
        let mut view = view(&api);

        let older = view.begin_load();
        let _newer = view.begin_load();

        assert_eq!(
            view.finish_load(older, Err(ApiError::Transport("Network Error".to_string()))),
            LoadOutcome::Discarded
        );
        assert!(view.is_loading());
    }

    #[tokio::test]
    async fn declined_delete_issues_no_request() {
        let api = Arc::new(FakeApi::with_students(vec![sample_student(1, "10A")]));
        let mut view = view(&api);
        view.load().await;
        let calls_before = api.calls().len();

        let mut decline = |_: &str| false;
        let outcome = view.submit_delete(1, &mut decline).await;

        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(api.calls().len(), calls_before);
        assert_eq!(view.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_delete_refetches() {
        let api = Arc::new(FakeApi::with_students(vec![
            sample_student(1, "10A"),
            sample_student(2, "10A"),
        ]));
        let mut view = view(&api);
        view.load().await;

        let mut prompts = Vec::new();
        let mut accept = |prompt: &str| {
            prompts.push(prompt.to_string());
            true
        };
        let outcome = view.submit_delete(2, &mut accept).await;

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(prompts, vec!["Are you sure you want to delete this student?"]);
        assert_eq!(
            api.calls(),
            vec!["GET /students", "DELETE /students/2", "GET /students"]
        );
        assert_eq!(view.len(), 1);
        assert_eq!(
            view.feedback(),
            Some(&Feedback::Success("Student deleted successfully!".to_string()))
        );
    }

    #[tokio::test]
    async fn failed_delete_reports_generic_error() {
        let api = Arc::new(FakeApi::with_students(vec![sample_student(1, "10A")]));
        let mut view = view(&api);
        view.load().await;

        let mut accept = |_: &str| true;
        let outcome = view.submit_delete(42, &mut accept).await;

        assert_eq!(outcome, DeleteOutcome::Failed);
        assert_eq!(
            view.feedback(),
            Some(&Feedback::Error("Error deleting student".to_string()))
        );
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn not_loaded_message_names_the_collection() {
        let err = SubmitError::NotLoaded("student roster");
        assert_eq!(err.user_message(), "student roster has not been loaded");
    }
}
