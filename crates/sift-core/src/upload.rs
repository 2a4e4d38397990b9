//! Upload session controller
//!
//! One receipt upload at a time, driven through an explicit state machine:
//!
//! ```text
//! Idle ──select──▶ FileSelected ──submit──▶ Submitting ──▶ Succeeded
//!   ▲                   ▲                        │    └──▶ Failed
//!   └──────reset────────┴──────select/reset──────┴─────────────┘
//! ```
//!
//! Submission runs as two typed stages: the upload itself, then (only for
//! a flagged duplicate) the pair/original lookup. State lives behind a
//! mutex that is never held across an await, so selection and observers
//! stay usable while a request is outstanding.
//!
//! Every selection starts a new session generation. A response that comes
//! back for an older generation is discarded.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ProgressFn, ReceiptApi, SubmitResponse, UploadProgress};
use crate::duplicates::{DuplicateLookup, DuplicateResolver};
use crate::error::{Error, Result};
use crate::models::{Receipt, SelectedFile};
use crate::notify::{Notifier, Severity};

const NO_FILE_MESSAGE: &str = "Choose a file first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    FileSelected,
    Submitting,
    Succeeded,
    Failed,
}

impl UploadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FileSelected => "file_selected",
            Self::Submitting => "submitting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Outcome of `select_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected,
    /// A submission is in flight; the file is installed once it settles
    Deferred,
}

/// Result of a completed submission
#[derive(Debug)]
pub struct SubmitOutcome {
    pub receipt: Receipt,
    /// Present when the receipt was flagged as a duplicate of a known one
    pub duplicate: Option<DuplicateLookup>,
}

#[derive(Debug)]
pub enum SubmitStatus {
    Completed(SubmitOutcome),
    /// Another submission is still running; nothing was sent
    AlreadyInFlight,
    /// The session was abandoned by a new selection; the response was dropped
    Discarded,
}

#[derive(Debug, Default)]
struct Session {
    phase: UploadPhase,
    generation: u64,
    file: Option<SelectedFile>,
    deferred: Option<SelectedFile>,
    result: Option<Receipt>,
    is_duplicate: bool,
    error: Option<String>,
}

/// Raise the published percentage; it never goes down within a session
fn raise_progress(tx: &watch::Sender<u8>, percent: u8) {
    tx.send_if_modified(|current| {
        if percent > *current {
            *current = percent;
            true
        } else {
            false
        }
    });
}

pub struct UploadController {
    api: Arc<dyn ReceiptApi>,
    duplicates: Arc<DuplicateResolver>,
    notifier: Arc<dyn Notifier>,
    session: Arc<Mutex<Session>>,
    progress: Arc<watch::Sender<u8>>,
}

impl UploadController {
    pub fn new(
        api: Arc<dyn ReceiptApi>,
        duplicates: Arc<DuplicateResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            api,
            duplicates,
            notifier,
            session: Arc::new(Mutex::new(Session::default())),
            progress: Arc::new(progress),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset_progress(&self) {
        self.progress.send_replace(0);
    }

    /// Choose the file for the next submission
    ///
    /// Clears the previous result, duplicate context and progress. While a
    /// submission is in flight the file is held back and the running
    /// session is abandoned.
    pub fn select_file(&self, file: SelectedFile) -> Selection {
        let mut session = self.session();
        session.generation += 1;
        let generation = session.generation;

        if session.phase == UploadPhase::Submitting {
            info!(session = generation, file = file.name(), "Selection deferred until upload settles");
            session.deferred = Some(file);
            return Selection::Deferred;
        }

        info!(session = generation, file = file.name(), "File selected");
        session.phase = UploadPhase::FileSelected;
        session.file = Some(file);
        session.deferred = None;
        session.result = None;
        session.is_duplicate = false;
        session.error = None;
        drop(session);

        self.duplicates.clear();
        self.reset_progress();
        Selection::Selected
    }

    /// Return to `Idle`, dropping the file and result
    ///
    /// Has no effect while a submission is in flight; returns whether the
    /// controller was reset.
    pub fn reset(&self) -> bool {
        let mut session = self.session();
        if session.phase == UploadPhase::Submitting {
            debug!("Reset ignored while submitting");
            return false;
        }
        let generation = session.generation + 1;
        *session = Session {
            generation,
            ..Session::default()
        };
        drop(session);

        self.duplicates.clear();
        self.reset_progress();
        true
    }

    /// Upload the selected file
    ///
    /// Without a selection this warns the user and returns a validation
    /// error. A call made while another submission is running returns
    /// `AlreadyInFlight` without touching the network.
    pub async fn submit(&self) -> Result<SubmitStatus> {
        let (file, generation) = {
            let mut session = self.session();
            match (session.phase, session.file.clone()) {
                (UploadPhase::Submitting, _) => {
                    debug!(session = session.generation, "Submit ignored, upload in flight");
                    return Ok(SubmitStatus::AlreadyInFlight);
                }
                (UploadPhase::FileSelected, Some(file)) => {
                    session.phase = UploadPhase::Submitting;
                    session.error = None;
                    (file, session.generation)
                }
                _ => {
                    drop(session);
                    self.notifier.notify(NO_FILE_MESSAGE, Severity::Warning);
                    return Err(Error::validation(NO_FILE_MESSAGE));
                }
            }
        };

        self.reset_progress();
        info!(session = generation, file = file.name(), bytes = file.len(), "Submitting receipt");

        // Stage 1: upload
        let submitted = self.api.submit(&file, self.progress_callback(generation)).await;
        if !self.is_current(generation) {
            return Ok(self.settle_abandoned(generation));
        }
        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                self.fail(generation, &e);
                return Err(e);
            }
        };
        let receipt = self.store_result(&response);

        // Stage 2: duplicate lookup, only for a flagged receipt with a known original
        let duplicate = match response.duplicate_pair_ids() {
            Some((id, original_id)) => Some(self.duplicates.lookup(&id, &original_id).await),
            None => None,
        };
        if !self.is_current(generation) {
            self.duplicates.clear();
            return Ok(self.settle_abandoned(generation));
        }

        self.session().phase = UploadPhase::Succeeded;
        info!(
            session = generation,
            receipt_id = %receipt.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            duplicate = receipt.is_duplicate,
            "Receipt processed"
        );
        Ok(SubmitStatus::Completed(SubmitOutcome { receipt, duplicate }))
    }

    fn progress_callback(&self, generation: u64) -> ProgressFn {
        let session = Arc::clone(&self.session);
        let tx = Arc::clone(&self.progress);
        Arc::new(move |p: UploadProgress| {
            let current = session
                .lock()
                .map(|s| s.generation == generation)
                .unwrap_or(false);
            if current {
                raise_progress(&tx, p.percent());
            }
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session().generation == generation
    }

    fn store_result(&self, response: &SubmitResponse) -> Receipt {
        let receipt = response.receipt();
        let mut session = self.session();
        session.is_duplicate = receipt.is_duplicate;
        session.result = Some(receipt.clone());
        drop(session);
        self.progress.send_replace(100);
        receipt
    }

    fn fail(&self, generation: u64, error: &Error) {
        let message = error.user_message();
        warn!(session = generation, error = %error, "Receipt submission failed");
        {
            let mut session = self.session();
            session.phase = UploadPhase::Failed;
            session.error = Some(message.clone());
        }
        self.notifier
            .notify(&format!("Error: {}", message), Severity::Error);
    }

    /// Drop the response of an abandoned session and install the deferred
    /// file, if any
    fn settle_abandoned(&self, generation: u64) -> SubmitStatus {
        warn!(session = generation, "Discarding response from abandoned upload session");
        let mut session = self.session();
        session.result = None;
        session.is_duplicate = false;
        session.error = None;
        match session.deferred.take() {
            Some(file) => {
                session.file = Some(file);
                session.phase = UploadPhase::FileSelected;
            }
            None => {
                session.file = None;
                session.phase = UploadPhase::Idle;
            }
        }
        drop(session);
        self.reset_progress();
        SubmitStatus::Discarded
    }

    pub fn phase(&self) -> UploadPhase {
        self.session().phase
    }

    /// Upload progress of the current session, 0..=100
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn selected_file(&self) -> Option<SelectedFile> {
        self.session().file.clone()
    }

    pub fn last_result(&self) -> Option<Receipt> {
        self.session().result.clone()
    }

    pub fn is_duplicate(&self) -> bool {
        self.session().is_duplicate
    }

    /// Message of the last failed submission
    pub fn last_error(&self) -> Option<String> {
        self.session().error.clone()
    }

    pub fn duplicates(&self) -> &Arc<DuplicateResolver> {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, MockFailure, MockReceiptApi};
    use crate::models::{ReceiptId, ReceiptStatus};
    use crate::notify::RecordingNotifier;

    fn file(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, "image/png", vec![7; 1000]).unwrap()
    }

    fn controller(api: &MockReceiptApi) -> (UploadController, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let api: Arc<dyn ReceiptApi> = Arc::new(api.clone());
        let duplicates = Arc::new(DuplicateResolver::new(api.clone(), notifier.clone()));
        (
            UploadController::new(api, duplicates, notifier.clone()),
            notifier,
        )
    }

    fn flagged_response() -> SubmitResponse {
        SubmitResponse {
            id: Some(ReceiptId::from(42)),
            result: Receipt {
                merchant: Some("Corner Store".into()),
                ..Default::default()
            },
            duplicate: true,
            duplicate_of: Some(ReceiptId::from(7)),
            status: Some(ReceiptStatus::Pending),
        }
    }

    #[tokio::test]
    async fn test_submit_without_file_warns() {
        let api = MockReceiptApi::new();
        let (upload, notifier) = controller(&api);

        let err = upload.submit().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(notifier.with_severity(Severity::Warning), vec!["Choose a file first"]);
        assert_eq!(upload.phase(), UploadPhase::Idle);
        assert_eq!(api.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_submit() {
        let api = MockReceiptApi::new();
        let (upload, notifier) = controller(&api);

        assert_eq!(upload.select_file(file("a.png")), Selection::Selected);
        assert_eq!(upload.phase(), UploadPhase::FileSelected);

        let outcome = match upload.submit().await.unwrap() {
            SubmitStatus::Completed(outcome) => outcome,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(outcome.receipt.merchant.as_deref(), Some("a.png"));
        assert!(outcome.duplicate.is_none());
        assert_eq!(upload.phase(), UploadPhase::Succeeded);
        assert_eq!(upload.progress(), 100);
        assert!(!upload.is_duplicate());
        assert!(upload.last_result().is_some());
        assert!(notifier.entries().is_empty());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let api = MockReceiptApi::new();
        api.set_progress_events(vec![
            UploadProgress { sent: 300, total: 1000 },
            UploadProgress { sent: 100, total: 1000 },
            UploadProgress { sent: 700, total: 1000 },
        ]);
        let (upload, _) = controller(&api);
        let mut rx = upload.watch_progress();
        let seen = Arc::new(Mutex::new(vec![*rx.borrow()]));
        let sink = seen.clone();
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                sink.lock().unwrap().push(*rx.borrow_and_update());
            }
        });

        upload.select_file(file("a.png"));
        upload.submit().await.unwrap();
        drop(upload);
        watcher.await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&100));
        assert!(!seen.contains(&10));
        assert!(seen.windows(2).all(|w| w[0] <= w[1] || w[1] == 0));
    }

    #[tokio::test]
    async fn test_failure_notifies_with_server_detail() {
        let api = MockReceiptApi::new();
        api.push_submit_failure(MockFailure::Status(422, "Unreadable receipt".into()));
        let (upload, notifier) = controller(&api);

        upload.select_file(file("a.png"));
        let err = upload.submit().await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 422, .. }));
        assert_eq!(upload.phase(), UploadPhase::Failed);
        assert_eq!(upload.last_error().as_deref(), Some("Unreadable receipt"));
        assert_eq!(
            notifier.with_severity(Severity::Error),
            vec!["Error: Unreadable receipt"]
        );

        // No retry: a terminal phase needs a new selection
        assert!(upload.submit().await.is_err());
        assert_eq!(api.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_its_own_category() {
        let api = MockReceiptApi::new();
        api.push_submit_failure(MockFailure::Timeout);
        let (upload, _) = controller(&api);

        upload.select_file(file("a.png"));
        let err = upload.submit().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
        assert_eq!(upload.phase(), UploadPhase::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_triggers_lookup_in_order() {
        let api = MockReceiptApi::new();
        api.insert_receipt(Receipt {
            id: Some(ReceiptId::from(7)),
            merchant: Some("Corner Store".into()),
            ..Default::default()
        });
        api.push_submit(flagged_response());
        let (upload, _) = controller(&api);

        upload.select_file(file("dup.png"));
        let outcome = match upload.submit().await.unwrap() {
            SubmitStatus::Completed(outcome) => outcome,
            other => panic!("expected completion, got {:?}", other),
        };

        let lookup = outcome.duplicate.expect("lookup should run");
        assert!(lookup.is_complete());
        assert!(upload.is_duplicate());
        assert_eq!(
            api.calls(),
            vec![
                ApiCall::Submit("dup.png".into()),
                ApiCall::DuplicatePair(ReceiptId::from(42)),
                ApiCall::Receipt(ReceiptId::from(7)),
            ]
        );
        assert!(upload.duplicates().has_pending_duplicate());
    }

    #[tokio::test]
    async fn test_duplicate_lookup_failure_keeps_result() {
        let api = MockReceiptApi::new();
        api.push_submit(flagged_response());
        api.fail_duplicate_pair(MockFailure::Bare(500));
        api.fail_receipt(MockFailure::Bare(500));
        let (upload, notifier) = controller(&api);

        upload.select_file(file("dup.png"));
        upload.submit().await.unwrap();

        assert_eq!(upload.phase(), UploadPhase::Succeeded);
        assert!(upload.last_result().is_some());
        assert_eq!(notifier.with_severity(Severity::Warning).len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_without_reference_skips_lookup() {
        let api = MockReceiptApi::new();
        let mut response = flagged_response();
        response.duplicate_of = None;
        api.push_submit(response);
        let (upload, _) = controller(&api);

        upload.select_file(file("dup.png"));
        upload.submit().await.unwrap();

        assert!(upload.is_duplicate());
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_noop() {
        let api = MockReceiptApi::new();
        let gate = api.gate_submissions();
        let (upload, _) = controller(&api);
        upload.select_file(file("a.png"));

        let (first, second) = tokio::join!(upload.submit(), async {
            tokio::task::yield_now().await;
            assert_eq!(upload.phase(), UploadPhase::Submitting);
            let status = upload.submit().await;
            gate.notify_one();
            status
        });

        assert!(matches!(first.unwrap(), SubmitStatus::Completed(_)));
        assert!(matches!(second.unwrap(), SubmitStatus::AlreadyInFlight));
        assert_eq!(api.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_selection_during_submit_is_deferred() {
        let api = MockReceiptApi::new();
        let gate = api.gate_submissions();
        let (upload, _) = controller(&api);
        upload.select_file(file("first.png"));

        let (status, selection) = tokio::join!(upload.submit(), async {
            tokio::task::yield_now().await;
            let selection = upload.select_file(file("second.png"));
            gate.notify_one();
            selection
        });

        assert_eq!(selection, Selection::Deferred);
        assert!(matches!(status.unwrap(), SubmitStatus::Discarded));
        assert_eq!(upload.phase(), UploadPhase::FileSelected);
        assert_eq!(upload.selected_file().unwrap().name(), "second.png");
        assert!(upload.last_result().is_none());
        assert_eq!(upload.progress(), 0);
    }

    #[tokio::test]
    async fn test_reselect_clears_previous_result() {
        let api = MockReceiptApi::new();
        api.push_submit(flagged_response());
        let (upload, _) = controller(&api);

        upload.select_file(file("a.png"));
        upload.submit().await.unwrap();
        assert!(upload.is_duplicate());

        upload.select_file(file("b.png"));
        assert_eq!(upload.phase(), UploadPhase::FileSelected);
        assert!(upload.last_result().is_none());
        assert!(!upload.is_duplicate());
        assert_eq!(upload.progress(), 0);
        assert!(!upload.duplicates().has_pending_duplicate());
    }

    #[tokio::test]
    async fn test_reset() {
        let api = MockReceiptApi::new();
        let (upload, _) = controller(&api);

        upload.select_file(file("a.png"));
        upload.submit().await.unwrap();
        assert!(upload.reset());
        assert_eq!(upload.phase(), UploadPhase::Idle);
        assert!(upload.selected_file().is_none());
        assert!(upload.last_result().is_none());
    }
}
