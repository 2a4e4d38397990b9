//! In-memory processing service for testing
//!
//! Behaves like the real service for the happy path (stores submitted
//! receipts, enforces terminal status on approve/reject) and can be
//! scripted to return specific responses or failures per call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::analytics::insights::SpendingInsights;
use crate::error::{Error, Result};
use crate::models::{DuplicateContext, Receipt, ReceiptId, ReceiptStatus, SelectedFile};

use super::{ActionResponse, ProgressFn, ReceiptApi, SubmitResponse, UploadProgress};

/// A recorded call, in the order calls were issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Submit(String),
    DuplicatePair(ReceiptId),
    Receipt(ReceiptId),
    List,
    Approve(ReceiptId),
    Reject(ReceiptId),
    Insights,
}

/// Failure to script for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Non-2xx with a `detail` message
    Status(u16, String),
    Timeout,
    /// Non-2xx without a `detail` field
    Bare(u16),
}

impl MockFailure {
    fn to_error(&self) -> Error {
        match self {
            Self::Status(status, detail) => Error::Api {
                status: *status,
                detail: detail.clone(),
            },
            Self::Bare(status) => Error::Api {
                status: *status,
                detail: format!("Request failed with status code {}", status),
            },
            Self::Timeout => Error::Timeout("mock request did not complete in time".into()),
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<ApiCall>,
    receipts: Vec<Receipt>,
    next_id: i64,
    submit_script: VecDeque<std::result::Result<SubmitResponse, MockFailure>>,
    progress_script: Option<Vec<UploadProgress>>,
    pair_failure: Option<MockFailure>,
    receipt_failure: Option<MockFailure>,
    list_failure: Option<MockFailure>,
    action_failure: Option<MockFailure>,
    omit_action_messages: bool,
    insights: Option<std::result::Result<SpendingInsights, MockFailure>>,
}

/// Mock processing service
///
/// Cloning shares state, so a test can keep a handle while controllers
/// own another.
#[derive(Clone, Default)]
pub struct MockReceiptApi {
    state: Arc<Mutex<MockState>>,
    submit_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockReceiptApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state().next_id = 1;
        api
    }

    /// Mock pre-loaded with stored receipts
    pub fn with_receipts(receipts: Vec<Receipt>) -> Self {
        let api = Self::new();
        for receipt in receipts {
            api.insert_receipt(receipt);
        }
        api
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a receipt; receipts without an id get the next free one
    pub fn insert_receipt(&self, mut receipt: Receipt) -> ReceiptId {
        let mut state = self.state();
        let id = match receipt.id.clone() {
            Some(id) => id,
            None => {
                let id = ReceiptId::from(state.next_id);
                receipt.id = Some(id.clone());
                id
            }
        };
        if let Ok(n) = id.as_str().parse::<i64>() {
            state.next_id = state.next_id.max(n + 1);
        }
        state.receipts.retain(|r| r.id.as_ref() != Some(&id));
        state.receipts.push(receipt);
        id
    }

    /// Queue a response for the next submit call
    pub fn push_submit(&self, response: SubmitResponse) {
        self.state().submit_script.push_back(Ok(response));
    }

    /// Queue a failure for the next submit call
    pub fn push_submit_failure(&self, failure: MockFailure) {
        self.state().submit_script.push_back(Err(failure));
    }

    /// Replace the default progress events (quarters of the file)
    pub fn set_progress_events(&self, events: Vec<UploadProgress>) {
        self.state().progress_script = Some(events);
    }

    /// Hold every submit until the returned handle is notified
    pub fn gate_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(gate.clone());
        gate
    }

    pub fn fail_duplicate_pair(&self, failure: MockFailure) {
        self.state().pair_failure = Some(failure);
    }

    pub fn fail_receipt(&self, failure: MockFailure) {
        self.state().receipt_failure = Some(failure);
    }

    pub fn fail_list(&self, failure: MockFailure) {
        self.state().list_failure = Some(failure);
    }

    /// Make approve and reject fail
    pub fn fail_actions(&self, failure: MockFailure) {
        self.state().action_failure = Some(failure);
    }

    /// Answer approve/reject with an empty body
    pub fn omit_action_messages(&self) {
        self.state().omit_action_messages = true;
    }

    /// Clear every scripted failure
    pub fn heal(&self) {
        let mut state = self.state();
        state.pair_failure = None;
        state.receipt_failure = None;
        state.list_failure = None;
        state.action_failure = None;
    }

    pub fn set_insights(&self, insights: SpendingInsights) {
        self.state().insights = Some(Ok(insights));
    }

    pub fn fail_insights(&self, failure: MockFailure) {
        self.state().insights = Some(Err(failure));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Submit(_)))
            .count()
    }

    pub fn stored(&self, id: &ReceiptId) -> Option<Receipt> {
        self.state()
            .receipts
            .iter()
            .find(|r| r.id.as_ref() == Some(id))
            .cloned()
    }

    fn record(&self, call: ApiCall) {
        self.state().calls.push(call);
    }

    fn resolve(&self, id: &ReceiptId, status: ReceiptStatus) -> Result<ActionResponse> {
        let mut state = self.state();
        if let Some(failure) = &state.action_failure {
            return Err(failure.to_error());
        }
        let receipt = state
            .receipts
            .iter_mut()
            .find(|r| r.id.as_ref() == Some(id))
            .ok_or_else(|| Error::Api {
                status: 404,
                detail: format!("Receipt {} not found", id),
            })?;
        if receipt.status.is_terminal() {
            return Err(Error::Api {
                status: 409,
                detail: format!("Receipt {} is already {}", id, receipt.status.as_str()),
            });
        }
        receipt.status = status;
        if state.omit_action_messages {
            return Ok(ActionResponse::default());
        }
        Ok(ActionResponse {
            message: Some(format!("Receipt {} {}", id, status.as_str())),
        })
    }
}

#[async_trait]
impl ReceiptApi for MockReceiptApi {
    async fn submit(&self, file: &SelectedFile, progress: ProgressFn) -> Result<SubmitResponse> {
        self.record(ApiCall::Submit(file.name().to_string()));

        let total = file.len() as u64;
        let events = self.state().progress_script.clone().unwrap_or_else(|| {
            (1..=4)
                .map(|q| UploadProgress {
                    sent: total * q / 4,
                    total,
                })
                .collect()
        });
        for event in events {
            progress(event);
        }

        let gate = self
            .submit_gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.state().submit_script.pop_front();
        match scripted {
            Some(Ok(response)) => {
                self.insert_receipt(response.receipt());
                Ok(response)
            }
            Some(Err(failure)) => Err(failure.to_error()),
            None => {
                let receipt = Receipt {
                    merchant: Some(file.name().to_string()),
                    ..Default::default()
                };
                let id = self.insert_receipt(receipt.clone());
                Ok(SubmitResponse {
                    id: Some(id),
                    result: receipt,
                    duplicate: false,
                    duplicate_of: None,
                    status: Some(ReceiptStatus::Pending),
                })
            }
        }
    }

    async fn duplicate_pair(&self, id: &ReceiptId) -> Result<DuplicateContext> {
        self.record(ApiCall::DuplicatePair(id.clone()));
        if let Some(failure) = &self.state().pair_failure {
            return Err(failure.to_error());
        }
        let duplicate = self.stored(id).ok_or_else(|| Error::Api {
            status: 404,
            detail: format!("Receipt {} not found", id),
        })?;
        let original_id = duplicate.duplicate_of.clone().ok_or_else(|| Error::Api {
            status: 404,
            detail: format!("Receipt {} is not a duplicate", id),
        })?;
        let original = self.stored(&original_id).ok_or_else(|| Error::Api {
            status: 404,
            detail: format!("Original receipt {} not found", original_id),
        })?;
        Ok(DuplicateContext {
            original,
            duplicate,
        })
    }

    async fn receipt(&self, id: &ReceiptId) -> Result<Receipt> {
        self.record(ApiCall::Receipt(id.clone()));
        if let Some(failure) = &self.state().receipt_failure {
            return Err(failure.to_error());
        }
        self.stored(id).ok_or_else(|| Error::Api {
            status: 404,
            detail: format!("Receipt {} not found", id),
        })
    }

    async fn list_receipts(&self) -> Result<Vec<Receipt>> {
        self.record(ApiCall::List);
        let state = self.state();
        match &state.list_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(state.receipts.clone()),
        }
    }

    async fn approve(&self, id: &ReceiptId) -> Result<ActionResponse> {
        self.record(ApiCall::Approve(id.clone()));
        self.resolve(id, ReceiptStatus::Approved)
    }

    async fn reject(&self, id: &ReceiptId) -> Result<ActionResponse> {
        self.record(ApiCall::Reject(id.clone()));
        self.resolve(id, ReceiptStatus::Rejected)
    }

    async fn spending_insights(&self) -> Result<SpendingInsights> {
        self.record(ApiCall::Insights);
        match &self.state().insights {
            Some(Ok(insights)) => Ok(insights.clone()),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(SpendingInsights::default()),
        }
    }
}
