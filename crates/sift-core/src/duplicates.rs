//! Duplicate resolution
//!
//! When an upload is flagged as a duplicate the resolver loads the
//! {original, duplicate} pair and the original's detail, and lets an admin
//! approve or reject the new receipt. Lookup failures are degraded: they
//! are reported and logged but never undo the stored upload result.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::api::ReceiptApi;
use crate::error::{Error, Result};
use crate::models::{DuplicateContext, Receipt, ReceiptId};
use crate::notify::{Notifier, Severity};

/// Admin decision on a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    /// Used when the server response carries no message
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Approve => "Receipt approved",
            Self::Reject => "Receipt rejected",
        }
    }

    /// Rejection is confirmed with error styling
    pub fn success_severity(&self) -> Severity {
        match self {
            Self::Approve => Severity::Success,
            Self::Reject => Severity::Error,
        }
    }

    /// Send the decision and report the outcome
    ///
    /// Returns the confirmation message. Failures are reported with Error
    /// severity and returned unchanged.
    pub async fn apply(
        &self,
        api: &dyn ReceiptApi,
        notifier: &dyn Notifier,
        id: &ReceiptId,
    ) -> Result<String> {
        let response = match self {
            Self::Approve => api.approve(id).await,
            Self::Reject => api.reject(id).await,
        };
        match response {
            Ok(response) => {
                let message = response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.default_message().to_string());
                info!(receipt_id = %id, action = self.as_str(), "Receipt resolved");
                notifier.notify(&message, self.success_severity());
                Ok(message)
            }
            Err(e) => {
                warn!(receipt_id = %id, action = self.as_str(), error = %e, "Review action failed");
                notifier.notify(
                    &format!("Failed to {} receipt: {}", self.as_str(), e.user_message()),
                    Severity::Error,
                );
                Err(e)
            }
        }
    }
}

/// Outcome of the two lookups issued for a flagged upload
#[derive(Debug)]
pub struct DuplicateLookup {
    pub pair: Result<DuplicateContext>,
    pub original: Result<Receipt>,
}

impl DuplicateLookup {
    pub fn is_complete(&self) -> bool {
        self.pair.is_ok() && self.original.is_ok()
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    pending: Option<ReceiptId>,
    context: Option<DuplicateContext>,
    original: Option<Receipt>,
}

/// Holds the duplicate under review and applies admin decisions
pub struct DuplicateResolver {
    api: Arc<dyn ReceiptApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ResolverState>,
}

impl DuplicateResolver {
    pub fn new(api: Arc<dyn ReceiptApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(ResolverState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the {original, duplicate} pair for a flagged receipt
    pub async fn load_pair(&self, receipt_id: &ReceiptId) -> Result<DuplicateContext> {
        self.state().pending = Some(receipt_id.clone());
        match self.api.duplicate_pair(receipt_id).await {
            Ok(context) => {
                self.state().context = Some(context.clone());
                Ok(context)
            }
            Err(e) => {
                warn!(receipt_id = %receipt_id, error = %e, "Could not load duplicate pair");
                self.notifier.notify(
                    &format!("Could not load duplicate comparison: {}", e.user_message()),
                    Severity::Warning,
                );
                Err(e)
            }
        }
    }

    /// Fetch the detail of the receipt a duplicate points at
    pub async fn load_original(&self, original_id: &ReceiptId) -> Result<Receipt> {
        match self.api.receipt(original_id).await {
            Ok(original) => {
                self.state().original = Some(original.clone());
                Ok(original)
            }
            Err(e) => {
                warn!(receipt_id = %original_id, error = %e, "Could not load original receipt");
                self.notifier.notify(
                    &format!("Could not load original receipt: {}", e.user_message()),
                    Severity::Warning,
                );
                Err(e)
            }
        }
    }

    /// Load pair and original concurrently, pair request first
    pub async fn lookup(&self, receipt_id: &ReceiptId, original_id: &ReceiptId) -> DuplicateLookup {
        info!(receipt_id = %receipt_id, original_id = %original_id, "Duplicate detected");
        let (pair, original) =
            tokio::join!(self.load_pair(receipt_id), self.load_original(original_id));
        DuplicateLookup { pair, original }
    }

    /// Approve a receipt; `None` means the duplicate under review
    pub async fn approve(&self, receipt_id: Option<&ReceiptId>) -> Result<String> {
        self.resolve(receipt_id, ReviewAction::Approve).await
    }

    /// Reject a receipt; `None` means the duplicate under review
    pub async fn reject(&self, receipt_id: Option<&ReceiptId>) -> Result<String> {
        self.resolve(receipt_id, ReviewAction::Reject).await
    }

    async fn resolve(&self, receipt_id: Option<&ReceiptId>, action: ReviewAction) -> Result<String> {
        let id = match receipt_id.cloned().or_else(|| self.current_id()) {
            Some(id) => id,
            None => {
                let message = "No receipt selected for review";
                self.notifier.notify(message, Severity::Warning);
                return Err(Error::validation(message));
            }
        };

        let message = action
            .apply(self.api.as_ref(), self.notifier.as_ref(), &id)
            .await?;
        // Only resolving the receipt under review releases it
        if self.current_id().as_ref() == Some(&id) {
            self.clear();
        }
        Ok(message)
    }

    /// Id of the duplicate under review
    fn current_id(&self) -> Option<ReceiptId> {
        let state = self.state();
        state
            .context
            .as_ref()
            .and_then(|c| c.duplicate.id.clone())
            .or_else(|| state.pending.clone())
    }

    pub fn context(&self) -> Option<DuplicateContext> {
        self.state().context.clone()
    }

    pub fn original(&self) -> Option<Receipt> {
        self.state().original.clone()
    }

    /// A flagged upload is awaiting a decision
    pub fn has_pending_duplicate(&self) -> bool {
        self.state().pending.is_some()
    }

    pub fn clear(&self) {
        *self.state() = ResolverState::default();
    }
}
