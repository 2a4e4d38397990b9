//! Cached receipt listing for the admin view

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::api::ReceiptApi;
use crate::duplicates::ReviewAction;
use crate::error::{Error, Result};
use crate::models::{Receipt, ReceiptId, ReceiptStatus};
use crate::notify::{Notifier, Severity};

/// Snapshot of every stored receipt, in server order
///
/// A failed refresh leaves an empty list rather than an error; approve and
/// reject refresh the list after a successful decision.
pub struct ReceiptListing {
    api: Arc<dyn ReceiptApi>,
    notifier: Arc<dyn Notifier>,
    receipts: Mutex<Vec<Receipt>>,
}

impl ReceiptListing {
    pub fn new(api: Arc<dyn ReceiptApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            receipts: Mutex::new(Vec::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Vec<Receipt>> {
        self.receipts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the cache with the server's current list
    ///
    /// Returns the number of receipts loaded.
    pub async fn refresh(&self) -> usize {
        let receipts = match self.api.list_receipts().await {
            Ok(receipts) => receipts,
            Err(e) => {
                warn!(error = %e, "Failed to load receipts");
                Vec::new()
            }
        };
        debug!(count = receipts.len(), "Receipt listing refreshed");
        let count = receipts.len();
        *self.cache() = receipts;
        count
    }

    pub async fn approve(&self, id: Option<&ReceiptId>) -> Result<String> {
        self.resolve(id, ReviewAction::Approve).await
    }

    pub async fn reject(&self, id: Option<&ReceiptId>) -> Result<String> {
        self.resolve(id, ReviewAction::Reject).await
    }

    async fn resolve(&self, id: Option<&ReceiptId>, action: ReviewAction) -> Result<String> {
        let Some(id) = id else {
            let message = "Receipt has no id";
            self.notifier.notify(message, Severity::Warning);
            return Err(Error::validation(message));
        };
        let message = action
            .apply(self.api.as_ref(), self.notifier.as_ref(), id)
            .await?;
        self.refresh().await;
        Ok(message)
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.cache().clone()
    }

    pub fn get(&self, id: &ReceiptId) -> Option<Receipt> {
        self.cache()
            .iter()
            .find(|r| r.id.as_ref() == Some(id))
            .cloned()
    }

    pub fn with_status(&self, status: ReceiptStatus) -> Vec<Receipt> {
        self.cache()
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// Receipts awaiting a decision
    pub fn pending(&self) -> Vec<Receipt> {
        self.with_status(ReceiptStatus::Pending)
    }

    /// Receipts flagged as duplicates
    pub fn duplicates(&self) -> Vec<Receipt> {
        self.cache()
            .iter()
            .filter(|r| r.is_duplicate)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, MockFailure, MockReceiptApi, ReceiptListResponse};
    use crate::notify::RecordingNotifier;

    fn receipt(id: i64, merchant: &str) -> Receipt {
        Receipt {
            id: Some(ReceiptId::from(id)),
            merchant: Some(merchant.to_string()),
            ..Default::default()
        }
    }

    fn listing(api: &MockReceiptApi) -> (ReceiptListing, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        (
            ReceiptListing::new(Arc::new(api.clone()), notifier.clone()),
            notifier,
        )
    }

    #[tokio::test]
    async fn test_refresh_preserves_server_order() {
        let api = MockReceiptApi::with_receipts(vec![
            receipt(3, "Cafe"),
            receipt(1, "Fuel"),
            receipt(2, "Books"),
        ]);
        let (listing, _) = listing(&api);

        assert_eq!(listing.refresh().await, 3);
        let ids: Vec<String> = listing
            .receipts()
            .iter()
            .map(|r| r.id.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(
            listing.get(&ReceiptId::from(1)).unwrap().merchant.as_deref(),
            Some("Fuel")
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_degrades_to_empty() {
        let api = MockReceiptApi::with_receipts(vec![receipt(1, "Cafe")]);
        let (listing, notifier) = listing(&api);
        listing.refresh().await;
        assert_eq!(listing.len(), 1);

        api.fail_list(MockFailure::Bare(500));
        assert_eq!(listing.refresh().await, 0);
        assert!(listing.is_empty());
        assert!(notifier.entries().is_empty());
    }

    #[tokio::test]
    async fn test_approve_refreshes() {
        let api = MockReceiptApi::with_receipts(vec![receipt(1, "Cafe"), receipt(2, "Fuel")]);
        let (listing, _) = listing(&api);
        listing.refresh().await;
        assert_eq!(listing.pending().len(), 2);

        listing.approve(Some(&ReceiptId::from(1))).await.unwrap();
        assert_eq!(listing.pending().len(), 1);
        assert_eq!(listing.with_status(ReceiptStatus::Approved).len(), 1);
        assert_eq!(
            api.calls(),
            vec![ApiCall::List, ApiCall::Approve(ReceiptId::from(1)), ApiCall::List]
        );
    }

    #[tokio::test]
    async fn test_failed_reject_keeps_stale_row() {
        let api = MockReceiptApi::with_receipts(vec![receipt(1, "Cafe")]);
        let (listing, notifier) = listing(&api);
        listing.refresh().await;
        api.fail_actions(MockFailure::Status(500, "database locked".into()));

        assert!(listing.reject(Some(&ReceiptId::from(1))).await.is_err());
        assert_eq!(listing.pending().len(), 1);
        assert_eq!(
            notifier.last().unwrap().message,
            "Failed to reject receipt: database locked"
        );
        // No refresh after a failed action
        assert_eq!(api.calls().iter().filter(|c| **c == ApiCall::List).count(), 1);
    }

    #[tokio::test]
    async fn test_row_without_id() {
        let api = MockReceiptApi::new();
        let (listing, _) = listing(&api);

        let err = listing.approve(None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_capitalised_status_rows_survive() {
        let body: ReceiptListResponse = serde_json::from_value(serde_json::json!({
            "receipts": [
                { "id": 1, "merchant": "Cafe", "status": "Approved" },
                { "id": 2, "merchant": "Fuel", "status": "PENDING" },
                { "id": 3, "merchant": "Books", "status": "on_hold" }
            ]
        }))
        .unwrap();
        let api = MockReceiptApi::with_receipts(body.into_receipts());
        let (listing, _) = listing(&api);

        assert_eq!(listing.refresh().await, 3);
        assert_eq!(listing.with_status(ReceiptStatus::Approved).len(), 1);
        assert_eq!(listing.pending().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_filter() {
        let mut dup = receipt(2, "Cafe");
        dup.is_duplicate = true;
        dup.duplicate_of = Some(ReceiptId::from(1));
        let api = MockReceiptApi::with_receipts(vec![receipt(1, "Cafe"), dup]);
        let (listing, _) = listing(&api);
        listing.refresh().await;

        let duplicates = listing.duplicates();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].id, Some(ReceiptId::from(2)));
    }
}
