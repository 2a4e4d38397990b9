//! Processing service transport
//!
//! Every network call the client makes goes through the `ReceiptApi` trait.
//!
//! # Architecture
//!
//! - `ReceiptApi` trait: one async method per call of the HTTP contract
//! - `HttpReceiptApi`: reqwest implementation driven by `ClientConfig`
//! - `MockReceiptApi`: in-memory, scriptable, records every call
//!
//! # Usage
//!
//! ```rust,ignore
//! let api = HttpReceiptApi::new(ClientConfig::load(None)?)?;
//! let receipts = api.list_receipts().await?;
//! ```

mod http;
mod mock;

pub use http::HttpReceiptApi;
pub use mock::{ApiCall, MockFailure, MockReceiptApi};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analytics::insights::SpendingInsights;
use crate::error::Result;
use crate::models::{DuplicateContext, Receipt, ReceiptId, ReceiptStatus, SelectedFile};

/// Bytes handed to the transport so far for one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// `round(sent / total * 100)`, clamped to 0..=100
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.sent as f64 * 100.0 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Callback invoked for every upload progress event
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Response of the submit call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub id: Option<ReceiptId>,
    pub result: Receipt,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(default)]
    pub duplicate_of: Option<ReceiptId>,
    #[serde(default)]
    pub status: Option<ReceiptStatus>,
}

impl SubmitResponse {
    /// The stored receipt with envelope fields folded in (id, duplicate
    /// flag and reference, status)
    pub fn receipt(&self) -> Receipt {
        let mut receipt = self.result.clone();
        if receipt.id.is_none() {
            receipt.id = self.id.clone();
        }
        if self.duplicate {
            receipt.is_duplicate = true;
        }
        if receipt.duplicate_of.is_none() {
            receipt.duplicate_of = self.duplicate_of.clone();
        }
        if let Some(status) = self.status {
            receipt.status = status;
        }
        receipt
    }

    /// `(new receipt id, original id)` when the server flagged a duplicate
    /// and named the original
    pub fn duplicate_pair_ids(&self) -> Option<(ReceiptId, ReceiptId)> {
        let receipt = self.receipt();
        let original = receipt.duplicate_target()?.clone();
        let id = receipt.id?;
        Some((id, original))
    }
}

/// `{ result: Receipt }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEnvelope {
    pub result: Receipt,
}

/// Listing response: `{ receipts: [...] }`, `{ data: [...] }` or a bare array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReceiptListResponse {
    Bare(Vec<Receipt>),
    Wrapped {
        #[serde(alias = "data")]
        receipts: Vec<Receipt>,
    },
}

impl ReceiptListResponse {
    pub fn into_receipts(self) -> Vec<Receipt> {
        match self {
            Self::Bare(receipts) | Self::Wrapped { receipts } => receipts,
        }
    }
}

/// Response of approve/reject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// `{ ai_insights: {...} }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsEnvelope {
    #[serde(default)]
    pub ai_insights: Option<SpendingInsights>,
}

/// Interface to the receipt processing service
///
/// Implementations must be Send + Sync so one instance can be shared by
/// every controller.
#[async_trait]
pub trait ReceiptApi: Send + Sync {
    /// Upload a file for processing; `progress` fires as bytes are sent
    async fn submit(&self, file: &SelectedFile, progress: ProgressFn) -> Result<SubmitResponse>;

    /// Fetch the {original, duplicate} pair for a flagged receipt
    async fn duplicate_pair(&self, id: &ReceiptId) -> Result<DuplicateContext>;

    /// Fetch one receipt
    async fn receipt(&self, id: &ReceiptId) -> Result<Receipt>;

    /// Fetch every stored receipt, in server order
    async fn list_receipts(&self) -> Result<Vec<Receipt>>;

    async fn approve(&self, id: &ReceiptId) -> Result<ActionResponse>;

    async fn reject(&self, id: &ReceiptId) -> Result<ActionResponse>;

    /// Fetch narrative spending insights
    async fn spending_insights(&self) -> Result<SpendingInsights>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_percent_rounding() {
        let p = |sent, total| UploadProgress { sent, total }.percent();
        assert_eq!(p(0, 200), 0);
        assert_eq!(p(1, 200), 1); // 0.5 rounds up
        assert_eq!(p(199, 200), 100); // 99.5 rounds up
        assert_eq!(p(100, 300), 33);
        assert_eq!(p(300, 300), 100);
        assert_eq!(p(10, 0), 0);
    }

    #[test]
    fn test_submit_response_folds_envelope() {
        let resp: SubmitResponse = serde_json::from_value(json!({
            "id": 42,
            "result": { "merchant": "Corner Store", "total": "18.20" },
            "duplicate": true,
            "duplicate_of": 7,
            "status": "pending"
        }))
        .unwrap();

        let receipt = resp.receipt();
        assert_eq!(receipt.id, Some(ReceiptId::from(42)));
        assert!(receipt.is_duplicate);
        assert_eq!(receipt.duplicate_of, Some(ReceiptId::from(7)));
        assert_eq!(
            resp.duplicate_pair_ids(),
            Some((ReceiptId::from(42), ReceiptId::from(7)))
        );
    }

    #[test]
    fn test_submit_response_duplicate_without_reference() {
        let resp: SubmitResponse = serde_json::from_value(json!({
            "id": 42,
            "result": {},
            "duplicate": true,
            "duplicate_of": null
        }))
        .unwrap();
        assert!(resp.receipt().is_duplicate);
        assert_eq!(resp.duplicate_pair_ids(), None);
    }

    #[test]
    fn test_list_response_shapes() {
        let a: ReceiptListResponse =
            serde_json::from_value(json!({ "receipts": [{ "id": 1 }] })).unwrap();
        let b: ReceiptListResponse =
            serde_json::from_value(json!({ "data": [{ "id": 1 }, { "id": 2 }] })).unwrap();
        let c: ReceiptListResponse = serde_json::from_value(json!([{ "id": 3 }])).unwrap();
        assert_eq!(a.into_receipts().len(), 1);
        assert_eq!(b.into_receipts().len(), 2);
        assert_eq!(c.into_receipts()[0].id, Some(ReceiptId::from(3)));
    }
}
