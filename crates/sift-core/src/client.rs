//! The controller set shared by every presentation surface

use std::sync::Arc;

use crate::analytics::AnalyticsLoader;
use crate::api::{HttpReceiptApi, ReceiptApi};
use crate::config::ClientConfig;
use crate::duplicates::DuplicateResolver;
use crate::error::Result;
use crate::listing::ReceiptListing;
use crate::notify::Notifier;
use crate::upload::UploadController;

/// Upload, duplicate review, listing and analytics over one service
///
/// The upload controller and the duplicate commands share one resolver, so
/// a duplicate flagged by an upload can be approved without naming its id.
pub struct SiftClient {
    pub upload: UploadController,
    pub duplicates: Arc<DuplicateResolver>,
    pub listing: ReceiptListing,
    pub analytics: AnalyticsLoader,
}

impl SiftClient {
    pub fn new(api: Arc<dyn ReceiptApi>, notifier: Arc<dyn Notifier>) -> Self {
        let duplicates = Arc::new(DuplicateResolver::new(api.clone(), notifier.clone()));
        Self {
            upload: UploadController::new(api.clone(), duplicates.clone(), notifier.clone()),
            listing: ReceiptListing::new(api.clone(), notifier.clone()),
            analytics: AnalyticsLoader::new(api, notifier),
            duplicates,
        }
    }

    /// Client talking HTTP to the configured service
    pub fn connect(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let api = HttpReceiptApi::new(config)?;
        Ok(Self::new(Arc::new(api), notifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockReceiptApi;
    use crate::models::{Receipt, ReceiptId, SelectedFile};
    use crate::notify::RecordingNotifier;
    use crate::upload::SubmitStatus;

    #[tokio::test]
    async fn test_flagged_upload_resolvable_without_id() {
        let api = MockReceiptApi::new();
        api.insert_receipt(Receipt {
            id: Some(ReceiptId::from(7)),
            ..Default::default()
        });
        api.push_submit(crate::api::SubmitResponse {
            id: Some(ReceiptId::from(8)),
            result: Receipt::default(),
            duplicate: true,
            duplicate_of: Some(ReceiptId::from(7)),
            status: None,
        });
        let client = SiftClient::new(Arc::new(api.clone()), Arc::new(RecordingNotifier::new()));

        let file = SelectedFile::from_bytes("r.pdf", "application/pdf", vec![1, 2, 3]).unwrap();
        client.upload.select_file(file);
        assert!(matches!(
            client.upload.submit().await.unwrap(),
            SubmitStatus::Completed(_)
        ));
        assert!(client.duplicates.has_pending_duplicate());

        client.duplicates.reject(None).await.unwrap();
        assert!(!client.duplicates.has_pending_duplicate());
        assert_eq!(
            api.stored(&ReceiptId::from(8)).unwrap().status,
            crate::models::ReceiptStatus::Rejected
        );
    }
}
