//! Fetches what the analytics view needs and keeps the last snapshot

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::api::ReceiptApi;
use crate::error::Result;
use crate::models::Receipt;
use crate::notify::{Notifier, Severity};

use super::{compute, InsightState, SpendingBreakdown};

/// Everything the analytics view renders
#[derive(Debug, Clone)]
pub struct AnalyticsView {
    pub receipts: Vec<Receipt>,
    pub breakdown: SpendingBreakdown,
    pub insights: InsightState,
}

/// Loads receipts and insights for the analytics view
///
/// Holds its own receipt snapshot, independent of the listing cache.
pub struct AnalyticsLoader {
    api: Arc<dyn ReceiptApi>,
    notifier: Arc<dyn Notifier>,
    include_insights: bool,
    latest: Mutex<Option<AnalyticsView>>,
}

impl AnalyticsLoader {
    pub fn new(api: Arc<dyn ReceiptApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            include_insights: true,
            latest: Mutex::new(None),
        }
    }

    /// Skip the insights call entirely
    pub fn without_insights(mut self) -> Self {
        self.include_insights = false;
        self
    }

    /// Fetch receipts and insights concurrently and build the view
    ///
    /// A receipt fetch failure fails the load. An insight failure only
    /// marks the insight section unavailable.
    pub async fn load(&self) -> Result<AnalyticsView> {
        self.load_with(self.include_insights).await
    }

    /// `load`, choosing per call whether to fetch insights
    pub async fn load_with(&self, include_insights: bool) -> Result<AnalyticsView> {
        let (receipts, insights) = if include_insights {
            let (receipts, insights) =
                tokio::join!(self.api.list_receipts(), self.api.spending_insights());
            (receipts, Some(insights))
        } else {
            (self.api.list_receipts().await, None)
        };

        let receipts = match receipts {
            Ok(receipts) => receipts,
            Err(e) => {
                self.notifier.notify(
                    &format!("Failed to load analytics: {}", e.user_message()),
                    Severity::Error,
                );
                return Err(e);
            }
        };

        let insights = match insights {
            Some(result) => {
                if let Err(e) = &result {
                    warn!(error = %e, "Spending insights unavailable");
                }
                InsightState::from_result(result)
            }
            None => InsightState::Skipped,
        };

        let breakdown = compute(&receipts);
        info!(
            receipts = breakdown.receipt_count,
            categories = breakdown.categories.len(),
            "Analytics loaded"
        );

        let view = AnalyticsView {
            receipts,
            breakdown,
            insights,
        };
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(view.clone());
        }
        Ok(view)
    }

    /// Last successfully loaded view
    pub fn latest(&self) -> Option<AnalyticsView> {
        self.latest.lock().ok().and_then(|v| v.clone())
    }
}
