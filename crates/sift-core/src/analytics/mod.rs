//! Spending analytics
//!
//! Turns a flat receipt list into per-category totals and percentage
//! shares. The aggregation is pure; `AnalyticsLoader` does the fetching and
//! merges the narrative insights served alongside.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sift_core::analytics::{compute, AnalyticsLoader};
//!
//! let breakdown = compute(&receipts);
//! if let Some(top) = breakdown.top_category() {
//!     println!("{}: {:.1}%", top.category, top.percentage);
//! }
//! ```

pub mod insights;
pub mod loader;

pub use insights::{InsightState, SpendingInsights};
pub use loader::{AnalyticsLoader, AnalyticsView};

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Receipt, ReceiptStatus};

/// Bucket for receipts without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Spend in one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
    /// Share of total spending, one decimal place
    pub percentage: f64,
    pub receipt_count: usize,
}

/// Review-state counts across the same receipts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub duplicates: usize,
    /// Receipts carrying at least one fraud flag
    pub flagged: usize,
}

/// Category breakdown, sorted by amount descending
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpendingBreakdown {
    pub categories: Vec<CategorySpending>,
    pub total_spending: f64,
    pub receipt_count: usize,
    pub average_per_receipt: f64,
    pub status_counts: StatusCounts,
}

impl SpendingBreakdown {
    /// Largest category, `None` when there are no receipts
    pub fn top_category(&self) -> Option<&CategorySpending> {
        self.categories.first()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Sum of the displayed (rounded) percentages
    pub fn percentage_sum(&self) -> f64 {
        self.categories.iter().map(|c| c.percentage).sum()
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Category a receipt is counted under
pub fn category_of(receipt: &Receipt) -> &str {
    receipt
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
}

/// Aggregate receipts into a category breakdown
///
/// Missing or unparsable totals count as zero, as do negative totals
/// (refund slips would otherwise produce negative shares). With zero total
/// spending every percentage is zero.
pub fn compute(receipts: &[Receipt]) -> SpendingBreakdown {
    let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
    let mut total = 0.0;
    let mut status_counts = StatusCounts::default();

    for receipt in receipts {
        let amount = receipt.amount().max(0.0);
        let entry = by_category.entry(category_of(receipt)).or_insert((0.0, 0));
        entry.0 += amount;
        entry.1 += 1;
        total += amount;

        match receipt.status {
            ReceiptStatus::Pending => status_counts.pending += 1,
            ReceiptStatus::Approved => status_counts.approved += 1,
            ReceiptStatus::Rejected => status_counts.rejected += 1,
        }
        if receipt.is_duplicate {
            status_counts.duplicates += 1;
        }
        if !receipt.fraud_flags.is_empty() {
            status_counts.flagged += 1;
        }
    }

    let mut categories: Vec<CategorySpending> = by_category
        .into_iter()
        .map(|(category, (amount, receipt_count))| CategorySpending {
            category: category.to_string(),
            amount,
            percentage: if total > 0.0 {
                round1(amount / total * 100.0)
            } else {
                0.0
            },
            receipt_count,
        })
        .collect();

    // Name breaks ties so the order is stable across runs
    categories.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    let receipt_count = receipts.len();
    SpendingBreakdown {
        categories,
        total_spending: total,
        receipt_count,
        average_per_receipt: if receipt_count > 0 {
            total / receipt_count as f64
        } else {
            0.0
        },
        status_counts,
    }
}
