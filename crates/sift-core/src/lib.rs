//! Sift Core Library
//!
//! Client-side workflow for a receipt processing service:
//! - Upload session controller (select, submit, progress, duplicate hand-off)
//! - Duplicate resolution (pair lookup, approve/reject)
//! - Receipt listing cache for the admin view
//! - Spending analytics and pie chart geometry
//! - Pluggable transport (HTTP via reqwest, in-memory mock)
//! - Layered client configuration

pub mod analytics;
pub mod api;
pub mod chart;
pub mod client;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod listing;
pub mod models;
pub mod notify;
pub mod upload;

/// Test utilities including mock processing server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analytics::{
    compute, AnalyticsLoader, AnalyticsView, CategorySpending, InsightState, SpendingBreakdown,
    SpendingInsights,
};
pub use api::{HttpReceiptApi, MockReceiptApi, ReceiptApi, SubmitResponse, UploadProgress};
pub use chart::{layout, render_svg, ChartFrame, ChartSlice, SliceShape};
pub use client::SiftClient;
pub use config::ClientConfig;
pub use duplicates::{DuplicateLookup, DuplicateResolver, ReviewAction};
pub use error::{Error, ErrorKind, Result};
pub use listing::ReceiptListing;
pub use models::{DuplicateContext, Receipt, ReceiptId, ReceiptStatus, SelectedFile};
pub use notify::{Notification, Notifier, RecordingNotifier, Severity, TracingNotifier};
pub use upload::{Selection, SubmitOutcome, SubmitStatus, UploadController, UploadPhase};
