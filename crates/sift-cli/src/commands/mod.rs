//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `upload` - Submit a receipt, show the extraction, resolve a flagged duplicate
//! - `receipts` - Listing and approve/reject from the admin view
//! - `duplicates` - Original vs duplicate comparison and decisions
//! - `analytics` - Category breakdown, insights and SVG pie chart
//! - `config` - Resolved configuration

pub mod analytics;
pub mod config;
pub mod duplicates;
pub mod receipts;
pub mod upload;

// Re-export command functions for main.rs
pub use analytics::*;
pub use config::*;
pub use duplicates::*;
pub use receipts::*;
pub use upload::*;
