//! Receipt listing commands

use anyhow::{anyhow, Result};
use sift_core::{ReceiptId, ReceiptStatus, ReviewAction, SiftClient};

use crate::presenter::receipt_line;

/// List stored receipts, optionally filtered
pub async fn cmd_receipts_list(
    client: &SiftClient,
    status: Option<&str>,
    duplicates_only: bool,
) -> Result<()> {
    let status: Option<ReceiptStatus> = status
        .map(|s| s.parse().map_err(|e: String| anyhow!(e)))
        .transpose()?;

    client.listing.refresh().await;

    let receipts: Vec<_> = client
        .listing
        .receipts()
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .filter(|r| !duplicates_only || r.is_duplicate)
        .collect();

    if receipts.is_empty() {
        match status {
            Some(status) => println!("No receipts with status '{}'", status.as_str()),
            None => println!("No receipts"),
        }
        return Ok(());
    }

    println!("\n🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(70));
    for receipt in &receipts {
        println!("{}", receipt_line(receipt));
    }
    println!();
    Ok(())
}

/// Approve or reject a receipt from the listing, then show the refreshed count
pub async fn cmd_receipts_review(client: &SiftClient, id: &str, action: ReviewAction) -> Result<()> {
    let id: ReceiptId = id.parse().map_err(|e: String| anyhow!(e))?;
    match action {
        ReviewAction::Approve => client.listing.approve(Some(&id)).await?,
        ReviewAction::Reject => client.listing.reject(Some(&id)).await?,
    };
    println!("  {} receipts pending review", client.listing.pending().len());
    Ok(())
}
