//! Duplicate review commands

use anyhow::{anyhow, Result};
use sift_core::{ReceiptId, ReviewAction, SiftClient};

use crate::presenter::comparison_table;

/// Show a flagged receipt next to its original
pub async fn cmd_duplicates_show(client: &SiftClient, id: &str) -> Result<()> {
    let id: ReceiptId = id.parse().map_err(|e: String| anyhow!(e))?;
    let context = client.duplicates.load_pair(&id).await?;

    println!("\n🔁 Duplicate #{}", id);
    println!("{}", "─".repeat(70));
    println!("{}", comparison_table(&context));

    if !context.duplicate.fraud_flags.is_empty() {
        println!("\n  🚩 {}", context.duplicate.fraud_flags.join(", "));
    }
    println!();
    Ok(())
}

/// Approve or reject a flagged receipt
pub async fn cmd_duplicates_review(
    client: &SiftClient,
    id: &str,
    action: ReviewAction,
) -> Result<()> {
    let id: ReceiptId = id.parse().map_err(|e: String| anyhow!(e))?;
    match action {
        ReviewAction::Approve => client.duplicates.approve(Some(&id)).await?,
        ReviewAction::Reject => client.duplicates.reject(Some(&id)).await?,
    };
    Ok(())
}
