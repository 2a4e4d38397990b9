//! Receipt upload command

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sift_core::{ReviewAction, SelectedFile, SiftClient, SubmitStatus};

use crate::presenter::{comparison_table, progress_bar, receipt_table};

const PROGRESS_WIDTH: usize = 30;

/// Upload a receipt, print what the service extracted and handle a
/// duplicate flag
pub async fn cmd_upload(
    client: &SiftClient,
    file: &Path,
    decision: Option<ReviewAction>,
) -> Result<()> {
    let selected = SelectedFile::from_path(file)
        .with_context(|| format!("Cannot upload {}", file.display()))?;

    println!("📤 Uploading {} ({} bytes)", selected.name(), selected.len());
    client.upload.select_file(selected);

    // Live progress line, fed by the controller's watch channel
    let mut progress = client.upload.watch_progress();
    let progress_line = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            print!("\r  {}", progress_bar(percent, PROGRESS_WIDTH));
            let _ = std::io::stdout().flush();
        }
    });

    let status = client.upload.submit().await;
    progress_line.abort();
    println!("\r  {}", progress_bar(client.upload.progress(), PROGRESS_WIDTH));

    let outcome = match status.context("Upload failed")? {
        SubmitStatus::Completed(outcome) => outcome,
        SubmitStatus::AlreadyInFlight | SubmitStatus::Discarded => {
            bail!("Upload did not complete")
        }
    };
    let receipt = &outcome.receipt;

    println!("\n🧾 Receipt");
    println!("{}", "─".repeat(50));
    println!("{}", receipt_table(receipt));

    println!("\n📝 Raw text");
    println!("{}", "─".repeat(50));
    if receipt.raw_text.trim().is_empty() {
        println!("  (none)");
    } else {
        for line in receipt.raw_text.lines() {
            println!("  {}", line);
        }
    }

    println!("\n🔎 Parsed fields");
    println!("{}", "─".repeat(50));
    println!("{}", serde_json::to_string_pretty(&receipt.parsed_fields)?);

    if !receipt.is_duplicate {
        if decision.is_some() {
            println!("\nNot flagged as a duplicate; --approve/--reject skipped");
        }
        return Ok(());
    }

    println!("\n🔁 Possible duplicate");
    println!("{}", "─".repeat(70));
    match outcome.duplicate.as_ref().map(|l| (&l.pair, &l.original)) {
        Some((Ok(context), _)) => println!("{}", comparison_table(context)),
        Some((Err(_), Ok(original))) => {
            println!("  Original receipt:");
            println!("{}", receipt_table(original));
        }
        Some((Err(_), Err(_))) => println!("  Comparison unavailable"),
        None => println!("  The service named no original receipt"),
    }

    let Some(id) = receipt.id.as_ref() else {
        if decision.is_some() {
            println!("\nThe service returned no receipt id; --approve/--reject skipped");
        }
        return Ok(());
    };
    match decision {
        Some(ReviewAction::Approve) => {
            client.duplicates.approve(Some(id)).await?;
        }
        Some(ReviewAction::Reject) => {
            client.duplicates.reject(Some(id)).await?;
        }
        None => {
            println!("\nResolve with 'sift duplicates approve {}' or 'sift duplicates reject {}'", id, id);
        }
    }

    Ok(())
}
