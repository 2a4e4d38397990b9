//! Console rendering
//!
//! The notifier that prints controller messages, plus the formatting
//! helpers the commands share.

use sift_core::{DuplicateContext, Notifier, Receipt, ReceiptStatus, Severity};

/// Prints notifications with a severity icon; warnings and errors go to stderr
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => println!("ℹ️  {}", message),
            Severity::Success => println!("✅ {}", message),
            Severity::Warning => eprintln!("⚠️  {}", message),
            Severity::Error => eprintln!("❌ {}", message),
        }
    }
}

/// `[########------------]  40%`
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100) as usize;
    let filled = width * percent / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

pub fn status_label(status: ReceiptStatus) -> &'static str {
    match status {
        ReceiptStatus::Pending => "⏳ pending",
        ReceiptStatus::Approved => "✓ approved",
        ReceiptStatus::Rejected => "✗ rejected",
    }
}

/// One-line listing entry
pub fn receipt_line(receipt: &Receipt) -> String {
    let id = receipt
        .id
        .as_ref()
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "#?".to_string());
    let total = receipt
        .total
        .as_ref()
        .map(|t| t.raw().to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let date = receipt
        .parsed_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or_else(|| receipt.date.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut line = format!(
        "  {:<6} {} - {} ({}) {}",
        id,
        receipt.merchant_or_unknown(),
        total,
        date,
        status_label(receipt.status)
    );
    if let Some(original) = receipt.duplicate_target() {
        line.push_str(&format!("  🔁 duplicate of #{}", original));
    } else if receipt.is_duplicate {
        line.push_str("  🔁 duplicate");
    }
    if !receipt.fraud_flags.is_empty() {
        line.push_str(&format!("  🚩 {}", receipt.fraud_flags.join(", ")));
    }
    line
}

/// Label/value table for one receipt
pub fn receipt_table(receipt: &Receipt) -> String {
    receipt
        .summary_rows()
        .into_iter()
        .map(|(label, value)| format!("  {:<16} {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Side-by-side rows: (label, original, duplicate)
///
/// Covers every label either side reports, in display order; a row one side
/// lacks shows "-" there.
pub fn comparison_rows(context: &DuplicateContext) -> Vec<(&'static str, String, String)> {
    let original = context.original.summary_rows();
    let duplicate = context.duplicate.summary_rows();

    let mut labels: Vec<&'static str> = original.iter().map(|(label, _)| *label).collect();
    for (label, _) in &duplicate {
        if !labels.contains(label) {
            labels.push(*label);
        }
    }

    let value = |rows: &[(&'static str, String)], label: &str| {
        rows.iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "-".to_string())
    };
    labels
        .into_iter()
        .map(|label| (label, value(&original, label), value(&duplicate, label)))
        .collect()
}

pub fn comparison_table(context: &DuplicateContext) -> String {
    let mut out = vec![format!("  {:<16} {:<28} {}", "", "Original", "Duplicate")];
    for (label, original, duplicate) in comparison_rows(context) {
        let marker = if original != duplicate { " ≠" } else { "" };
        out.push(format!(
            "  {:<16} {:<28} {}{}",
            label,
            truncate(&original, 28),
            duplicate,
            marker
        ));
    }
    out.join("\n")
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
