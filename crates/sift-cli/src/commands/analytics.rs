//! Spending analytics command

use std::path::Path;

use anyhow::{Context, Result};
use sift_core::analytics::{InsightState, SpendingBreakdown, SpendingInsights};
use sift_core::chart::{layout, render_svg, ChartFrame, DEFAULT_PALETTE};
use sift_core::SiftClient;

use crate::presenter::truncate;

/// Print the category breakdown and insights; optionally write a pie chart
pub async fn cmd_analytics(
    client: &SiftClient,
    svg: Option<&Path>,
    include_insights: bool,
) -> Result<()> {
    let view = client.analytics.load_with(include_insights).await?;
    let breakdown = &view.breakdown;

    print_breakdown(breakdown);
    print_insights(&view.insights);

    if let Some(path) = svg {
        let frame = ChartFrame::default();
        let slices = layout(&breakdown.categories, &frame);
        let document = render_svg(&slices, &frame, DEFAULT_PALETTE);
        std::fs::write(path, document)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        println!("📊 Chart written to {}", path.display());
    }

    Ok(())
}

pub fn print_breakdown(breakdown: &SpendingBreakdown) {
    println!("\n📊 Spending by Category");
    println!("{}", "─".repeat(60));

    if breakdown.is_empty() {
        println!("  No receipts yet");
        return;
    }

    println!(
        "  {:<24} {:>12} {:>8} {:>8}",
        "Category", "Amount", "Share", "Count"
    );
    for category in &breakdown.categories {
        println!(
            "  {:<24} {:>12.2} {:>7.1}% {:>8}",
            truncate(&category.category, 24),
            category.amount,
            category.percentage,
            category.receipt_count
        );
    }
    println!("{}", "─".repeat(60));
    println!("  Total spending:      {:.2}", breakdown.total_spending);
    println!("  Receipts:            {}", breakdown.receipt_count);
    println!("  Average per receipt: {:.2}", breakdown.average_per_receipt);
    if let Some(top) = breakdown.top_category() {
        println!(
            "  Top category:        {} ({:.1}%)",
            top.category, top.percentage
        );
    }

    let counts = &breakdown.status_counts;
    println!(
        "  Review:              {} pending, {} approved, {} rejected",
        counts.pending, counts.approved, counts.rejected
    );
    if counts.duplicates > 0 || counts.flagged > 0 {
        println!(
            "  Flags:               {} duplicates, {} with fraud flags",
            counts.duplicates, counts.flagged
        );
    }
}

pub fn print_insights(state: &InsightState) {
    match state {
        InsightState::Skipped => {}
        InsightState::Unavailable(reason) => {
            println!("\n💡 Insights");
            println!("{}", "─".repeat(60));
            println!("  ⚠️  Insights unavailable: {}", reason);
        }
        InsightState::Available(insights) => {
            println!("\n💡 Insights");
            println!("{}", "─".repeat(60));
            print_insight_sections(insights);
        }
    }
}

fn print_insight_sections(insights: &SpendingInsights) {
    if insights.is_empty() {
        println!("  No insights yet");
        return;
    }
    if let Some(text) = &insights.insights {
        for line in text.lines() {
            println!("  {}", line);
        }
    }
    for (title, items) in [
        ("Top categories", &insights.top_categories),
        ("Concerns", &insights.concerns),
        ("Suggestions", &insights.suggestions),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("\n  {}:", title);
        for item in items {
            println!("    • {}", item);
        }
    }
}
