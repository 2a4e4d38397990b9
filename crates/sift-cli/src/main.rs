//! Sift CLI - Receipt upload and review client
//!
//! Usage:
//!   sift upload --file IMG        Upload a receipt and show what was extracted
//!   sift receipts list            List stored receipts
//!   sift duplicates show ID       Compare a flagged receipt with its original
//!   sift analytics --svg out.svg  Spending by category, with a pie chart

mod cli;
mod commands;
mod presenter;


use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sift_core::{ClientConfig, ReviewAction, SiftClient};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use presenter::ConsoleNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let mut config =
        ClientConfig::load(cli.config.as_deref()).context("Failed to load client config")?;
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url);
    }
    debug!(base_url = %config.base_url, "Processing service");

    match cli.command {
        Commands::Config => commands::cmd_config(&config),
        command => {
            let client = SiftClient::connect(config, Arc::new(ConsoleNotifier))
                .context("Failed to create HTTP client")?;
            run(&client, command).await
        }
    }
}

async fn run(client: &SiftClient, command: Commands) -> Result<()> {
    match command {
        Commands::Upload {
            file,
            approve,
            reject,
        } => {
            let decision = if approve {
                Some(ReviewAction::Approve)
            } else if reject {
                Some(ReviewAction::Reject)
            } else {
                None
            };
            commands::cmd_upload(client, &file, decision).await
        }
        Commands::Receipts { action } => match action {
            None => commands::cmd_receipts_list(client, None, false).await,
            Some(ReceiptsAction::List { status, duplicates }) => {
                commands::cmd_receipts_list(client, status.as_deref(), duplicates).await
            }
            Some(ReceiptsAction::Approve { id }) => {
                commands::cmd_receipts_review(client, &id, ReviewAction::Approve).await
            }
            Some(ReceiptsAction::Reject { id }) => {
                commands::cmd_receipts_review(client, &id, ReviewAction::Reject).await
            }
        },
        Commands::Duplicates { action } => match action {
            DuplicatesAction::Show { id } => commands::cmd_duplicates_show(client, &id).await,
            DuplicatesAction::Approve { id } => {
                commands::cmd_duplicates_review(client, &id, ReviewAction::Approve).await
            }
            DuplicatesAction::Reject { id } => {
                commands::cmd_duplicates_review(client, &id, ReviewAction::Reject).await
            }
        },
        Commands::Analytics { svg, no_insights } => {
            commands::cmd_analytics(client, svg.as_deref(), !no_insights).await
        }
        Commands::Config => Ok(()),
    }
}
