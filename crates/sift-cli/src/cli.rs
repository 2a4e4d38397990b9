//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sift - Upload, review and analyse expense receipts
#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Receipt upload, duplicate review and spending analytics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Processing service base URL (overrides config and SIFT_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Client config file (defaults to the per-user override if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a receipt image or PDF for processing
    Upload {
        /// Receipt file to upload
        #[arg(short, long)]
        file: PathBuf,

        /// Approve the upload right away if it is flagged as a duplicate
        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        /// Reject the upload right away if it is flagged as a duplicate
        #[arg(long)]
        reject: bool,
    },

    /// List and review stored receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Review receipts flagged as duplicates
    Duplicates {
        #[command(subcommand)]
        action: DuplicatesAction,
    },

    /// Show spending by category
    Analytics {
        /// Write a pie chart of the breakdown to this SVG file
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Skip the narrative insights
        #[arg(long)]
        no_insights: bool,
    },

    /// Show the resolved client configuration
    Config,
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List receipts
    List {
        /// Filter by status (pending, approved, rejected)
        #[arg(short, long)]
        status: Option<String>,

        /// Only receipts flagged as duplicates
        #[arg(long)]
        duplicates: bool,
    },

    /// Approve a receipt
    Approve {
        /// Receipt ID
        id: String,
    },

    /// Reject a receipt
    Reject {
        /// Receipt ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum DuplicatesAction {
    /// Compare a flagged receipt with its original
    Show {
        /// ID of the flagged receipt
        id: String,
    },

    /// Approve a flagged receipt
    Approve {
        /// ID of the flagged receipt
        id: String,
    },

    /// Reject a flagged receipt
    Reject {
        /// ID of the flagged receipt
        id: String,
    },
}
