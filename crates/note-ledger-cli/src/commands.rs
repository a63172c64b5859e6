use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "note-ledger",
    about = "Scan source trees for NOTE(vNext)/DONE(vNext) tags and keep an audit ledger"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the resolved root and reconcile the ledger
    Scan {
        /// Full scan: reads every eligible file and is authoritative for
        /// staleness and orphan cleanup
        #[arg(long)]
        full: bool,
        /// Explicit root directory (overrides LEDGER_REPO_ROOT and
        /// auto-detection)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// List notes, optionally filtered
    Notes {
        /// Comma-separated statuses (open,doing,parked,done,stale)
        #[arg(long)]
        status: Option<String>,
        /// Comma-separated priorities: none and/or 1..3
        #[arg(long)]
        priority: Option<String>,
        /// Comment presence: any | none
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one note with its evidence and event history
    Show {
        slug: String,
        #[arg(long)]
        json: bool,
    },
    /// Edit a note's status or priority, or append a comment
    Set {
        slug: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, conflicts_with = "clear_priority")]
        priority: Option<i64>,
        /// Clear the priority back to unset
        #[arg(long)]
        clear_priority: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Ledger totals by status and last scan time
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Recent scan log entries, newest first
    History {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    PrintConfig,
    /// Delete every row from the ledger database
    TruncateDb,
}
