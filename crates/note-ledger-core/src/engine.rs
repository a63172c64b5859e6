use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::Error;
use crate::ledger;
use crate::root::RootResolver;
use crate::scanner::{self, diff, tags, walk};
use crate::storage::Database;

/// Orchestrates one scan: resolve root → walk (+ diff selection) → extract
/// tags → reconcile the ledger → record the scan, all against a database
/// opened per call. The whole ledger mutation runs in one transaction.
pub struct ScanEngine {
    config: AppConfig,
    db_path: String,
    resolver: Option<RootResolver>,
}

/// Result counters for one scan invocation, mirroring its scan_log row.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scanned_root: String,
    pub full: bool,
    pub files_scanned: i64,
    pub slugs_found: i64,
    pub evidence_added: i64,
    pub done_forced: i64,
    pub stale_marked: i64,
    pub revived_count: i64,
    pub orphan_files_removed: i64,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.db_path.clone();
        Self {
            config,
            db_path,
            resolver: None,
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    /// Override root resolution inputs (tests, embedding callers).
    pub fn with_resolver(mut self, resolver: RootResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Run one scan. `full` scans read every eligible file and are
    /// authoritative for staleness and orphan cleanup; diff scans only read
    /// files whose fingerprint changed and never mark anything missing.
    pub fn scan(&self, requested_root: Option<&Path>, full: bool) -> Result<ScanOutcome, Error> {
        let resolver = match &self.resolver {
            Some(r) => r.clone(),
            None => RootResolver::from_env(&self.config),
        };
        let root = resolver.resolve(requested_root);
        if !root.is_dir() {
            return Err(Error::InvalidRoot(root));
        }

        let now = chrono::Utc::now().to_rfc3339();
        info!(
            "Scanning {} ({})",
            root.display(),
            if full { "full" } else { "diff" }
        );

        let db = Database::open(&self.db_path)?;
        let tx = db.connection().unchecked_transaction()?;

        let walked = walk::iter_source_files(&root, &self.config);
        let (files, seen_paths) = if full {
            let seen: BTreeSet<String> = walked
                .iter()
                .filter_map(|p| scanner::rel_unix_path(&root, p))
                .collect();
            (walked, seen)
        } else {
            diff::select_changed(&tx, &root, &walked, &now)?
        };
        debug!("{} files selected for extraction", files.len());

        let hits = tags::collect_hits(&root, &files);
        let counts = ledger::apply_hits(&tx, &hits, full, &seen_paths, &now)?;

        let outcome = ScanOutcome {
            scanned_root: root.display().to_string(),
            full,
            files_scanned: files.len() as i64,
            slugs_found: counts.slugs_found,
            evidence_added: counts.evidence_added,
            done_forced: counts.done_forced,
            stale_marked: counts.stale_marked,
            revived_count: counts.revived_count,
            orphan_files_removed: counts.orphan_files_removed,
        };

        ledger::record_scan(&tx, &outcome, &now)?;
        tx.commit()?;

        info!(
            "Scan complete: {} files, {} slugs, {} evidence added, {} done, \
             {} stale, {} revived, {} orphans removed",
            outcome.files_scanned,
            outcome.slugs_found,
            outcome.evidence_added,
            outcome.done_forced,
            outcome.stale_marked,
            outcome.revived_count,
            outcome.orphan_files_removed,
        );
        Ok(outcome)
    }
}
