mod commands;
mod logging;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use note_ledger_core::storage::models::NoteStatus;
use note_ledger_core::storage::{Database, NoteFilter, NoteUpdate, UpdateOutcome};
use note_ledger_core::{AppConfig, Error, ScanEngine};
use tracing::error;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match note_ledger_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Scan { full, root }) => run_scan(&config, root, full),
        Some(Commands::Notes {
            status,
            priority,
            comment,
            json,
        }) => run_notes(&config, status, priority, comment, json),
        Some(Commands::Show { slug, json }) => run_show(&config, &slug, json),
        Some(Commands::Set {
            slug,
            status,
            priority,
            clear_priority,
            comment,
        }) => run_set(&config, &slug, status, priority, clear_priority, comment),
        Some(Commands::Summary { json }) => run_summary(&config, json),
        Some(Commands::History { limit, json }) => run_history(&config, limit, json),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::TruncateDb) => run_truncate(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {}", err);
        process::exit(1);
    }
}

fn run_scan(config: &AppConfig, root: Option<PathBuf>, full: bool) -> Result<(), Error> {
    let engine = ScanEngine::new(config.clone());
    let outcome = engine.scan(root.as_deref(), full)?;

    println!(
        "Scanned {} ({} scan)",
        outcome.scanned_root.bold(),
        if outcome.full { "full" } else { "diff" },
    );
    println!(
        "  files: {}  slugs: {}  evidence added: {}",
        outcome.files_scanned.to_string().green(),
        outcome.slugs_found.to_string().green(),
        outcome.evidence_added.to_string().green(),
    );
    println!(
        "  done forced: {}  stale marked: {}  revived: {}  orphans removed: {}",
        outcome.done_forced.to_string().cyan(),
        outcome.stale_marked.to_string().yellow(),
        outcome.revived_count.to_string().cyan(),
        outcome.orphan_files_removed.to_string().yellow(),
    );
    Ok(())
}

fn run_notes(
    config: &AppConfig,
    status: Option<String>,
    priority: Option<String>,
    comment: Option<String>,
    json: bool,
) -> Result<(), Error> {
    let filter = NoteFilter::parse(status.as_deref(), priority.as_deref(), comment.as_deref())?;
    let db = Database::open(&config.db_path)?;
    let notes = db.list_notes(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes).unwrap_or_default());
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes match.");
        return Ok(());
    }
    for note in &notes {
        let priority = note
            .priority
            .map(|p| format!("p{}", p))
            .unwrap_or_else(|| "p-".to_string());
        println!(
            "{:8} {:3} {:4} {}  ({} evidence)",
            note.status.to_string().bold(),
            priority,
            format!("#{}", note.id),
            note.slug,
            note.evidence_count,
        );
    }
    Ok(())
}

fn run_show(config: &AppConfig, slug: &str, json: bool) -> Result<(), Error> {
    let db = Database::open(&config.db_path)?;
    let detail = db
        .note_detail(slug)?
        .ok_or_else(|| Error::NoteNotFound(slug.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail).unwrap_or_default());
        return Ok(());
    }

    let note = &detail.note;
    println!("{} [{}]", note.slug.bold(), note.status);
    println!(
        "  priority: {}  created: {}  updated: {}",
        note.priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string()),
        note.created_at,
        note.updated_at,
    );
    println!("  evidence:");
    for ev in &detail.evidence {
        println!(
            "    {}:{}  {}",
            ev.filepath,
            ev.line_no,
            ev.snippet.as_deref().unwrap_or(""),
        );
    }
    println!("  events:");
    for event in &detail.events {
        println!(
            "    {} {} {} -> {}",
            event.changed_at,
            event.event_type.as_str(),
            event.old_value.as_deref().unwrap_or("-"),
            event.new_value.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn run_set(
    config: &AppConfig,
    slug: &str,
    status: Option<String>,
    priority: Option<i64>,
    clear_priority: bool,
    comment: Option<String>,
) -> Result<(), Error> {
    let status = match status {
        Some(raw) => Some(NoteStatus::from_str(&raw).map_err(Error::InvalidUpdate)?),
        None => None,
    };
    let priority = if clear_priority {
        Some(None)
    } else {
        priority.map(Some)
    };

    let update = NoteUpdate {
        status,
        priority,
        comment,
    };

    let db = Database::open(&config.db_path)?;
    match db.update_note(slug, &update)? {
        UpdateOutcome::Unchanged => println!("{}: no change", slug),
        UpdateOutcome::Updated(note) => println!(
            "{}: status={} priority={}",
            note.slug.bold(),
            note.status.to_string().green(),
            note.priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    }
    Ok(())
}

fn run_summary(config: &AppConfig, json: bool) -> Result<(), Error> {
    let db = Database::open(&config.db_path)?;
    let summary = db.summary()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{} notes total", summary.total.to_string().bold());
    for (status, count) in &summary.by_status {
        println!("  {:8} {}", status.to_string(), count);
    }
    match &summary.last_scan_at {
        Some(at) => println!("last scan: {}", at),
        None => println!("last scan: never"),
    }
    Ok(())
}

fn run_history(config: &AppConfig, limit: i64, json: bool) -> Result<(), Error> {
    let db = Database::open(&config.db_path)?;
    let entries = db.scan_history(limit)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} {} {}  files={} slugs={} evidence={} done={} stale={} revived={} orphans={}",
            entry.scanned_at,
            if entry.full { "full" } else { "diff" },
            entry.scanned_root,
            entry.files_scanned,
            entry.slugs_found,
            entry.evidence_added,
            entry.done_forced,
            entry.stale_marked,
            entry.revived_count,
            entry.orphan_files_removed,
        );
    }
    Ok(())
}

fn run_truncate(config: &AppConfig) -> Result<(), Error> {
    match prompt_confirm(
        "Are you SURE you want to COMPLETELY DELETE the ledger?",
        Some(false),
    ) {
        Ok(true) => {
            let db = Database::open(&config.db_path)?;
            db.truncate_all()?;
            println!("All ledger tables truncated");
            Ok(())
        }
        _ => {
            process::exit(0);
        }
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
