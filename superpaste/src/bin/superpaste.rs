//! Inspect and edit a SuperPaste history database from the command line.
//!
//! Usage:
//!     superpaste [--db PATH] <add|list|search|delete|clear|settings|set> ...
//!
//! The database defaults to the app's data directory; `SUPERPASTE_DB`
//! or `--db` point elsewhere. Log verbosity follows `RUST_LOG`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use superpaste::config::StoreConfig;
use superpaste::models::{SettingsPatch, SHORTCUT_OPTIONS};
use superpaste::{CapturePayload, ClipboardItem, ClipboardService, HotkeyError, HotkeyRegistrar};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a text capture
    Add {
        text: String,

        /// Application the text was copied from
        #[arg(long)]
        source_app: Option<String>,
    },
    /// Most recent items first
    List {
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Items whose text contains QUERY
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Delete an item by ID
    Delete { id: i64 },
    /// Delete every item
    Clear,
    /// Print the current settings as JSON
    Settings,
    /// Change settings
    Set {
        #[arg(long)]
        max_items: Option<i64>,

        #[arg(long)]
        max_days: Option<i64>,

        #[arg(long)]
        max_file_size_mb: Option<i64>,

        /// One of the offered global shortcuts
        #[arg(long)]
        shortcut: Option<String>,
    },
}

/// The CLI never owns the global hotkey. Rebinding only records the choice;
/// the app picks it up on its next start.
struct DetachedRegistrar;

impl HotkeyRegistrar for DetachedRegistrar {
    fn register(&self, combo: &str) -> Result<(), HotkeyError> {
        tracing::debug!(combo, "Recording shortcut without registering");
        Ok(())
    }

    fn unregister(&self, _combo: &str) -> Result<(), HotkeyError> {
        Ok(())
    }
}

fn print_items(items: &[ClipboardItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    for item in items {
        let preview: String = item
            .clipboard_content()
            .unwrap_or_default()
            .chars()
            .take(60)
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        println!(
            "{:>6}  {}  {:<5}  {}",
            item.id,
            item.updated_at.format("%Y-%m-%d %H:%M:%S"),
            item.content_type.database_type(),
            preview
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = StoreConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let service = ClipboardService::open(&config, Arc::new(DetachedRegistrar))
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    let store = service.store();

    match args.command {
        Command::Add { text, source_app } => {
            let outcome = service
                .ingest(&CapturePayload::text(text, source_app))?
                .context("Capture was skipped")?;
            let verb = if outcome.inserted { "Added" } else { "Refreshed" };
            println!("{} item {}", verb, outcome.item_id);
        }
        Command::List { limit, json } => {
            let items = store.list(limit.unwrap_or(config.list_limit))?;
            print_items(&items, json)?;
        }
        Command::Search { query, limit, json } => {
            let items = store.search(&query, limit.unwrap_or(config.list_limit))?;
            print_items(&items, json)?;
        }
        Command::Delete { id } => {
            if !store.remove_by_id(id)? {
                anyhow::bail!("No item with id {}", id);
            }
            println!("Deleted item {}", id);
        }
        Command::Clear => {
            store.clear()?;
            println!("History cleared");
        }
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&service.settings())?);
        }
        Command::Set {
            max_items,
            max_days,
            max_file_size_mb,
            shortcut,
        } => {
            let patch = SettingsPatch {
                max_items,
                max_days,
                max_file_size_mb,
            };
            if patch.is_empty() && shortcut.is_none() {
                anyhow::bail!("Nothing to change");
            }

            if let Some(shortcut) = shortcut {
                if !SHORTCUT_OPTIONS.iter().any(|s| *s == shortcut) {
                    anyhow::bail!(
                        "Unsupported shortcut '{}', expected one of: {}",
                        shortcut,
                        SHORTCUT_OPTIONS.join(", ")
                    );
                }
                service.update_shortcut(&shortcut)?;
            }
            if !patch.is_empty() {
                service.update_settings(&patch)?;
            }
            println!("{}", serde_json::to_string_pretty(&service.settings())?);
        }
    }

    Ok(())
}
