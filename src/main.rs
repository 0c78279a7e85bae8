//! formfill command-line interface
//!
//! Inspects and edits the suggestion store that host applications fill
//! through the bridge coordinator.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};

use formfill::config::{self, Config};
use formfill::store::{
    FieldSummary, RecordId, SuggestionRecord, SuggestionSource, SuggestionStore, shared, url_scope,
};
use formfill::suggestions::SuggestionEngine;

#[derive(Parser, Debug)]
#[command(name = "formfill", version)]
#[command(about = "Inspect and edit remembered form field values")]
struct Cli {
    /// Suggestion database (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to ~/.config/formfill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show ranked suggestions for a field
    List {
        field: String,

        /// Rank values seen on this host first
        #[arg(long)]
        scope: Option<String>,

        /// Derive the scope from a page URL
        #[arg(long, conflicts_with = "scope")]
        url: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Record a value for a field
    Add {
        field: String,
        value: String,

        #[arg(long = "type", default_value = "text")]
        field_type: String,

        /// Page URL the value was entered on
        #[arg(long)]
        url: Option<String>,

        /// Mark the value as prefilled by the page rather than typed
        #[arg(long)]
        prefilled: bool,
    },
    /// Delete one stored value by id
    Delete { id: i64 },
    /// Delete every stored value of a field
    Forget { field: String },
    /// Show per-field totals
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let loaded = match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(loaded.config.log.level.as_filter()),
    )
    .init();

    if let Some(warning) = &loaded.warning {
        log::warn!("{}", warning);
    }

    run(cli, loaded.config)
}

fn open_store(db: Option<PathBuf>, config: &Config) -> Result<SuggestionStore> {
    let path = db
        .or_else(|| config.database_path())
        .ok_or_else(|| eyre!("No data directory available; pass --db"))?;
    let timeout = std::time::Duration::from_millis(config.store.io_timeout_ms);
    SuggestionStore::open_with_timeout(&path, timeout)
        .wrap_err_with(|| format!("Failed to open {}", path.display()))
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let mut store = open_store(cli.db, &config)?;

    match cli.command {
        Command::List {
            field,
            scope,
            url,
            limit,
            json,
        } => {
            let scope = scope
                .map(|s| s.trim().to_ascii_lowercase())
                .or_else(|| url.as_deref().and_then(url_scope));
            let engine = SuggestionEngine::new(shared(store))
                .with_min_scoped_results(config.suggestions.min_scoped_results);
            let records = engine.get_suggestions(
                &field,
                scope.as_deref(),
                limit.unwrap_or(config.suggestions.limit),
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No suggestions for {}", field);
            } else {
                print_records(&records);
            }
        }
        Command::Add {
            field,
            value,
            field_type,
            url,
            prefilled,
        } => {
            if field_type.eq_ignore_ascii_case("password") {
                return Err(eyre!("Password values are never stored"));
            }
            let source = if prefilled {
                SuggestionSource::Prefilled
            } else {
                SuggestionSource::UserInput
            };
            let scope = url.as_deref().and_then(url_scope);

            let id = store.upsert(&field, &value, &field_type, source, scope.as_deref())?;
            let usage = store.get(id)?.map(|r| r.usage_count).unwrap_or(1);
            println!("Recorded {:?} for {} (id {}, used {}x)", value, field, id, usage);
        }
        Command::Delete { id } => {
            if !store.delete(RecordId(id))? {
                return Err(eyre!("No stored value with id {}", id));
            }
            println!("Deleted {}", id);
        }
        Command::Forget { field } => {
            let removed = store.delete_all_for_field(&field)?;
            println!("Forgot {} value(s) for {}", removed, field);
        }
        Command::Stats { json } => {
            let summaries = store.field_summaries()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print_summaries(&summaries, store.count()?);
            }
        }
    }

    Ok(())
}

fn print_records(records: &[SuggestionRecord]) {
    println!("{:>6}  {:>5}  {:<20}  VALUE", "ID", "USED", "SCOPE");
    for record in records {
        println!(
            "{:>6}  {:>5}  {:<20}  {}",
            record.id.0,
            record.usage_count,
            record.url_scope.as_deref().unwrap_or("-"),
            record.value
        );
    }
}

fn print_summaries(summaries: &[FieldSummary], total: u64) {
    println!("{:<24}  {:>7}  {:>7}", "FIELD", "VALUES", "USES");
    for summary in summaries {
        println!(
            "{:<24}  {:>7}  {:>7}",
            summary.field_identifier, summary.records, summary.total_usage
        );
    }
    println!("{} stored value(s)", total);
}
