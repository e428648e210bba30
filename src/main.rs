//! Relationship CLI - manage customers and licenses in the local store

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use relationship::config;
use relationship::{MainQueue, Stores};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "relationship")]
#[command(version)]
#[command(about = "Customer and license records in a local SQLite store")]
#[command(long_about = r#"
Relationship keeps customers and the licenses they own in a single
SQLite file (Relationship.sqlite in your documents directory by default).

Example usage:
  relationship seed
  relationship customers list
  relationship customers add dan "Dan" --license d1:serial-d1
  relationship licenses add dan d2 serial-d2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file pointing at the database
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Clear the store and load the demo customers
    Seed,

    /// Show row counts
    Stats,

    /// Manage customers
    Customers {
        #[command(subcommand)]
        command: CustomerCommand,
    },

    /// Manage licenses
    Licenses {
        #[command(subcommand)]
        command: LicenseCommand,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommand {
    /// List all customers
    List,
    /// Show one customer
    Show { id: String },
    /// Create a customer, optionally with licenses
    Add {
        id: String,
        name: String,
        /// License as id:serial (repeatable)
        #[arg(short, long = "license")]
        licenses: Vec<String>,
    },
    /// Change a customer's name
    Rename { id: String, name: String },
    /// Delete a customer and its licenses
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum LicenseCommand {
    /// List the licenses of a customer
    List { customer: String },
    /// Show one license
    Show { id: String },
    /// Add a license to an existing customer
    Add { customer: String, id: String, serial: String },
    /// Change a license's serial
    Update { id: String, serial: String },
    /// Delete a license
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "status": "ok",
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let loaded = config::load_config(cli.config.as_deref())?;
    let database = config::resolve_database_path(cli.database.as_deref(), loaded.as_ref());

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(config::default_config_path);
        return commands::run_init(output_mode, &path, &database, force);
    }

    config::ensure_db_dir(&database)?;
    tracing::debug!("Using database {}", database.display());

    let queue = MainQueue::start()?;
    let stores = Stores::open(&database, Arc::new(queue))?;

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Seed => commands::run_seed(output_mode, &stores),
        Commands::Stats => commands::run_stats(output_mode, &stores, &database),
        Commands::Customers { command } => commands::run_customers(output_mode, &stores, command),
        Commands::Licenses { command } => commands::run_licenses(output_mode, &stores, command),
    };

    stores.shutdown()?;
    result
}
