//! dbsync CLI - apply versioned SQL scripts to a schema

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use dbsync_core::Version;

mod commands;
mod output;

use commands::{drop, status, sync, Outcome};

/// dbsync - keep a database schema in step with its script folders
#[derive(Parser)]
#[command(name = "dbsync", version, about, long_about = None)]
struct Cli {
    /// Schema to operate on
    #[arg(short, long, global = true, env = "DBSYNC_SCHEMA")]
    schema: Option<String>,

    /// Directory holding one source folder per schema
    #[arg(long, global = true, env = "DBSYNC_ROOT")]
    root: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema if needed and apply pending scripts (default)
    Sync(SyncArgs),

    /// Show which scripts are applied and which are pending
    Status {
        /// Only consider versions up to and including this one
        #[arg(long, value_name = "VERSION")]
        to_version: Option<Version>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop the schema and everything in it
    Drop {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct SyncArgs {
    /// Stop after this version
    #[arg(long, value_name = "VERSION")]
    to_version: Option<Version>,
    /// Show what would run without touching the database
    #[arg(long)]
    dry_run: bool,
    /// Keep going with later versions after a script fails
    #[arg(long)]
    continue_on_failure: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    match run(cli) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::ScriptsFailed) => ExitCode::FAILURE,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    let schema = commands::require_schema(cli.schema.as_deref())?;
    let root = cli.root;

    match cli.command.unwrap_or_else(|| Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => sync::run(
            schema,
            root,
            sync::SyncOptions {
                to_version: args.to_version,
                dry_run: args.dry_run,
                continue_on_failure: args.continue_on_failure,
                json: args.json,
            },
        ),
        Commands::Status { to_version, json } => status::run(schema, root, to_version, json),
        Commands::Drop { force } => drop::run(schema, root, force),
    }
}
