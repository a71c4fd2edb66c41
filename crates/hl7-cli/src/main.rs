//! # hl7-cli
//!
//! `hl7nav` builds an empty message from a structure definition, fills it
//! through terse paths and prints values, structural walks or copied
//! segments.

mod commands;
mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::CliConfig;
use hl7_schema::StructureLoader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// A command failed
const EXIT_FAILURE: u8 = 1;
/// The configuration could not be loaded
const EXIT_FATAL: u8 = 3;

#[derive(Parser)]
#[command(name = "hl7nav")]
#[command(about = "Navigate HL7 v2 message structures with terse paths")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the values at one or more terse paths
    Get {
        #[command(flatten)]
        message: MessageArgs,

        /// Terse paths to print (e.g. /.PID-5-1)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the first-repetition structural walk of a message
    Walk {
        #[command(flatten)]
        message: MessageArgs,

        /// Skip groups and print segments only
        #[arg(long)]
        segments_only: bool,
    },

    /// Copy one segment into another and print the target's values
    Copy {
        #[command(flatten)]
        message: MessageArgs,

        /// Segment path of the source (e.g. /.NTE)
        #[arg(long)]
        from: String,

        /// Segment path of the target
        #[arg(long)]
        to: String,
    },
}

/// How to build the message a command works on
#[derive(Args)]
struct MessageArgs {
    /// Structure definition file, or a structure name looked up in the
    /// configured structure paths
    #[arg(short, long)]
    structure: String,

    /// Value to set before running the command
    #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
    sets: Vec<(String, String)>,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{raw}'"))?;
    if path.is_empty() {
        return Err(format!("missing path in '{raw}'"));
    }
    Ok((path.to_string(), value.to_string()))
}

fn init_logging(verbose: u8, configured: Option<&str>) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured.unwrap_or("warn")))
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands, config: &CliConfig) -> Result<()> {
    let loader = StructureLoader::new(config.structure_paths.clone());
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Get { message, paths } => {
            let mut msg = commands::new_message(&loader, &message.structure)?;
            info!(structure = %message.structure, paths = paths.len(), "get");
            commands::get(&mut msg, config, &message.sets, &paths, &mut stdout)
        }
        Commands::Walk {
            message,
            segments_only,
        } => {
            let mut msg = commands::new_message(&loader, &message.structure)?;
            info!(structure = %message.structure, segments_only, "walk");
            commands::walk(&mut msg, config, &message.sets, segments_only, &mut stdout)
        }
        Commands::Copy { message, from, to } => {
            let mut msg = commands::new_message(&loader, &message.structure)?;
            info!(structure = %message.structure, from = %from, to = %to, "copy");
            commands::copy(&mut msg, config, &message.sets, &from, &to, &mut stdout)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    init_logging(cli.verbose, config.log_filter.as_deref());
    debug!(?config, "configuration loaded");

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
