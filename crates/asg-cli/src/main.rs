//! Abstract semantic graph tools.
//!
//! Provides the `asg` binary with subcommands that load graph files,
//! query or rewrite them and save them back. Every command prints a JSON
//! report to stdout; diagnostics go to stderr through `tracing`.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use asg_core::NodeId;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use commands::Context;
use error::CliError;

/// Abstract semantic graph tools.
#[derive(Parser)]
#[command(name = "asg", about = "Inspect and maintain abstract semantic graph files")]
struct Cli {
    /// Schema describing the graph files (JSON).
    #[arg(short, long)]
    schema: PathBuf,

    /// Engine configuration (JSON).
    #[arg(short, long, env = "ASG_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print header properties and graph statistics.
    Info { file: PathBuf },

    /// Check structural invariants; exits with 1 when any is violated.
    Verify { file: PathBuf },

    /// Replace a prefix of every path-valued field.
    RewritePaths {
        file: PathBuf,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Write here instead of rewriting in place.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List root components that are new, modified or removed in `new`.
    Dirty {
        old: PathBuf,
        new: PathBuf,

        /// Field naming each root component.
        #[arg(long, default_value = "name")]
        name_field: String,
    },

    /// Similarity of two nodes, possibly from different files.
    Similarity {
        file_a: PathBuf,
        node_a: u32,
        file_b: PathBuf,
        node_b: u32,
    },

    /// Merge graph files into one; unreadable inputs are skipped.
    Merge {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::load(&cli.schema, cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => print_json(&commands::info(&ctx, &file)?),
        Commands::Verify { file } => {
            let report = commands::verify_file(&ctx, &file)?;
            print_json(&report)?;
            if report.is_ok() {
                Ok(())
            } else {
                Err(CliError::VerifyFailed {
                    issues: report.issues.len(),
                })
            }
        }
        Commands::RewritePaths {
            file,
            from,
            to,
            output,
        } => print_json(&commands::rewrite_paths(
            &ctx,
            &file,
            &from,
            &to,
            output.as_deref(),
        )?),
        Commands::Dirty {
            old,
            new,
            name_field,
        } => print_json(&commands::dirty(&ctx, &old, &new, &name_field)?),
        Commands::Similarity {
            file_a,
            node_a,
            file_b,
            node_b,
        } => {
            let score =
                commands::similarity(&ctx, &file_a, NodeId(node_a), &file_b, NodeId(node_b))?;
            print_json(&serde_json::json!({ "similarity": score }))
        }
        Commands::Merge { output, inputs } => {
            print_json(&commands::merge(&ctx, &inputs, &output)?)
        }
    }
}

/// Prints `value` as pretty JSON to stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
