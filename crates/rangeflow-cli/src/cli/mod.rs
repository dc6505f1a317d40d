//! CLI for the rangeflow range-download engine.

mod commands;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rangeflow_core::config;
use std::path::PathBuf;

use commands::{run_config, run_fetch, run_probe};

/// Top-level CLI for rangeflow.
#[derive(Debug, Parser)]
#[command(name = "rangeflow")]
#[command(about = "rangeflow: concurrent HTTP range downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a byte range of a URL to a file or stdout.
    Fetch(FetchArgs),

    /// Print the size of a URL and whether it serves byte ranges.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,

        /// Extra request header, e.g. -H 'Authorization: Bearer x'. Repeatable.
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Show the config file path and the effective settings.
    Config,

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// First byte to fetch.
    #[arg(long, default_value_t = 0, value_name = "BYTES")]
    pub start: u64,

    /// Number of bytes to fetch (default: to the end).
    #[arg(long, value_name = "BYTES")]
    pub length: Option<u64>,

    /// Total size of the resource; probed when omitted.
    #[arg(long, value_name = "BYTES")]
    pub size: Option<u64>,

    /// Write here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Chunk size in bytes (overrides config).
    #[arg(long, value_name = "BYTES")]
    pub part_size: Option<u64>,

    /// Workers for this download (overrides config).
    #[arg(short = 'c', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Give up after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra request header, e.g. -H 'Authorization: Bearer x'. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

/// Parse `Name: value` into a header pair.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name {:?}", name));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch(args) => run_fetch(&cfg, args)?,
            CliCommand::Probe { url, headers } => run_probe(&cfg, &url, headers)?,
            CliCommand::Config => run_config(&cfg)?,
            CliCommand::Completions { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Cli::command(),
                    "rangeflow",
                    &mut std::io::stdout(),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
