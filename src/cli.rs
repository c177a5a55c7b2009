//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gophers - gophers with grenades
///
/// Arm (create) many gophers (small cloud instances) and send them to
/// attack (load test) a web application, then merge what they saw into
/// one report.
///
/// Examples:
///   gophers up --count 10
///   gophers attack --url http://staging.example.com/ -n 1000 --concurrent 10
///   gophers report
///   gophers down
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .gophers.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Region the fleet lives in
    #[arg(long, value_name = "REGION", env = "GOPHERS_REGION", global = true)]
    pub region: Option<String>,

    /// Key pair name; the private key is read from ~/.ssh/<KEY>.pem
    #[arg(long, value_name = "KEY", global = true)]
    pub key: Option<String>,

    /// Login user for remote sessions on the gophers
    #[arg(long, value_name = "USER", global = true)]
    pub login: Option<String>,
}

/// Top-level verbs.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a batch of load testing servers
    #[command(visible_alias = "provision")]
    Up(UpArgs),

    /// Shut down and deactivate the load testing servers
    #[command(visible_alias = "decommission")]
    Down,

    /// Begin the attack on a specific url
    Attack(AttackArgs),

    /// Report the status of the load testing servers
    Report,

    /// Generate a default .gophers.toml configuration file
    InitConfig,
}

/// Options for `up`.
#[derive(clap::Args, Debug, Clone)]
pub struct UpArgs {
    /// The number of gophers to call into action
    #[arg(short = 'n', long, default_value = "5", value_name = "COUNT")]
    pub count: usize,

    /// Image id each gopher boots from
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Instance type for each gopher
    #[arg(long = "instance-type", visible_alias = "type", value_name = "TYPE")]
    pub instance_type: Option<String>,
}

/// Options for `attack`.
#[derive(clap::Args, Debug, Clone)]
pub struct AttackArgs {
    /// The url to point the gophers towards
    #[arg(short, long, value_name = "URL")]
    pub url: String,

    /// Number of requests each gopher performs
    #[arg(short = 'n', long, value_name = "NUM")]
    pub requests: Option<u32>,

    /// Number of concurrent requests each gopher makes
    #[arg(long, value_name = "NUM")]
    pub concurrent: Option<u32>,

    /// Additional flags passed to the load generator
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Also write a report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report file format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,
}

/// Output format for the report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Up(up) => {
                if up.count == 0 {
                    return Err("You must declare a number of gophers greater than 0".to_string());
                }
            }
            Command::Attack(attack) => {
                if attack.url.trim().is_empty() {
                    return Err("You must provide a url to start the attack".to_string());
                }
                if attack.requests == Some(0) {
                    return Err("Requests must be at least 1".to_string());
                }
                if attack.concurrent == Some(0) {
                    return Err("Concurrency must be at least 1".to_string());
                }
                if let (Some(requests), Some(concurrent)) = (attack.requests, attack.concurrent) {
                    if concurrent > requests {
                        return Err(
                            "Concurrency cannot be greater than the number of requests"
                                .to_string(),
                        );
                    }
                }
            }
            Command::Down | Command::Report | Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
