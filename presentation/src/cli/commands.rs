//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary of the run with every step
    Full,
    /// Only the final note
    Note,
    /// Run report as JSON
    Json,
}

/// CLI arguments for decisional-middleware
#[derive(Parser, Debug)]
#[command(name = "decisional-middleware")]
#[command(
    author,
    version,
    about = "Confidence-driven orchestration of clinical documentation personas"
)]
#[command(long_about = r#"
Decisional Middleware turns a visit transcript into a SOAP note by routing it
through one or more LLM personas.

The transcript is scored for complexity (SIMPLE, MODERATE, COMPLEX, CRITICAL).
The level selects a strategy: which personas run, how many refinement rounds
are allowed and the confidence at which the note is accepted. Every persona
invocation is recorded as a step in a JSONL audit trace.

Configuration files are loaded from (in priority order):
1. MIDDLEWARE_* environment variables (e.g. MIDDLEWARE_GATEWAY__BASE_URL)
2. --config <path>     Explicit config file
3. ./middleware.toml   Project-level config
4. ~/.config/decisional-middleware/config.toml   Global config

Example:
  decisional-middleware visit.txt
  decisional-middleware visit.txt --hints hints.json --format json
  cat visit.txt | decisional-middleware --format note
"#)]
pub struct Cli {
    /// Transcript file to process (reads stdin when omitted or "-")
    pub transcript: Option<PathBuf>,

    /// JSON file with structured hints (symptom_count, emergency, ...)
    #[arg(long, value_name = "PATH")]
    pub hints: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub format: OutputFormat,

    /// Re-run a recorded run with the persona versions it used
    #[arg(long, value_name = "RUN_ID")]
    pub replay: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to this directory instead of stderr
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Whether the transcript should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.transcript
            .as_ref()
            .is_none_or(|p| p.as_os_str() == "-")
    }
}
