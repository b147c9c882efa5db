//! CLI command definitions using clap

use crate::config::{ColorChoice, LogFormat};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Barrage: profile-driven HTTP load testing with k6-style reports
#[derive(Parser, Debug)]
#[command(name = "barrage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run load tests against a catalog request
    Run(RunArgs),

    /// Print the stage plan of a load profile
    Plan(PlanArgs),

    /// List the requests of a catalog
    List(ListArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Request catalog (JSON or YAML)
    #[arg(short, long, default_value = "config.json")]
    pub catalog: PathBuf,

    /// Catalog request, by name or 1-based index
    #[arg(short, long)]
    pub request: Option<String>,

    /// Test types to run in order, by name or number (1=smoke .. 5=soak)
    #[arg(short, long, value_delimiter = ',', default_value = "smoke")]
    pub test: Vec<String>,

    /// Expected peak concurrent users
    #[arg(short, long, env = "PEAK_VUS")]
    pub peak: Option<u32>,

    /// API base URL, e.g. https://test-api.k6.io
    #[arg(short, long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory for report files
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Also write each CSV report as latest_results.csv
    #[arg(long)]
    pub latest_csv: bool,

    /// Build the test from TEST_TYPE, ENDPOINT, REQUEST_METHOD and friends
    #[arg(long, conflicts_with_all = ["catalog", "request", "test"])]
    pub from_env: bool,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Test type (smoke, load, stress, spike, soak)
    #[arg(short, long)]
    pub test: String,

    /// Expected peak concurrent users
    #[arg(short, long, env = "PEAK_VUS")]
    pub peak: u32,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: PlanFormat,
}

/// Plan output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlanFormat {
    /// One line per stage
    #[default]
    Text,
    /// The executor spec as JSON
    Json,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Request catalog (JSON or YAML)
    #[arg(short, long, default_value = "config.json")]
    pub catalog: PathBuf,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
