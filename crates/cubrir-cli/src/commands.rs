//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cubridor: CLI for Cubrir - merge per-worker coverage profiles into one
/// deterministic aggregate report
#[derive(Parser, Debug)]
#[command(name = "cubridor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge per-worker coverage profiles for one package run and route
    /// the aggregate profile to its destination
    Merge(MergeArgs),

    /// Summarize an existing merged coverage profile
    Report(ReportArgs),
}

/// Arguments for the merge command
#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Per-worker coverage profile files (one per worker process)
    #[arg(required = true)]
    pub profiles: Vec<PathBuf>,

    /// Package the workers were measuring
    #[arg(short, long)]
    pub package: String,

    /// Cross-package coverage scope (comma-separated package list)
    #[arg(long, value_delimiter = ',')]
    pub coverpkg: Vec<String>,

    /// Custom name for the merged profile file
    #[arg(long)]
    pub coverprofile: Option<String>,

    /// Shared output directory (created if missing)
    #[arg(long)]
    pub outputdir: Option<PathBuf>,

    /// Merge into an existing same-named destination file instead of
    /// replacing it
    #[arg(long)]
    pub append: bool,

    /// The package's own directory (default destination)
    #[arg(long, default_value = ".")]
    pub package_dir: PathBuf,
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Merged coverage profile to summarize
    pub profile: PathBuf,

    /// Restrict the aggregate figure to these packages
    /// (comma-separated; defaults to every package in the profile)
    #[arg(long, value_delimiter = ',')]
    pub coverpkg: Vec<String>,

    /// Emit the summary as JSON instead of the report line
    #[arg(long)]
    pub json: bool,
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Detect terminal support
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
