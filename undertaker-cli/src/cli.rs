//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "undertaker")]
#[command(about = "Reclaims stopped containers and unused images", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which containers and images would be removed
    Plan(PlanArgs),

    /// Remove stopped containers and unused images
    Reap(ReapArgs),

    /// Validate exclude and include patterns without contacting the runtime
    Check(PolicyArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Container exclude pattern (repeatable)
    #[arg(long = "cexc", value_name = "REGEX")]
    pub container_excludes: Vec<String>,

    /// Image exclude pattern (repeatable)
    #[arg(long = "iexc", value_name = "REGEX")]
    pub image_excludes: Vec<String>,

    /// Container include pattern (repeatable)
    #[arg(long = "cinc", value_name = "REGEX")]
    pub container_includes: Vec<String>,

    /// Image include pattern (repeatable)
    #[arg(long = "iinc", value_name = "REGEX")]
    pub image_includes: Vec<String>,

    /// Read container excludes from file
    #[arg(long = "filecexc", value_name = "FILE")]
    pub container_excludes_file: Option<PathBuf>,

    /// Read image excludes from file
    #[arg(long = "fileiexc", value_name = "FILE")]
    pub image_excludes_file: Option<PathBuf>,

    /// Read container includes from file
    #[arg(long = "filecinc", value_name = "FILE")]
    pub container_includes_file: Option<PathBuf>,

    /// Read image includes from file
    #[arg(long = "fileiinc", value_name = "FILE")]
    pub image_includes_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Docker endpoint (unix://, tcp:// or http://)
    #[arg(long, env = "DOCKER_HOST", value_name = "URL")]
    pub host: Option<String>,

    /// Classify a saved JSON snapshot instead of a live runtime (overrides --host)
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Seconds a container must have been stopped before it is removed
    #[arg(long, default_value = "3600", value_name = "SECS")]
    pub wait: u64,

    /// Reference time as RFC 3339 (default: now)
    #[arg(long, value_name = "TIME")]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the full classification as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReapArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Only show what would be removed
    #[arg(long)]
    pub dry_run: bool,

    /// Confirm removal
    #[arg(short, long)]
    pub yes: bool,

    /// Also remove anonymous volumes of removed containers
    #[arg(long)]
    pub volumes: bool,
}
