use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use undertaker_engine::{ClassificationResult, Classifier, Retention, Snapshot};
use undertaker_runtime::{DockerRuntime, MemoryRuntime, RuntimeBackend};

use crate::cli::{Commands, PlanArgs, SourceArgs};
use crate::config;

pub mod check;
pub mod plan;
pub mod reap;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Plan(args) => plan::execute(&args).await,
        Commands::Reap(args) => reap::execute(&args).await,
        Commands::Check(args) => check::execute(&args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_version() {
    println!("🪦 Undertaker");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Reclaims:");
    println!("  • Exited containers past the retention window");
    println!("  • Images no live or protected container uses");
}

/// Backend selected by the source flags
pub fn open_runtime(source: &SourceArgs, remove_volumes: bool) -> Result<Arc<dyn RuntimeBackend>> {
    if let Some(path) = &source.snapshot {
        return Ok(Arc::new(MemoryRuntime::new(load_snapshot(path)?)));
    }

    let runtime = DockerRuntime::connect(source.host.as_deref())
        .context("Failed to connect to the container runtime")?
        .with_remove_volumes(remove_volumes);
    Ok(Arc::new(runtime))
}

fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid snapshot {}", path.display()))
}

/// Reference clock for the retention window
pub fn reference_time(source: &SourceArgs) -> Result<SystemTime> {
    match &source.now {
        Some(text) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(text)
                .with_context(|| format!("Invalid --now timestamp: {text}"))?;
            Ok(SystemTime::from(parsed))
        }
        None => Ok(SystemTime::now()),
    }
}

/// Compile policies, fetch a snapshot and classify it
pub async fn classify(
    args: &PlanArgs,
    runtime: &dyn RuntimeBackend,
) -> Result<ClassificationResult> {
    let policies = config::build_policies(&args.policy)?;
    let now = reference_time(&args.source)?;
    let classifier = Classifier::new(policies, Retention::from_secs(args.source.wait));

    let snapshot = runtime
        .snapshot()
        .await
        .context("Failed to fetch containers and images")?;

    Ok(classifier.classify(&snapshot, now))
}
