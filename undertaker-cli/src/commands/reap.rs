//! Reap command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use undertaker_engine::ClassificationResult;
use undertaker_runtime::{ReapReport, Reaper};

use super::plan::print_plan;
use super::{classify, open_runtime};
use crate::cli::ReapArgs;

#[derive(Serialize)]
struct JsonReport<'a> {
    plan: &'a ClassificationResult,
    reaped: Option<&'a ReapReport>,
}

pub async fn execute(args: &ReapArgs) -> Result<()> {
    if !args.dry_run && !args.yes {
        anyhow::bail!("Refusing to remove anything without --yes (or use --dry-run)");
    }

    let runtime = open_runtime(&args.plan.source, args.volumes)?;
    let result = classify(&args.plan, runtime.as_ref()).await?;

    if !args.plan.json {
        print_plan(&result);
    }

    if args.dry_run || result.is_empty() {
        if args.plan.json {
            print_json(&result, None)?;
        }
        tracing::info!(dry_run = args.dry_run, "Nothing removed");
        return Ok(());
    }

    tracing::info!(
        containers = result.containers.len(),
        images = result.images.len(),
        "Removing"
    );

    let report = Reaper::new(runtime).reap(&result).await;

    if args.plan.json {
        print_json(&result, Some(&report))?;
    } else {
        println!("{:-<60}", "");
        println!(
            "✅ Removed {} container(s) and {} image(s)",
            report.containers.len(),
            report.images.len()
        );
        for failure in &report.failures {
            println!("❌ {}: {}", failure.id, failure.message);
        }
    }

    if !report.is_clean() {
        anyhow::bail!("{} removal(s) failed", report.failures.len());
    }

    Ok(())
}

fn print_json(plan: &ClassificationResult, reaped: Option<&ReapReport>) -> Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport { plan, reaped })
        .context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}
