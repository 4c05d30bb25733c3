//! Plan command implementation

use anyhow::Result;
use undertaker_engine::ClassificationResult;

use super::{classify, open_runtime};
use crate::cli::PlanArgs;

pub async fn execute(args: &PlanArgs) -> Result<()> {
    tracing::info!(wait_secs = args.source.wait, "Planning reclamation");

    let runtime = open_runtime(&args.source, false)?;
    let result = classify(args, runtime.as_ref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_plan(&result);
    }

    Ok(())
}

/// Human-readable listing of a classification
pub fn print_plan(result: &ClassificationResult) {
    for (i, container) in result.containers.iter().enumerate() {
        println!("rm container [{i:2}]: {:>64} {}", container.id, container.name);
    }

    for (i, image) in result.images.iter().enumerate() {
        println!(
            "rm image     [{i:2}]: {:>64} [{}]",
            image.id,
            image.repo_tags.join(", ")
        );
    }

    let stats = &result.stats;
    println!("{:-<60}", "");
    println!(
        "Containers: {} to remove, {} excluded, {} retained, {} not included",
        result.containers.len(),
        stats.containers_excluded,
        stats.containers_retained,
        stats.containers_not_included
    );
    println!(
        "Images: {} to remove, {} in use, {} excluded, {} not included",
        result.images.len(),
        stats.images_in_use,
        stats.images_excluded,
        stats.images_not_included
    );

    if !result.inconsistencies.is_empty() {
        println!("Skipped {} inconsistent record(s):", stats.inconsistent);
        for inconsistency in &result.inconsistencies {
            println!(
                "  {:<12} - {}",
                inconsistency.container.short(),
                inconsistency.reason
            );
        }
    }
}
