//! Check command implementation

use anyhow::Result;

use crate::cli::PolicyArgs;
use crate::config;

pub fn execute(args: &PolicyArgs) -> Result<()> {
    tracing::info!("Checking patterns");

    let policies = config::build_policies(args)?;

    println!("\n🔎 Patterns");
    println!("{:-<60}", "");
    println!("  container excludes: {}", policies.container_excludes.len());
    println!("  image excludes:     {}", policies.image_excludes.len());
    println!("  container includes: {}", policies.container_includes.len());
    println!("  image includes:     {}", policies.image_includes.len());
    println!("{:-<60}", "");
    println!("✅ All patterns compile");

    Ok(())
}
