//! Policy configuration from flags and pattern files

use anyhow::{Context, Result};
use std::path::Path;
use undertaker_engine::{Policies, PolicySet};

use crate::cli::PolicyArgs;

/// Patterns in a file: one per line, `#` starts a comment, blank lines are
/// skipped. A pattern therefore cannot contain `#`.
pub fn parse_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.starts_with('#') {
                return None;
            }
            let pattern = line.split('#').next().unwrap_or_default().trim();
            (!pattern.is_empty()).then(|| pattern.to_string())
        })
        .collect()
}

/// Read a pattern file
pub fn load_pattern_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pattern file {}", path.display()))?;
    let patterns = parse_patterns(&content);

    tracing::debug!(
        file = %path.display(),
        patterns = patterns.len(),
        "Loaded pattern file"
    );

    Ok(patterns)
}

/// File patterns first, then command-line ones
fn policy(kind: &str, file: Option<&Path>, inline: &[String]) -> Result<PolicySet> {
    let mut raw = match file {
        Some(path) => load_pattern_file(path)?,
        None => Vec::new(),
    };
    raw.extend(inline.iter().cloned());

    PolicySet::compile(raw).with_context(|| format!("Invalid {kind} pattern"))
}

/// Compile every configured policy; any invalid pattern aborts the run
pub fn build_policies(args: &PolicyArgs) -> Result<Policies> {
    let policies = Policies::new()
        .with_container_excludes(policy(
            "container exclude",
            args.container_excludes_file.as_deref(),
            &args.container_excludes,
        )?)
        .with_image_excludes(policy(
            "image exclude",
            args.image_excludes_file.as_deref(),
            &args.image_excludes,
        )?)
        .with_container_includes(policy(
            "container include",
            args.container_includes_file.as_deref(),
            &args.container_includes,
        )?)
        .with_image_includes(policy(
            "image include",
            args.image_includes_file.as_deref(),
            &args.image_includes,
        )?);

    tracing::debug!(
        container_excludes = policies.container_excludes.len(),
        image_excludes = policies.image_excludes.len(),
        container_includes = policies.container_includes.len(),
        image_includes = policies.image_includes.len(),
        "Policies compiled"
    );

    Ok(policies)
}
