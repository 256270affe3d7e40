//! `cogindex fetch` - populate the local cache.
//!
//! GitHub-hosted sources are walked through the API; everything else is
//! written to a shallow-clone plan for an external runner. Addresses
//! that fail to parse are skipped here; `build` reports them.

use anyhow::Result;
use cogindex_core::fetch::{Fetcher, clone_plan};
use cogindex_core::SourceList;
use cogindex_schema::RepoSource;
use std::path::Path;

/// Populate the cache and write the clone plan.
pub async fn fetch(
    config: &Path,
    cache: &Path,
    clone_plan_path: &Path,
    concurrency: usize,
) -> Result<()> {
    let sources = SourceList::load(config)?;

    let mut github = Vec::new();
    let mut other = Vec::new();
    for (_, address) in sources.declared() {
        match RepoSource::parse(&address) {
            Ok(source) if source.normalized.contains("github.com") => github.push(source),
            Ok(source) => other.push(source),
            Err(reason) => tracing::warn!(%address, %reason, "skipping unparseable address"),
        }
    }

    println!(
        "  fetching {} github repositories, {} via clone plan",
        github.len(),
        other.len()
    );

    let token = std::env::var("GITHUB_TOKEN").ok();
    if token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set, api requests are unauthenticated");
    }
    let fetcher = Fetcher::new(token)?;
    let failures = fetcher.populate_cache(&github, cache, concurrency).await;
    for (address, error) in &failures {
        println!("    {address} failed: {error:#}");
    }

    std::fs::write(clone_plan_path, clone_plan(&other, cache))?;

    println!(
        "  fetch complete, {} ok, {} failed, clone plan at {}",
        github.len() - failures.len(),
        failures.len(),
        clone_plan_path.display()
    );
    Ok(())
}
