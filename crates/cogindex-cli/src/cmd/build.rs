//! `cogindex build` - turn the populated cache into the published catalog.

use anyhow::{Result, bail};
use chrono::Utc;
use cogindex_core::index::{IndexRun, run_index};
use cogindex_core::{BanMatch, Policy, SourceList};
use std::path::Path;

/// Run a full index build.
///
/// "Now" is captured exactly once here; every timestamp decision in the
/// run derives from it.
pub async fn build(
    config: &Path,
    cache: &Path,
    out: &Path,
    metadata: &Path,
    require_marker: bool,
    ban_match: BanMatch,
    concurrency: usize,
) -> Result<()> {
    let sources = SourceList::load(config)?;
    let now = Utc::now();

    let run = IndexRun {
        sources: &sources,
        cache_root: cache,
        out_dir: out,
        metadata_path: metadata,
        policy: Policy {
            require_marker,
            ban_match,
        },
        concurrency,
    };

    let summary = run_index(&run, now).await?;
    if !summary.wrote_output {
        bail!("no catalog produced; every declared repository failed validation");
    }
    Ok(())
}
