//! Catalog assembly and emission.
//!
//! Turns surviving repository records into the published catalog, merges
//! in previously published entries for addresses that failed this run,
//! and writes the three output serializations plus the error report.

use crate::config::Policy;
use crate::curate;
use crate::discovery::{Discoverer, RepoRecord};
use crate::metadata::MetadataStore;
use crate::paths;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cogindex_schema::catalog::{self, Catalog, CogEntry, RepoEntry};
use cogindex_schema::normalize_address;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::SourceList;

/// Build the publishable catalog from surviving records.
///
/// Errored records and cogs are skipped; callers normally drop them
/// before this point via [`curate::drop_errored`].
pub fn build_catalog(repos: &[RepoRecord]) -> Catalog {
    let mut catalog = Catalog::new();
    for repo in repos {
        let Some(source) = &repo.source else { continue };
        if repo.error.is_some() {
            continue;
        }
        let cogs = repo
            .cogs
            .values()
            .filter(|cog| cog.error.is_none())
            .map(|cog| {
                let d = &cog.descriptor;
                let entry = CogEntry {
                    author: d.author.clone(),
                    description: d.description.clone(),
                    end_user_data_statement: d.end_user_data_statement.clone(),
                    short: d.short.clone(),
                    permissions: d.permissions.clone(),
                    min_bot_version: d.min_bot_version.clone(),
                    max_bot_version: d.max_bot_version.clone(),
                    min_python_version: d.min_python_version.clone(),
                    hidden: d.hidden,
                    disabled: d.disabled,
                    required_cogs: d.required_cogs.clone(),
                    requirements: d.requirements.clone(),
                    tags: d.tags.clone(),
                    kind: d.kind.clone(),
                    added_at: cog.added_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    last_updated_at: cog
                        .last_updated_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default(),
                };
                (cog.name.clone(), entry)
            })
            .collect();
        catalog.insert(
            source.normalized.clone(),
            RepoEntry {
                category: repo.category,
                name: source.name.clone(),
                branch: source.branch.clone().unwrap_or_default(),
                author: repo.author.clone(),
                description: repo.description.clone(),
                short: repo.short.clone(),
                cogs,
            },
        );
    }
    catalog
}

/// Copy forward previously published entries for requested addresses that
/// dropped out of this run's catalog.
///
/// Returns the addresses that were carried forward. This keeps the public
/// index degrading gracefully on transient fetch failures instead of
/// dropping entries.
pub fn merge_previous(
    catalog: &mut Catalog,
    previous: &Catalog,
    requested: &[String],
) -> Vec<String> {
    let mut carried = Vec::new();
    for address in requested {
        if catalog.contains_key(address) {
            continue;
        }
        if let Some(entry) = previous.get(address) {
            tracing::warn!(%address, "carrying forward previously published entry");
            catalog.insert(address.clone(), entry.clone());
            carried.push(address.clone());
        }
    }
    carried
}

/// Write the catalog trio (pretty, minified, gzipped minified) and the
/// error report into `out_dir`.
///
/// All three catalog files represent the same logical structure; the
/// gzip member is the minified bytes compressed at the highest level.
pub fn write_outputs(out_dir: &Path, catalog: &Catalog, report_text: &str) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

    let pretty = catalog::to_pretty_json(catalog)?;
    let minified = catalog::to_minified_json(catalog)?;

    std::fs::write(paths::pretty_file(out_dir), &pretty)?;
    std::fs::write(paths::minified_file(out_dir), &minified)?;

    let gz_file = std::fs::File::create(paths::gzip_file(out_dir))?;
    let mut encoder = GzEncoder::new(gz_file, Compression::best());
    encoder.write_all(minified.as_bytes())?;
    encoder.finish()?;

    std::fs::write(paths::error_file(out_dir), report_text)?;
    Ok(())
}

/// Parameters for one indexing run.
#[derive(Debug)]
pub struct IndexRun<'a> {
    /// The declared source list.
    pub sources: &'a SourceList,
    /// Cache root populated by the fetcher.
    pub cache_root: &'a Path,
    /// Output directory for the catalog trio and error report.
    pub out_dir: &'a Path,
    /// Location of the persisted metadata store.
    pub metadata_path: &'a Path,
    /// Cross-cutting policy knobs.
    pub policy: Policy,
    /// How many repositories to discover concurrently.
    pub concurrency: usize,
}

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// Entries in the published catalog, fallback included.
    pub published: usize,
    /// Entries copied forward from the previous catalog.
    pub carried_forward: usize,
    /// Addresses present in the error report.
    pub errored: usize,
    /// Whether catalog files were written at all.
    pub wrote_output: bool,
}

/// Drive a full indexing run: discover, update metadata, curate, build,
/// merge, emit.
///
/// `now` is captured once by the caller and threaded through every
/// timestamp decision, so a run is deterministic given its inputs.
///
/// # Errors
///
/// Returns an error on run-level failures only: an unreadable metadata
/// store, or output IO failures. Per-repository and per-cog problems land
/// in the error report instead.
pub async fn run_index(run: &IndexRun<'_>, now: DateTime<Utc>) -> Result<RunSummary> {
    let store = MetadataStore::load(run.metadata_path)?;
    let store = Arc::new(Mutex::new(store));

    let declared = run.sources.declared();
    println!("  discovering {} repositories", declared.len());

    let requested: Vec<String> = declared
        .iter()
        .map(|(_, address)| normalize_address(address))
        .collect();

    let discoverer = Discoverer::new(run.cache_root, run.policy);
    let records = discoverer
        .discover_all(declared, store.clone(), now, run.concurrency)
        .await;

    let report = curate::collect_errors(&records);
    let report_text = curate::render_report(&report)?;
    let mut survivors = curate::drop_errored(records);

    // Metadata is finalized and saved before ban filtering: bans affect
    // what is published, not what exists.
    {
        let mut guard = store.lock().await;
        guard.finalize_run(now);
        guard.save(run.metadata_path)?;
    }

    curate::apply_ban_list(
        &mut survivors,
        &run.sources.flagged_cogs(),
        run.policy.ban_match,
    );

    let mut catalog = build_catalog(&survivors);

    let previous_path = paths::minified_file(run.out_dir);
    let previous = if previous_path.is_file() {
        match catalog::load(&previous_path) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!("failed to load previous catalog: {e}");
                Catalog::new()
            }
        }
    } else {
        Catalog::new()
    };
    let carried = merge_previous(&mut catalog, &previous, &requested);

    let summary = RunSummary {
        published: catalog.len(),
        carried_forward: carried.len(),
        errored: report.len(),
        wrote_output: !catalog.is_empty(),
    };

    if summary.wrote_output {
        write_outputs(run.out_dir, &catalog, &report_text)?;
    }

    println!(
        "  index complete, {} published, {} carried forward, {} errored",
        summary.published, summary.carried_forward, summary.errored
    );
    Ok(summary)
}
