//! Persisted lifecycle metadata for every cog ever observed.
//!
//! The store survives across runs and is the only cross-run state in the
//! pipeline. It is loaded once at run start and saved once at run end;
//! mid-run updates go through [`RepoMetadata::observe_cog`] behind the
//! caller's mutex.

use crate::error::DiscoveryError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cogindex_schema::Fingerprints;
use cogindex_schema::hash::{PREFERRED_ALGORITHMS, digest_eq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::ErrorKind;
use std::path::Path;

/// Normalized address -> per-repository metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    repos: BTreeMap<String, RepoMetadata>,
}

/// Lifecycle records for one repository's cogs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Cog name -> lifecycle record. Soft-deleted cogs stay here forever.
    #[serde(default)]
    pub cogs: BTreeMap<String, CogMetadata>,
}

/// Lifecycle record for one cog.
///
/// Invariant: `added_at <= last_updated_at`, and `deleted_at`, when set,
/// is not earlier than `last_updated_at` was at deletion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CogMetadata {
    /// First observation. Set once, never changed.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub added_at: DateTime<Utc>,
    /// Advanced only when the observed fingerprints differ from the
    /// stored ones.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_updated_at: DateTime<Utc>,
    /// Set when the cog goes missing from a run, cleared when it
    /// reappears. Records are never physically removed.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Algorithm name -> hex digest over the cog's file tree.
    pub hashes: Fingerprints,
    /// Run-scoped flag, never persisted: was this cog seen this run?
    #[serde(skip)]
    still_exists: bool,
}

impl MetadataStore {
    /// Load the store from disk. A missing file is an empty store, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed;
    /// a corrupt store must surface rather than silently resetting
    /// lifecycle history.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read metadata store {}", path.display()));
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse metadata store {}", path.display()))
    }

    /// Persist the store. Key ordering is stable, so runs that observe
    /// no changes write byte-identical output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write metadata store {}", path.display()))
    }

    /// Metadata for a repository, created empty on first sight.
    pub fn repo(&mut self, normalized: &str) -> &mut RepoMetadata {
        self.repos.entry(normalized.to_string()).or_default()
    }

    /// Look up a repository without creating it.
    pub fn get(&self, normalized: &str) -> Option<&RepoMetadata> {
        self.repos.get(normalized)
    }

    /// Soft-delete every cog record not observed this run.
    pub fn finalize_run(&mut self, now: DateTime<Utc>) {
        for repo in self.repos.values_mut() {
            for cog in repo.cogs.values_mut() {
                if !cog.still_exists && cog.deleted_at.is_none() {
                    cog.deleted_at = Some(now);
                }
            }
        }
    }
}

impl RepoMetadata {
    /// Record an observation of `name` with freshly computed fingerprints.
    ///
    /// First sight creates the record with `added_at = last_updated_at =
    /// now`. On re-observation the record is marked live, `deleted_at` is
    /// cleared, and `last_updated_at` advances iff the fingerprints
    /// changed per the comparison contract. The observed fingerprint set
    /// replaces the stored one, so a change is reported exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::HashConsistency`] when the stored and
    /// observed sets share no algorithm; that is store corruption and
    /// must not pass as "unchanged".
    pub fn observe_cog(
        &mut self,
        name: &str,
        observed: Fingerprints,
        now: DateTime<Utc>,
    ) -> Result<&CogMetadata, DiscoveryError> {
        match self.cogs.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(CogMetadata {
                    added_at: now,
                    last_updated_at: now,
                    deleted_at: None,
                    hashes: observed,
                    still_exists: true,
                });
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                record.still_exists = true;
                record.deleted_at = None;
                if !fingerprints_match(&record.hashes, &observed)? {
                    record.last_updated_at = now;
                }
                record.hashes = observed;
            }
        }
        Ok(&self.cogs[name])
    }
}

/// Compare two fingerprint sets per the change-detection contract:
/// preferred algorithms first, then any algorithm present in both sets.
///
/// # Errors
///
/// Returns [`DiscoveryError::HashConsistency`] when the sets are
/// disjoint.
fn fingerprints_match(
    stored: &Fingerprints,
    observed: &Fingerprints,
) -> Result<bool, DiscoveryError> {
    for algorithm in PREFERRED_ALGORITHMS {
        if let (Some(a), Some(b)) = (stored.get(*algorithm), observed.get(*algorithm)) {
            return Ok(digest_eq(a, b));
        }
    }
    for (algorithm, a) in stored {
        if let Some(b) = observed.get(algorithm) {
            return Ok(digest_eq(a, b));
        }
    }
    Err(DiscoveryError::HashConsistency)
}
