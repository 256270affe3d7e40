//! Repository discovery: cache directory -> validated records.
//!
//! Each declared address is processed independently. An error on one cog
//! never affects its siblings or the parent repository; an error on a
//! repository aborts only that repository's remaining steps. Nothing in
//! here aborts the run.

use crate::config::Policy;
use crate::error::DiscoveryError;
use crate::metadata::MetadataStore;
use crate::paths::{INFO_FILE, MARKER_FILE, cache_dir};
use chrono::{DateTime, Utc};
use cogindex_schema::{Category, CogDescriptor, RepoDescriptor, RepoSource};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One discovered repository, rebuilt from scratch every run.
#[derive(Debug)]
pub struct RepoRecord {
    /// Provenance bucket from the source list.
    pub category: Category,
    /// Address exactly as declared.
    pub address: String,
    /// Parsed source; `None` when the address failed to parse.
    pub source: Option<RepoSource>,
    /// Repository authors from the root descriptor.
    pub author: Vec<String>,
    /// Long description from the root descriptor.
    pub description: String,
    /// Short description from the root descriptor.
    pub short: String,
    /// Cog name -> record. Name collisions overwrite, last write wins.
    pub cogs: BTreeMap<String, CogRecord>,
    /// Validation failure; once set, the record is inert.
    pub error: Option<DiscoveryError>,
}

impl RepoRecord {
    fn errored(category: Category, address: &str, error: DiscoveryError) -> Self {
        Self {
            category,
            address: address.to_string(),
            source: None,
            author: Vec::new(),
            description: String::new(),
            short: String::new(),
            cogs: BTreeMap::new(),
            error: Some(error),
        }
    }

    /// Key this record is reported and published under: the normalized
    /// address when the address parsed, the declared one otherwise.
    pub fn key(&self) -> &str {
        self.source
            .as_ref()
            .map_or(self.address.as_str(), |s| s.normalized.as_str())
    }
}

/// One discovered cog.
#[derive(Debug)]
pub struct CogRecord {
    /// Cache subdirectory name.
    pub name: String,
    /// Declared metadata from the cog's descriptor.
    pub descriptor: CogDescriptor,
    /// First observation, from the metadata store.
    pub added_at: Option<DateTime<Utc>>,
    /// Last content change, from the metadata store.
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Validation failure; an errored cog is excluded from output.
    pub error: Option<DiscoveryError>,
}

impl CogRecord {
    fn errored(name: &str, error: DiscoveryError) -> Self {
        Self {
            name: name.to_string(),
            descriptor: CogDescriptor::default(),
            added_at: None,
            last_updated_at: None,
            error: Some(error),
        }
    }
}

/// Walks cache directories and builds repository records.
#[derive(Debug)]
pub struct Discoverer {
    cache_root: PathBuf,
    policy: Policy,
}

impl Discoverer {
    /// A discoverer reading from `cache_root` under the given policy.
    pub fn new(cache_root: impl Into<PathBuf>, policy: Policy) -> Self {
        Self {
            cache_root: cache_root.into(),
            policy,
        }
    }

    /// Discover every declared address, fanning out up to `concurrency`
    /// repositories at a time. The store serializes observation writes;
    /// hashing and descriptor reads run concurrently.
    pub async fn discover_all(
        &self,
        declared: Vec<(Category, String)>,
        store: Arc<Mutex<MetadataStore>>,
        now: DateTime<Utc>,
        concurrency: usize,
    ) -> Vec<RepoRecord> {
        futures::stream::iter(
            declared
                .into_iter()
                .map(|(category, address)| self.discover_one(category, address, store.clone(), now)),
        )
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
    }

    /// Discover a single declared address.
    pub async fn discover_one(
        &self,
        category: Category,
        address: String,
        store: Arc<Mutex<MetadataStore>>,
        now: DateTime<Utc>,
    ) -> RepoRecord {
        let source = match RepoSource::parse(&address) {
            Ok(source) => source,
            Err(reason) => {
                return RepoRecord::errored(category, &address, DiscoveryError::AddressParse(reason));
            }
        };

        let repo_dir = cache_dir(&self.cache_root, &source);
        if !repo_dir.is_dir() {
            return RepoRecord::errored(category, &address, DiscoveryError::CacheAbsent);
        }

        let descriptor: RepoDescriptor = match read_descriptor(&repo_dir) {
            Ok(descriptor) => descriptor,
            Err(error) => return RepoRecord::errored(category, &address, error),
        };

        let normalized = source.normalized.clone();
        let mut record = RepoRecord {
            category,
            address,
            source: Some(source),
            author: descriptor.author,
            description: descriptor.description,
            short: descriptor.short,
            cogs: BTreeMap::new(),
            error: None,
        };

        let candidates = match candidate_cog_dirs(&repo_dir) {
            Ok(candidates) => candidates,
            Err(error) => {
                record.error = Some(error);
                return record;
            }
        };
        if candidates.is_empty() {
            record.error = Some(DiscoveryError::NoValidCogs);
            return record;
        }

        for dir in candidates {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let cog = self.discover_cog(&name, &dir, &normalized, &store, now).await;
            record.cogs.insert(name, cog);
        }

        record
    }

    async fn discover_cog(
        &self,
        name: &str,
        dir: &Path,
        normalized: &str,
        store: &Arc<Mutex<MetadataStore>>,
        now: DateTime<Utc>,
    ) -> CogRecord {
        let descriptor: CogDescriptor = match read_descriptor(dir) {
            Ok(descriptor) => descriptor,
            Err(error) => return CogRecord::errored(name, error),
        };

        if self.policy.require_marker && !dir.join(MARKER_FILE).is_file() {
            return CogRecord::errored(
                name,
                DiscoveryError::MarkerMissing {
                    descriptor: INFO_FILE,
                    marker: MARKER_FILE,
                },
            );
        }

        let hashes = match crate::hashing::hash_tree(dir) {
            Ok(hashes) => hashes,
            Err(error) => return CogRecord::errored(name, error),
        };

        let mut guard = store.lock().await;
        match guard.repo(normalized).observe_cog(name, hashes, now) {
            Ok(meta) => CogRecord {
                name: name.to_string(),
                descriptor,
                added_at: Some(meta.added_at),
                last_updated_at: Some(meta.last_updated_at),
                error: None,
            },
            Err(error) => CogRecord::errored(name, error),
        }
    }
}

/// Read and parse the descriptor file inside `dir`.
fn read_descriptor<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<T, DiscoveryError> {
    let path = dir.join(INFO_FILE);
    if !path.is_file() {
        return Err(DiscoveryError::DescriptorMissing(INFO_FILE));
    }
    let content = std::fs::read_to_string(&path).map_err(|e| DiscoveryError::DescriptorInvalid {
        file: INFO_FILE,
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| DiscoveryError::DescriptorInvalid {
        file: INFO_FILE,
        reason: e.to_string(),
    })
}

/// Immediate subdirectories that contain their own descriptor file.
///
/// Hidden directories are excluded; directories without a descriptor are
/// silently ignored. Sorted by name for deterministic processing.
fn candidate_cog_dirs(repo_dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut dirs = Vec::new();
    let entries =
        std::fs::read_dir(repo_dir).map_err(|e| DiscoveryError::io(repo_dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::io(repo_dir.to_path_buf(), e))?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if path.is_dir() && !hidden && path.join(INFO_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    const ADDRESS: &str = "https://example.com/org/pkg";

    fn seeded_cache() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let source = RepoSource::parse(ADDRESS).unwrap();
        let repo_dir = cache_dir(tmp.path(), &source);
        fs::create_dir_all(repo_dir.join("alpha")).unwrap();
        fs::create_dir_all(repo_dir.join("beta")).unwrap();
        fs::create_dir_all(repo_dir.join(".github")).unwrap();
        fs::create_dir_all(repo_dir.join("not-a-cog")).unwrap();
        fs::write(
            repo_dir.join(INFO_FILE),
            r#"{"author": ["someone"], "description": "d", "short": "s"}"#,
        )
        .unwrap();
        fs::write(
            repo_dir.join("alpha").join(INFO_FILE),
            r#"{"description": "first cog", "tags": ["fun"]}"#,
        )
        .unwrap();
        fs::write(repo_dir.join("alpha").join("alpha.py"), "print()").unwrap();
        fs::write(repo_dir.join("beta").join(INFO_FILE), r#"{"hidden": true}"#).unwrap();
        fs::write(repo_dir.join(".github").join(INFO_FILE), "{}").unwrap();
        tmp
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    async fn discover(tmp: &TempDir, policy: Policy) -> RepoRecord {
        let store = Arc::new(Mutex::new(MetadataStore::default()));
        Discoverer::new(tmp.path(), policy)
            .discover_one(Category::Approved, ADDRESS.to_string(), store, now())
            .await
    }

    #[tokio::test]
    async fn discovers_cogs_and_loads_descriptors() {
        let tmp = seeded_cache();
        let record = discover(&tmp, Policy::default()).await;
        assert!(record.error.is_none());
        assert_eq!(record.author, vec!["someone".to_string()]);
        // Hidden dirs and descriptor-less dirs are not candidates.
        assert_eq!(
            record.cogs.keys().cloned().collect::<Vec<_>>(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
        let alpha = &record.cogs["alpha"];
        assert!(alpha.error.is_none());
        assert_eq!(alpha.descriptor.description, "first cog");
        assert_eq!(alpha.added_at, Some(now()));
    }

    #[tokio::test]
    async fn unparseable_address_is_an_inert_error_record() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(Mutex::new(MetadataStore::default()));
        let record = Discoverer::new(tmp.path(), Policy::default())
            .discover_one(Category::Approved, "garbage".to_string(), store, now())
            .await;
        assert!(matches!(record.error, Some(DiscoveryError::AddressParse(_))));
        assert_eq!(record.key(), "garbage");
        assert!(record.cogs.is_empty());
    }

    #[tokio::test]
    async fn missing_cache_directory_is_reported() {
        let tmp = TempDir::new().unwrap();
        let record = discover(&tmp, Policy::default()).await;
        assert!(matches!(record.error, Some(DiscoveryError::CacheAbsent)));
    }

    #[tokio::test]
    async fn missing_root_descriptor_is_reported() {
        let tmp = TempDir::new().unwrap();
        let source = RepoSource::parse(ADDRESS).unwrap();
        fs::create_dir_all(cache_dir(tmp.path(), &source)).unwrap();
        let record = discover(&tmp, Policy::default()).await;
        assert!(matches!(
            record.error,
            Some(DiscoveryError::DescriptorMissing(_))
        ));
    }

    #[tokio::test]
    async fn repo_with_no_candidates_is_reported() {
        let tmp = TempDir::new().unwrap();
        let source = RepoSource::parse(ADDRESS).unwrap();
        let repo_dir = cache_dir(tmp.path(), &source);
        fs::create_dir_all(repo_dir.join("empty")).unwrap();
        fs::write(repo_dir.join(INFO_FILE), "{}").unwrap();
        let record = discover(&tmp, Policy::default()).await;
        assert!(matches!(record.error, Some(DiscoveryError::NoValidCogs)));
    }

    #[tokio::test]
    async fn broken_cog_descriptor_does_not_affect_siblings() {
        let tmp = seeded_cache();
        let source = RepoSource::parse(ADDRESS).unwrap();
        let repo_dir = cache_dir(tmp.path(), &source);
        fs::write(repo_dir.join("beta").join(INFO_FILE), "{broken").unwrap();
        let record = discover(&tmp, Policy::default()).await;
        assert!(record.error.is_none());
        assert!(record.cogs["alpha"].error.is_none());
        assert!(matches!(
            record.cogs["beta"].error,
            Some(DiscoveryError::DescriptorInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn marker_policy_rejects_bare_descriptor_dirs() {
        let tmp = seeded_cache();
        let source = RepoSource::parse(ADDRESS).unwrap();
        let repo_dir = cache_dir(tmp.path(), &source);
        fs::write(repo_dir.join("alpha").join(MARKER_FILE), "").unwrap();
        let policy = Policy {
            require_marker: true,
            ..Policy::default()
        };
        let record = discover(&tmp, policy).await;
        assert!(record.cogs["alpha"].error.is_none());
        assert!(matches!(
            record.cogs["beta"].error,
            Some(DiscoveryError::MarkerMissing { .. })
        ));
    }

    #[tokio::test]
    async fn marker_failure_leaves_store_untouched() {
        let tmp = seeded_cache();
        let source = RepoSource::parse(ADDRESS).unwrap();
        let repo_dir = cache_dir(tmp.path(), &source);
        fs::write(repo_dir.join("alpha").join(MARKER_FILE), "").unwrap();
        let store = Arc::new(Mutex::new(MetadataStore::default()));
        let policy = Policy {
            require_marker: true,
            ..Policy::default()
        };
        Discoverer::new(tmp.path(), policy)
            .discover_one(Category::Approved, ADDRESS.to_string(), store.clone(), now())
            .await;
        let guard = store.lock().await;
        let repo = guard.get(ADDRESS).unwrap();
        assert!(!repo.cogs.contains_key("beta"));
    }

    #[tokio::test]
    async fn discover_all_processes_every_address() {
        let tmp = seeded_cache();
        let store = Arc::new(Mutex::new(MetadataStore::default()));
        let declared = vec![
            (Category::Approved, ADDRESS.to_string()),
            (Category::Unapproved, "https://example.com/org/missing".to_string()),
        ];
        let records = Discoverer::new(tmp.path(), Policy::default())
            .discover_all(declared, store, now(), 4)
            .await;
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.error.is_none()).count(), 1);
    }
}
