//! Cache population from remote listings.
//!
//! The indexing engine only consumes the cache contract ("one directory
//! per normalized address, descriptor files inside"); this module is one
//! way to satisfy it. GitHub-hosted repositories are walked through the
//! REST API so only descriptor files are downloaded. Everything else is
//! emitted as a shallow-clone plan for an external runner.

use crate::paths::{INFO_FILE, cache_dir};
use anyhow::{Context, Result, anyhow, bail};
use cogindex_schema::RepoSource;
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Top-level folders that are never cogs.
const IGNORED_FOLDERS: &[&str] = &[".github"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRIES: usize = 2;

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    name: String,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Tree {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Walks GitHub repositories through the REST API and materializes their
/// descriptor files into the cache.
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
    raw_base: String,
}

impl Fetcher {
    /// Build a fetcher. `token` is attached to API requests when present;
    /// unauthenticated walks work but rate-limit quickly.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
        })
    }

    /// Override the API and raw-content endpoints (tests).
    pub fn with_bases(mut self, api_base: impl Into<String>, raw_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.raw_base = raw_base.into();
        self
    }

    /// Populate the cache for every source, `concurrency` repositories at
    /// a time. Returns the per-address failures; a failed fetch leaves
    /// that address's cache directory absent, which the discoverer
    /// reports as a normal per-location error.
    pub async fn populate_cache(
        &self,
        sources: &[RepoSource],
        cache_root: &Path,
        concurrency: usize,
    ) -> Vec<(String, anyhow::Error)> {
        futures::stream::iter(sources.iter().map(|source| async move {
            let result = self.fetch_repo(source, cache_root).await;
            (source, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(source, result)| async move {
            match result {
                Ok(()) => {
                    println!("    {}", source.normalized);
                    None
                }
                Err(e) => Some((source.normalized.clone(), e)),
            }
        })
        .collect()
        .await
    }

    /// Walk one repository and write its descriptor files into the cache.
    async fn fetch_repo(&self, source: &RepoSource, cache_root: &Path) -> Result<()> {
        let Some((owner, repo)) = source.owner_repo.split_once('/') else {
            bail!("source {} has no owner/name pair", source.normalized);
        };

        let branch = match &source.branch {
            Some(branch) => branch.clone(),
            None => {
                let info: RepoInfo = self
                    .get_json(&format!("{}/repos/{owner}/{repo}", self.api_base))
                    .await
                    .context("could not look up default branch")?;
                info.default_branch
            }
        };

        let branches: Vec<BranchInfo> = self
            .get_json(&format!("{}/repos/{owner}/{repo}/branches", self.api_base))
            .await
            .context("could not list branches")?;
        let sha = branches
            .into_iter()
            .find(|b| b.name == branch)
            .map(|b| b.commit.sha)
            .ok_or_else(|| anyhow!("branch {branch} not found"))?;

        let tree: Tree = self
            .get_json(&format!(
                "{}/repos/{owner}/{repo}/git/trees/{sha}",
                self.api_base
            ))
            .await
            .context("could not fetch file tree")?;

        let mut has_root_descriptor = false;
        let mut cog_folders = Vec::new();
        for entry in tree.tree {
            if entry.path == INFO_FILE && entry.kind == "blob" {
                has_root_descriptor = true;
            } else if entry.kind == "tree"
                && !entry.path.contains('/')
                && !IGNORED_FOLDERS.contains(&entry.path.as_str())
            {
                cog_folders.push(entry.path);
            }
        }
        if !has_root_descriptor {
            bail!("repository has no root {INFO_FILE}");
        }
        if cog_folders.is_empty() {
            bail!("repository has no cog folders");
        }

        let repo_dir = cache_dir(cache_root, source);
        std::fs::create_dir_all(&repo_dir)?;

        let raw_base = format!("{}/{owner}/{repo}/{branch}", self.raw_base);
        let root = self
            .get_raw(&format!("{raw_base}/{INFO_FILE}"))
            .await?
            .ok_or_else(|| anyhow!("root {INFO_FILE} disappeared between tree walk and download"))?;
        serde_json::from_slice::<serde_json::Value>(&root)
            .context("root descriptor is not valid json")?;
        std::fs::write(repo_dir.join(INFO_FILE), &root)?;

        for folder in cog_folders {
            let Some(body) = self
                .get_raw(&format!("{raw_base}/{folder}/{INFO_FILE}"))
                .await?
            else {
                // Folders without a descriptor are simply not cogs.
                continue;
            };
            if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
                tracing::warn!(repo = %source.normalized, %folder, "skipping cog with invalid descriptor");
                continue;
            }
            let cog_dir = repo_dir.join(&folder);
            std::fs::create_dir_all(&cog_dir)?;
            std::fs::write(cog_dir.join(INFO_FILE), &body)?;
        }

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch raw bytes; `None` on 404.
    async fn get_raw(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.get(url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.bytes().await?.to_vec()))
    }

    /// GET with auth header and a small retry on transport or server
    /// errors.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;
        for attempt in 0..=RETRIES {
            let mut request = self.client.get(url);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("token {token}"));
            }
            match request.send().await {
                Ok(response) if response.status().is_server_error() => {
                    last_error = Some(anyhow!("{} returned {}", url, response.status()));
                }
                Ok(response) => return Ok(response),
                Err(e) => last_error = Some(e.into()),
            }
            if attempt < RETRIES {
                tokio::time::sleep(Duration::from_millis(250 << attempt)).await;
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("request to {url} failed")))
    }
}

/// Shallow-clone plan for sources the API walk does not cover.
///
/// One `git clone --depth=1` line per source, branch-aware, cloning into
/// the same cache directory the discoverer will read.
pub fn clone_plan(sources: &[RepoSource], cache_root: &Path) -> String {
    let mut plan = String::new();
    for source in sources {
        let dest = cache_dir(cache_root, source);
        match &source.branch {
            Some(branch) => plan.push_str(&format!(
                "git clone --depth=1 {} --branch {branch} --single-branch {}\n",
                source.clone_url(),
                dest.display()
            )),
            None => plan.push_str(&format!(
                "git clone --depth=1 {} {}\n",
                source.clone_url(),
                dest.display()
            )),
        }
    }
    plan
}
