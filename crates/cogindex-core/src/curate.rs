//! Cross-cutting policy: ban-list filtering and error aggregation.

use crate::config::BanMatch;
use crate::discovery::RepoRecord;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Remove banned cogs from every matching repository.
///
/// The flagged map is keyed by an address substring; comparison against a
/// repository goes through its `owner/name` pair rather than the full
/// address, so trailing slashes and branch suffixes on the flagged key
/// still match. Applying the same filter twice is a no-op.
pub fn apply_ban_list(
    repos: &mut [RepoRecord],
    flagged: &BTreeMap<String, Vec<String>>,
    direction: BanMatch,
) {
    for (key, banned) in flagged {
        for repo in repos.iter_mut() {
            let Some(source) = &repo.source else { continue };
            let matched = match direction {
                BanMatch::OwnerWithinKey => key.contains(&source.owner_repo),
                BanMatch::KeyWithinOwner => source.owner_repo.contains(key.as_str()),
            };
            if !matched {
                continue;
            }
            let before = repo.cogs.len();
            repo.cogs.retain(|name, _| !banned.contains(name));
            let removed = before - repo.cogs.len();
            if removed > 0 {
                tracing::debug!(
                    repo = %source.normalized,
                    removed,
                    "removed flagged cogs"
                );
            }
        }
    }
}

/// One value in the error report: a repository-level failure, or a map of
/// per-cog failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    /// The whole repository failed validation.
    Repo(String),
    /// The repository is fine; these cogs are not.
    Cogs(BTreeMap<String, String>),
}

/// Aggregate every validation failure into one report, keyed by address.
pub fn collect_errors(repos: &[RepoRecord]) -> BTreeMap<String, ReportEntry> {
    let mut report = BTreeMap::new();
    for repo in repos {
        if let Some(error) = &repo.error {
            report.insert(repo.key().to_string(), ReportEntry::Repo(error.to_string()));
            continue;
        }
        let cog_errors: BTreeMap<String, String> = repo
            .cogs
            .values()
            .filter_map(|cog| {
                cog.error
                    .as_ref()
                    .map(|e| (cog.name.clone(), e.to_string()))
            })
            .collect();
        if !cog_errors.is_empty() {
            report.insert(repo.key().to_string(), ReportEntry::Cogs(cog_errors));
        }
    }
    report
}

/// Render the report as YAML text; an empty report renders as an empty
/// string.
pub fn render_report(report: &BTreeMap<String, ReportEntry>) -> Result<String> {
    if report.is_empty() {
        return Ok(String::new());
    }
    Ok(serde_yaml_ng::to_string(report)?)
}

/// Drop errored repositories, and errored cogs inside surviving ones.
///
/// Call after [`collect_errors`]; dropped records live on only in the
/// report and in the metadata store's last-known-good state.
pub fn drop_errored(repos: Vec<RepoRecord>) -> Vec<RepoRecord> {
    repos
        .into_iter()
        .filter(|repo| repo.error.is_none())
        .map(|mut repo| {
            repo.cogs.retain(|_, cog| cog.error.is_none());
            repo
        })
        .collect()
}
