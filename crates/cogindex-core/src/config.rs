//! The human-authored source list and run policy.

use anyhow::{Context, Result};
use cogindex_schema::Category;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// The curated list of repository addresses, loaded from YAML.
///
/// All three keys may be null or absent; an empty document is a valid,
/// empty source list.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SourceList {
    #[serde(default)]
    approved: Option<Vec<String>>,
    #[serde(default)]
    unapproved: Option<Vec<String>>,
    /// Address substring -> cog names banned from that repository.
    #[serde(default, rename = "flagged-cogs")]
    flagged_cogs: Option<BTreeMap<String, Vec<String>>>,
}

impl SourceList {
    /// Load a source list from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source list {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("failed to parse source list {}", path.display()))
    }

    /// Every declared address with its provenance bucket, approved first.
    pub fn declared(&self) -> Vec<(Category, String)> {
        let bucket = |list: &Option<Vec<String>>, category: Category| {
            list.iter()
                .flatten()
                .map(|addr| (category, addr.clone()))
                .collect::<Vec<_>>()
        };
        let mut out = bucket(&self.approved, Category::Approved);
        out.extend(bucket(&self.unapproved, Category::Unapproved));
        out
    }

    /// The flagged-cog mapping, empty when the key was null or absent.
    pub fn flagged_cogs(&self) -> BTreeMap<String, Vec<String>> {
        self.flagged_cogs.clone().unwrap_or_default()
    }
}

/// Which side of the ban-list comparison is the substring.
///
/// Matching is deliberately loose (substring, not equality) so that
/// trailing slashes and branch suffixes in the flagged key still match
/// the repository they target. The source history disagrees on the
/// direction, so both are supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BanMatch {
    /// The repository's `owner/name` pair appears inside the flagged key.
    #[default]
    OwnerWithinKey,
    /// The flagged key appears inside the repository's `owner/name` pair.
    KeyWithinOwner,
}

/// Cross-cutting policy knobs for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Require the marker file inside each cog directory. Off by default:
    /// caches populated from a remote API listing only contain descriptor
    /// files, so the marker never lands on disk there.
    pub require_marker: bool,
    /// Ban-list matching direction.
    pub ban_match: BanMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_keys_are_empty() {
        let list: SourceList = serde_yaml_ng::from_str("approved:\nunapproved:\nflagged-cogs:\n")
            .unwrap();
        assert!(list.declared().is_empty());
        assert!(list.flagged_cogs().is_empty());
    }

    #[test]
    fn declared_keeps_bucket_order() {
        let list: SourceList = serde_yaml_ng::from_str(
            "approved:\n  - https://example.com/a/one\nunapproved:\n  - https://example.com/b/two\n",
        )
        .unwrap();
        let declared = list.declared();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared[0].0, Category::Approved);
        assert_eq!(declared[1].0, Category::Unapproved);
    }

    #[test]
    fn flagged_cogs_parse() {
        let list: SourceList = serde_yaml_ng::from_str(
            "flagged-cogs:\n  https://example.com/org/pkg/:\n    - badcog\n",
        )
        .unwrap();
        let flagged = list.flagged_cogs();
        assert_eq!(
            flagged.get("https://example.com/org/pkg/").map(Vec::as_slice),
            Some(["badcog".to_string()].as_slice())
        );
    }
}
