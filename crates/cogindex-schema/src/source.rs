use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Provenance bucket a repository was declared under in the source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Listed under the `approved` key.
    Approved,
    /// Listed under the `unapproved` key.
    Unapproved,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Unapproved => write!(f, "unapproved"),
        }
    }
}

/// A parsed and normalized repository address.
///
/// Declared addresses look like `https://example.com/org/pkg`, optionally
/// pinned to a branch with an `@` suffix on the final segment and
/// optionally carrying a trailing slash. Parsing is positional: segment 3
/// is the owner, segment 4 is `name[@branch]`.
///
/// # Example
///
/// ```
/// use cogindex_schema::RepoSource;
///
/// let src = RepoSource::parse("https://example.com/org/pkg@dev/").unwrap();
/// assert_eq!(src.normalized, "https://example.com/org/pkg@dev");
/// assert_eq!(src.name, "pkg");
/// assert_eq!(src.branch.as_deref(), Some("dev"));
/// assert_eq!(src.owner_repo, "org/pkg");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSource {
    /// The address exactly as declared in the source list.
    pub address: String,
    /// Address with the branch suffix re-attached and trailing slashes
    /// stripped. Two addresses that normalize identically are the same
    /// repository.
    pub normalized: String,
    /// Display name (final path segment, branch suffix removed).
    pub name: String,
    /// Branch/ref pin, when the address carried one.
    pub branch: Option<String>,
    /// `owner/name` pair, used for ban-list matching.
    pub owner_repo: String,
}

/// Normalize a declared address without parsing it: collapse `/@` to `@`
/// and strip trailing slashes.
///
/// [`RepoSource::parse`] applies the same transform; this standalone form
/// exists so addresses that fail positional parsing can still be keyed
/// consistently (for error reports and catalog fallback lookups).
pub fn normalize_address(address: &str) -> String {
    address.replace("/@", "@").trim_end_matches('/').to_string()
}

impl RepoSource {
    /// Parse a declared address into its components.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address has fewer than five
    /// `/`-separated segments or an empty owner or name. Callers record
    /// this on the repository record rather than aborting the run.
    pub fn parse(address: &str) -> Result<Self, String> {
        let segments: Vec<&str> = address.split('/').collect();
        if segments.len() < 5 {
            return Err(format!(
                "address '{address}' does not have enough segments to be a repository url"
            ));
        }
        let owner = segments[3];
        let raw_name = segments[4];

        let (name, branch) = match raw_name.split_once('@') {
            Some((n, b)) if !b.is_empty() => (n, Some(b.to_string())),
            Some((n, _)) => (n, None),
            None => (raw_name, None),
        };
        let name = name.trim_end_matches('/');

        if owner.is_empty() || name.is_empty() {
            return Err(format!("address '{address}' has an empty owner or name"));
        }

        // "url/@branch" and "url@branch" normalize identically.
        let normalized = normalize_address(address);

        Ok(Self {
            address: address.to_string(),
            normalized,
            name: name.to_string(),
            branch,
            owner_repo: format!("{owner}/{name}"),
        })
    }

    /// The address without its branch pin, suitable for `git clone`.
    pub fn clone_url(&self) -> String {
        match &self.branch {
            Some(branch) => self
                .normalized
                .strip_suffix(&format!("@{branch}"))
                .unwrap_or(&self.normalized)
                .to_string(),
            None => self.normalized.clone(),
        }
    }

    /// Stable identity of this source: SHA-256 hex of the normalized
    /// address. Names the cache directory and keys the metadata store.
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.normalized.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for RepoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.normalized)
    }
}
