//! Cache and output path layout.

use cogindex_schema::{PROTOCOL, RepoSource};
use std::path::{Path, PathBuf};

/// Descriptor filename, at both repository and cog level.
pub const INFO_FILE: &str = "info.json";

/// Marker file that full clones carry inside every installable cog.
pub const MARKER_FILE: &str = "__init__.py";

/// Cache directory for one repository.
///
/// The directory name is the source's identity digest, prefixed with a
/// sanitized display name for human navigation. Two addresses that
/// normalize identically always land in the same directory.
pub fn cache_dir(cache_root: &Path, source: &RepoSource) -> PathBuf {
    let safe: String = source
        .name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let safe = safe.trim_matches('.');
    let prefix = if safe.is_empty() {
        String::new()
    } else {
        format!("{safe}_")
    };
    cache_root.join(format!("{prefix}{}", source.identity()))
}

/// Pretty-printed catalog, for QA reading.
pub fn pretty_file(out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{PROTOCOL}.json"))
}

/// Minified catalog, for consumer download.
pub fn minified_file(out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{PROTOCOL}-min.json"))
}

/// Gzipped minified catalog.
pub fn gzip_file(out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{PROTOCOL}-min.json.gz"))
}

/// Error report.
pub fn error_file(out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{PROTOCOL}-errors.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_is_stable_across_address_variants() {
        let a = RepoSource::parse("https://example.com/org/pkg@dev/").unwrap();
        let b = RepoSource::parse("https://example.com/org/pkg@dev").unwrap();
        let root = Path::new("/cache");
        assert_eq!(cache_dir(root, &a), cache_dir(root, &b));
    }

    #[test]
    fn cache_dir_sanitizes_display_name() {
        let src = RepoSource::parse("https://example.com/org/we|rd*name").unwrap();
        let dir = cache_dir(Path::new("/cache"), &src);
        let name = dir.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("werdname_"));
    }

    #[test]
    fn output_names_carry_protocol_version() {
        let out = Path::new("index");
        assert_eq!(pretty_file(out), out.join(format!("{PROTOCOL}.json")));
        assert_eq!(gzip_file(out), out.join(format!("{PROTOCOL}-min.json.gz")));
    }
}
