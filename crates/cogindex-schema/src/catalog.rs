//! Published catalog records.
//!
//! These structs are the output schema, enumerated field by field.
//! Nothing internal (validation state, cache paths, run flags) appears
//! here, so serializing a record can never leak engine state into the
//! published index.

use crate::source::Category;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The published index: normalized address -> repository entry.
///
/// `BTreeMap` gives stable key ordering, so repeated runs over unchanged
/// inputs serialize byte-identically.
pub type Catalog = BTreeMap<String, RepoEntry>;

/// One repository in the published catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Provenance bucket (`approved` / `unapproved`).
    pub category: Category,
    /// Display name.
    pub name: String,
    /// Branch pin; empty when the address was unpinned.
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short: String,
    /// Cog name -> cog entry.
    #[serde(default)]
    pub cogs: BTreeMap<String, CogEntry>,
}

/// One cog in the published catalog.
///
/// Descriptor fields are mirrored verbatim; the two timestamps come from
/// the metadata store, not from the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogEntry {
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub end_user_data_statement: String,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub min_bot_version: String,
    #[serde(default)]
    pub max_bot_version: String,
    #[serde(default)]
    pub min_python_version: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub required_cogs: BTreeMap<String, String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// First observation, ISO-8601.
    pub added_at: String,
    /// Last content change, ISO-8601.
    pub last_updated_at: String,
}

/// Load a previously published catalog from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid catalog.
/// A missing or corrupt previous catalog is not fatal to an indexing run;
/// callers degrade to an empty previous set.
pub fn load(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Serialize a catalog in indented form, for QA reading.
pub fn to_pretty_json(catalog: &Catalog) -> Result<String> {
    Ok(serde_json::to_string_pretty(catalog)?)
}

/// Serialize a catalog in compact form, for consumer download.
pub fn to_minified_json(catalog: &Catalog) -> Result<String> {
    Ok(serde_json::to_string(catalog)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> RepoEntry {
        RepoEntry {
            category: Category::Approved,
            name: "pkg".into(),
            branch: "dev".into(),
            author: vec!["someone".into()],
            description: "a repo".into(),
            short: String::new(),
            cogs: BTreeMap::new(),
        }
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&sample_entry()).unwrap();
        assert!(json.contains(r#""category":"approved""#));
    }

    #[test]
    fn minified_and_pretty_agree_on_content() {
        let mut catalog = Catalog::new();
        catalog.insert("https://example.com/org/pkg@dev".into(), sample_entry());
        let pretty: Catalog = serde_json::from_str(&to_pretty_json(&catalog).unwrap()).unwrap();
        let min: Catalog = serde_json::from_str(&to_minified_json(&catalog).unwrap()).unwrap();
        assert_eq!(pretty, min);
    }

    #[test]
    fn kind_field_serializes_as_type() {
        let entry = CogEntry {
            author: vec![],
            description: String::new(),
            end_user_data_statement: String::new(),
            short: String::new(),
            permissions: vec![],
            min_bot_version: String::new(),
            max_bot_version: String::new(),
            min_python_version: String::new(),
            hidden: false,
            disabled: false,
            required_cogs: BTreeMap::new(),
            requirements: vec![],
            tags: vec![],
            kind: "COG".into(),
            added_at: "2024-01-01T00:00:00+00:00".into(),
            last_updated_at: "2024-01-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""type":"COG""#));
        assert!(!json.contains("kind"));
    }
}
