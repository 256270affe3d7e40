//! Typed views of the `info.json` descriptor files.
//!
//! Every field is optional on the wire: absent keys default to empty
//! rather than failing the parse. Unknown keys are ignored, since cog
//! authors routinely carry extra metadata in their descriptors.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Repository-level `info.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoDescriptor {
    /// Repository authors.
    #[serde(default)]
    pub author: Vec<String>,
    /// Long-form description.
    #[serde(default)]
    pub description: String,
    /// One-line description.
    #[serde(default)]
    pub short: String,
}

/// Cog-level `info.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CogDescriptor {
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
    /// Cog name -> repository address of cogs this one requires.
    #[serde(default)]
    pub required_cogs: BTreeMap<String, String>,
    /// Package requirements installed alongside the cog.
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_default_to_empty() {
        let desc: CogDescriptor = serde_json::from_str("{}").unwrap();
        assert!(desc.author.is_empty());
        assert!(!desc.hidden);
        assert!(desc.required_cogs.is_empty());
        assert_eq!(desc.kind, "");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let desc: RepoDescriptor =
            serde_json::from_str(r#"{"short": "x", "install_msg": "welcome"}"#).unwrap();
        assert_eq!(desc.short, "x");
    }

    #[test]
    fn type_key_maps_to_kind() {
        let desc: CogDescriptor = serde_json::from_str(r#"{"type": "COG"}"#).unwrap();
        assert_eq!(desc.kind, "COG");
    }
}
