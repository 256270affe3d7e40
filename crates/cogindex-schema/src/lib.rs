//! cogindex-schema - wire types shared across the cog index toolchain.
//!
//! Everything that crosses a file boundary lives here: parsed repository
//! addresses, content fingerprints, descriptor files, and the published
//! catalog records. The engine crates depend on these types; nothing here
//! performs discovery or network IO.

pub mod catalog;
pub mod descriptor;
pub mod hash;
pub mod source;

pub use catalog::{Catalog, CogEntry, RepoEntry};
pub use descriptor::{CogDescriptor, RepoDescriptor};
pub use hash::{Fingerprints, HexDigest, digest_eq};
pub use source::{Category, RepoSource, normalize_address};

/// Index format protocol version.
///
/// Embedded in every generated filename (`1.json`, `1-min.json.gz`, ...)
/// so consumers can detect breaking changes to the catalog schema.
/// Increment on any breaking change to the published format.
pub const PROTOCOL: u32 = 1;
