//! Domain-specific errors for repository discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while validating one repository or cog.
///
/// All variants except [`DiscoveryError::HashConsistency`] are expected,
/// recoverable-by-exclusion conditions: the offending record is dropped
/// from the publishable catalog and written to the error report, and the
/// run continues. `HashConsistency` indicates a corrupt metadata store
/// and is fatal for the affected record, but still never aborts the run.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("could not parse address, is it a valid repository url? ({0})")]
    AddressParse(String),

    #[error("cache directory does not exist, fetch did not populate it")]
    CacheAbsent,

    #[error("no {0} found")]
    DescriptorMissing(&'static str),

    #[error("error reading {file}, possibly invalid: {reason}")]
    DescriptorInvalid { file: &'static str, reason: String },

    #[error("repository contains no valid cogs")]
    NoValidCogs,

    #[error("{descriptor} is present but no {marker} was found")]
    MarkerMissing {
        descriptor: &'static str,
        marker: &'static str,
    },

    #[error("stored and observed fingerprints share no algorithm, metadata store is inconsistent")]
    HashConsistency,

    #[error("io failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    /// Attach a path to an io error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
