//! cogindex - catalog builder for cog repositories.
//!
//! Two-phase operation, matching the cache contract between them:
//! `cogindex fetch` materializes declared repositories into the local
//! cache, `cogindex build` turns the cache into the published catalog.

pub mod cmd;

use clap::{Parser, Subcommand, ValueEnum};
use cogindex_core::BanMatch;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cogindex")]
#[command(author, version, about = "Build a versioned catalog of cog repositories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Populate the local cache from the declared source list
    Fetch {
        /// YAML source list (approved / unapproved / flagged-cogs)
        #[arg(long, default_value = "repositories.yaml")]
        config: PathBuf,
        /// Cache root to populate
        #[arg(long, default_value = "cache")]
        cache: PathBuf,
        /// Where to write the shallow-clone plan for non-GitHub sources
        #[arg(long, default_value = "clone-plan.sh")]
        clone_plan: PathBuf,
        /// Concurrent repository walks
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
    /// Build the catalog and error report from the populated cache
    Build {
        /// YAML source list (approved / unapproved / flagged-cogs)
        #[arg(long, default_value = "repositories.yaml")]
        config: PathBuf,
        /// Cache root populated by `fetch`
        #[arg(long, default_value = "cache")]
        cache: PathBuf,
        /// Output directory for catalog files
        #[arg(long, default_value = "index")]
        out: PathBuf,
        /// Persisted lifecycle metadata
        #[arg(long, default_value = "metadata.json")]
        metadata: PathBuf,
        /// Require the __init__.py marker inside each cog directory
        /// (only meaningful for caches produced by full clones)
        #[arg(long)]
        require_marker: bool,
        /// Ban-list matching direction
        #[arg(long, value_enum, default_value_t = BanMatchArg::OwnerWithinKey)]
        ban_match: BanMatchArg,
        /// Concurrent repository discoveries
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
}

/// CLI surface for [`BanMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BanMatchArg {
    /// The repository's owner/name pair appears inside the flagged key
    OwnerWithinKey,
    /// The flagged key appears inside the repository's owner/name pair
    KeyWithinOwner,
}

impl From<BanMatchArg> for BanMatch {
    fn from(arg: BanMatchArg) -> Self {
        match arg {
            BanMatchArg::OwnerWithinKey => Self::OwnerWithinKey,
            BanMatchArg::KeyWithinOwner => Self::KeyWithinOwner,
        }
    }
}
