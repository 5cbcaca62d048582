//! Dependency resolvers for pinfold.
//!
//! Each resolver turns one ecosystem's view of the application into a
//! list of fully pinned [`pinfold_schema::SourceRecord`]s:
//!
//! - [`modules`] walks a modular-language import graph through
//!   redirect indirection and pins every transitive repository to an
//!   exact commit;
//! - [`lockfile`] flattens node-style lockfiles into content-addressed
//!   package records;
//! - [`electron`] and [`ripgrep`] reconcile version pins discovered in
//!   the lockfile set against prebuilt per-architecture binary
//!   releases;
//! - [`yarn`], [`base`], [`releases`], and [`scan`] gather the
//!   remaining inputs the manifest assembler needs.
//!
//! Everything is synchronous and fail-fast: a resolver error aborts the
//! whole generation run, since a partially resolved manifest must never
//! be emitted.

pub mod base;
pub mod config;
pub mod electron;
pub mod lockfile;
pub mod modules;
pub mod node;
pub mod prereqs;
pub mod releases;
pub mod ripgrep;
pub mod scan;
pub mod yarn;

mod process;
#[cfg(test)]
pub(crate) mod testutil;

pub use config::GeneratorConfig;

use pinfold_fetch::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("resolution error for '{path}': {reason}")]
    Resolution { path: String, reason: String },
    #[error("unsupported hosting protocol for '{path}': vcs kind '{vcs}'")]
    UnsupportedProtocol { path: String, vcs: String },
    #[error("reconciliation error: {0}")]
    Reconciliation(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },
}

impl ResolveError {
    pub(crate) fn resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolveError::Resolution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
