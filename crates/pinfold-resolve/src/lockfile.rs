//! Lockfile parsing and source extraction.
//!
//! Lockfile text is parsed by the JavaScript ecosystem's own reference
//! parser, run in a node subprocess; the extraction logic on top of it
//! is pure Rust and fully testable against a canned parser.

use crate::node::{NodeRuntime, SystemNode};
use crate::process::run;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::source::{Digest, FileSource, SourceRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

/// One resolved entry from a lockfile: the pinned version and the
/// URL it resolves to (possibly carrying an integrity fragment).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    pub version: String,
    pub resolved: String,
}

/// Turns raw lockfile text into resolved entries keyed by the
/// lockfile's own `name@range` keys.
pub trait LockfileParser {
    fn parse(&self, text: &str) -> Result<BTreeMap<String, LockEntry>, ResolveError>;
}

const PARSE_SCRIPT: &str = "const lf = require('@yarnpkg/lockfile'); \
     const text = require('fs').readFileSync(process.stdin.fd, 'utf8'); \
     console.log(JSON.stringify(lf.parse(text).object))";

/// The reference parser, installed once into a throwaway directory and
/// invoked through node for each lockfile.
pub struct YarnLockParser {
    node: SystemNode,
    tool_dir: tempfile::TempDir,
}

impl YarnLockParser {
    /// Install the parser package. The directory lives as long as the
    /// parser does.
    pub fn install() -> Result<Self, ResolveError> {
        let tool_dir = tempfile::tempdir()?;
        tracing::debug!("installing lockfile parser into {}", tool_dir.path().display());
        run(
            "npm",
            Command::new("npm")
                .args(["install", "--no-save", "@yarnpkg/lockfile"])
                .current_dir(tool_dir.path()),
        )?;
        Ok(YarnLockParser {
            node: SystemNode,
            tool_dir,
        })
    }

    pub fn tool_dir(&self) -> PathBuf {
        self.tool_dir.path().to_path_buf()
    }
}

impl LockfileParser for YarnLockParser {
    fn parse(&self, text: &str) -> Result<BTreeMap<String, LockEntry>, ResolveError> {
        let json = self
            .node
            .eval(PARSE_SCRIPT, Some(text), Some(self.tool_dir.path()))?;
        let entries: BTreeMap<String, LockEntry> = serde_json::from_str(&json)?;
        Ok(entries)
    }
}

/// Pinned file sources for every package named by the given lockfiles,
/// keyed by `(name, version)`.
///
/// A resolved URL with an integrity fragment is trusted as-is; one
/// without is fetched and digested. Packages appearing in several
/// lockfiles are resolved once.
pub fn extract_sources(
    parser: &dyn LockfileParser,
    fetcher: &Fetcher,
    lock_texts: &[String],
) -> Result<BTreeMap<(String, String), SourceRecord>, ResolveError> {
    let mut sources: BTreeMap<(String, String), SourceRecord> = BTreeMap::new();
    for text in lock_texts {
        for (key, entry) in parser.parse(text)? {
            // Keys look like `name@range`; scoped names keep their
            // leading `@`, so split on the last separator.
            let Some(at) = key.rfind('@') else {
                return Err(ResolveError::Parse(format!(
                    "lockfile key '{key}' has no version range separator"
                )));
            };
            let name = key[..at].to_owned();
            if at == 0 || name.is_empty() {
                return Err(ResolveError::Parse(format!(
                    "lockfile key '{key}' has an empty package name"
                )));
            }
            let pin = (name.clone(), entry.version.clone());
            if sources.contains_key(&pin) {
                continue;
            }

            // A trailing `#` carries no integrity hash; such URLs are
            // registry-hosted and go through the fetch-and-digest path.
            let record = match entry.resolved.split_once('#') {
                Some((url, fragment)) if !fragment.is_empty() => {
                    let filename =
                        format!("{}-{}.tgz", name.replace('/', "-"), entry.version);
                    SourceRecord::File(
                        FileSource::remote(url, "yarn-mirror", filename)
                            .with_digest(Digest::Sha1(fragment.to_owned())),
                    )
                }
                _ => {
                    let base = entry
                        .resolved
                        .strip_suffix('#')
                        .unwrap_or(&entry.resolved);
                    let pinned = fetcher.locate_sha512(base)?;
                    let filename =
                        base.rsplit('/').next().unwrap_or(base).to_owned();
                    SourceRecord::File(
                        FileSource::remote(&pinned.url, "yarn-mirror", filename)
                            .with_digest(Digest::Sha512(pinned.sha512)),
                    )
                }
            };
            sources.insert(pin, record);
        }
    }
    Ok(sources)
}
