//! Reconciliation of lockfile version pins against the prebuilt
//! electron release train.
//!
//! The lockfile names the framework packages and their versions; the
//! release host publishes one `SHASUMS256.txt` listing per version.
//! Each pin is expanded into one file record per supported CPU
//! architecture, restricted to that architecture and carrying the
//! checksum the listing declares. A pin whose artifact is missing from
//! its listing aborts the run.

use crate::config::GeneratorConfig;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::arch::SUPPORTED_ARCHES;
use pinfold_schema::source::{Digest, FileSource, SourceComment, SourceRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Helper binaries ship one patch release per minor line; their pins
/// are normalized to the `.0` patch level before lookup.
pub fn patch_zero(version: &str) -> String {
    match version.rsplit_once('.') {
        Some((minor, _)) => format!("{minor}.0"),
        None => version.to_owned(),
    }
}

/// First token of the listing line naming `filename`, if any.
pub fn lookup_checksum(listing: &str, filename: &str) -> Option<String> {
    listing
        .lines()
        .find(|line| line.contains(filename))
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_owned)
}

/// Expand every framework pin found in `package_pins` into
/// per-architecture pinned download records. A package appearing at
/// several distinct versions gets one set of records per version.
///
/// `iojs_version` is the runtime version the application's `.yarnrc`
/// targets; it drives the extra cache records and the runtime headers
/// tarball.
pub fn reconcile(
    package_pins: &BTreeSet<(String, String)>,
    iojs_version: &str,
    fetcher: &Fetcher,
    config: &GeneratorConfig,
) -> Result<Vec<SourceRecord>, ResolveError> {
    // (artifact name, release version, destination directory); a set
    // so helper versions collapsing to the same patch level pin once.
    let mut pins: BTreeSet<(String, String, &str)> = BTreeSet::new();
    for (package, artifact, normalize) in [
        ("electron-mksnapshot", "mksnapshot", true),
        ("electron-chromedriver", "chromedriver", true),
        ("electron", "electron", false),
    ] {
        for (name, version) in package_pins {
            if name != package {
                continue;
            }
            let version = if normalize {
                patch_zero(version)
            } else {
                version.clone()
            };
            pins.insert((artifact.to_owned(), version, ".electron"));
        }
    }
    // The build tooling keeps its own cache of the runtime-version
    // binaries under a separate directory.
    for artifact in ["electron", "ffmpeg"] {
        pins.insert((
            artifact.to_owned(),
            iojs_version.to_owned(),
            "gulp-electron-cache/atom/electron",
        ));
    }

    let mut listings: BTreeMap<String, String> = BTreeMap::new();
    let mut sources = Vec::new();
    for (artifact, version, dest) in pins {
        if !listings.contains_key(&version) {
            let url = format!("{}/v{version}/SHASUMS256.txt", config.electron_release_base);
            tracing::debug!("fetching checksum listing {url}");
            let listing = fetcher.fetch_text(&url, &[])?;
            listings.insert(version.clone(), listing);
        }
        let listing = &listings[&version];

        for arch in SUPPORTED_ARCHES {
            let filename = format!("{artifact}-v{version}-linux-{}.zip", arch.node);
            let Some(sha256) = lookup_checksum(listing, &filename) else {
                return Err(ResolveError::Reconciliation(format!(
                    "no checksum for '{filename}' in the v{version} listing"
                )));
            };
            let url = format!("{}/v{version}/{filename}", config.electron_release_base);
            let mut file = FileSource::remote(url, dest, &filename)
                .with_digest(Digest::Sha256(sha256));
            file.only_arches = Some(vec![arch.linux.to_owned()]);
            file.comment = Some(SourceComment {
                version: version.clone(),
            });
            sources.push(SourceRecord::File(file));
        }
    }

    // Headers tarball for native module compilation against the
    // targeted runtime version.
    let url = format!("{}/v{iojs_version}/iojs-v{iojs_version}.tar.gz", config.iojs_base);
    let pinned = fetcher.locate_sha512(&url)?;
    sources.push(SourceRecord::File(
        FileSource::remote(pinned.url, "misc", "iojs.tar.gz")
            .with_digest(Digest::Sha512(pinned.sha512)),
    ));

    Ok(sources)
}
