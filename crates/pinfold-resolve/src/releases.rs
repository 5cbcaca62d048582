//! Editor release listing and source checkout.
//!
//! The update service reports published releases newest-first, each
//! carrying the commit id it was cut from. The newest release is the
//! one built; its tag is checked out and the commit dates for the
//! release notes are read from the clone's history.

use chrono::DateTime;
use crate::config::GeneratorConfig;
use crate::process::{capture, run};
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::manifest::ReleaseNote;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Commit id the release was cut from.
    pub id: String,
    pub version: String,
}

/// Published releases, newest first, with pre-1.0 entries dropped.
pub fn fetch_releases(
    fetcher: &Fetcher,
    config: &GeneratorConfig,
) -> Result<Vec<ReleaseEntry>, ResolveError> {
    let body = fetcher.fetch_text(&config.releases_url, &[("X-API-Version", "2")])?;
    let releases: Vec<ReleaseEntry> = serde_json::from_str(&body)?;
    if releases.is_empty() {
        return Err(ResolveError::Parse(format!(
            "release listing at {} is empty",
            config.releases_url
        )));
    }
    Ok(releases
        .into_iter()
        .filter(|release| release.version.split('.').next() != Some("0"))
        .collect())
}

/// Clone the editor sources at the tag matching `version`.
pub fn clone_editor(version: &str, dest: &Path, config: &GeneratorConfig) -> Result<(), ResolveError> {
    tracing::info!("cloning editor sources at {version}");
    run(
        "git",
        Command::new("git")
            .args(["clone", "--branch", version, &config.editor_repo])
            .arg(dest),
    )
}

/// Release notes with the commit date of each release, read from the
/// clone's history in UTC.
pub fn release_dates(
    releases: &[ReleaseEntry],
    checkout: &Path,
) -> Result<Vec<ReleaseNote>, ResolveError> {
    let mut notes = Vec::with_capacity(releases.len());
    for release in releases {
        let date = capture(
            "git",
            Command::new("git")
                .args(["show", "-s", "--format=%cd", "--date=iso-strict-local"])
                .arg(&release.id)
                .current_dir(checkout)
                .env("TZ", "UTC"),
        )?;
        let date = crate::process::inline(&date);
        // Drop the offset; the notes format wants the bare UTC
        // timestamp.
        let parsed = DateTime::parse_from_rfc3339(&date).map_err(|e| {
            ResolveError::Parse(format!(
                "commit date '{date}' for {} is not a timestamp: {e}",
                release.id
            ))
        })?;
        notes.push(ReleaseNote {
            version: release.version.clone(),
            date: parsed.format("%Y-%m-%dT%H:%M:%S").to_string(),
        });
    }
    Ok(notes)
}
