//! Pinning of the bundled search tool.
//!
//! The wrapper package pinned in the lockfile does not record the
//! underlying binary version; its install script does, as a constant.
//! That single line is extracted from the script and evaluated in a
//! node subprocess, then the binary release is pinned per architecture.

use crate::config::GeneratorConfig;
use crate::node::NodeRuntime;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::arch::SUPPORTED_ARCHES;
use pinfold_schema::source::{Digest, FileSource, SourceRecord};
use std::collections::BTreeMap;

const WRAPPER_PACKAGE: &str = "vscode-ripgrep";

/// The `const version = ...` declaration from the install script, if
/// present.
pub fn version_declaration(script: &str) -> Option<&str> {
    script
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("const version"))
}

/// Pin the search tool binary for every supported architecture.
pub fn pin_binaries(
    package_versions: &BTreeMap<String, String>,
    fetcher: &Fetcher,
    node: &dyn NodeRuntime,
    config: &GeneratorConfig,
) -> Result<Vec<SourceRecord>, ResolveError> {
    let Some(wrapper_version) = package_versions.get(WRAPPER_PACKAGE) else {
        return Err(ResolveError::Reconciliation(format!(
            "package '{WRAPPER_PACKAGE}' is not pinned by any lockfile"
        )));
    };

    let script_url = format!(
        "{}/{wrapper_version}/dist/postinstall.js",
        config.ripgrep_script_base
    );
    let script = fetcher.fetch_text(&script_url, &[])?;
    let Some(declaration) = version_declaration(&script) else {
        return Err(ResolveError::Parse(format!(
            "no version declaration in {script_url}"
        )));
    };
    // Evaluate the declaration itself so expressions survive, not just
    // string literals.
    let version = node.eval(
        &format!("{declaration}; console.log(version)"),
        None,
        None,
    )?;
    tracing::debug!("search tool wrapper {wrapper_version} bundles binary {version}");

    let mut sources = Vec::new();
    for arch in SUPPORTED_ARCHES {
        let url = format!(
            "{}/{version}/ripgrep-{version}-linux-{}.zip",
            config.ripgrep_release_base, arch.node
        );
        let pinned = fetcher.locate_sha512(&url)?;
        let mut file = FileSource::remote(pinned.url, "misc", "ripgrep.zip")
            .with_digest(Digest::Sha512(pinned.sha512));
        file.only_arches = Some(vec![arch.linux.to_owned()]);
        sources.push(SourceRecord::File(file));
    }
    Ok(sources)
}
