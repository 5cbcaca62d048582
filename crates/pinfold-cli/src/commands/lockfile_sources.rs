use super::{json_pretty, EXIT_SUCCESS};
use pinfold_fetch::Fetcher;
use pinfold_resolve::lockfile::{extract_sources, YarnLockParser};
use std::fs;
use std::path::PathBuf;

/// Inspection command: resolve the given lockfiles in isolation and
/// print the extracted source records.
pub fn run(lockfiles: &[PathBuf]) -> Result<u8, String> {
    let mut texts = Vec::with_capacity(lockfiles.len());
    for path in lockfiles {
        texts.push(
            fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        );
    }

    let parser = YarnLockParser::install().map_err(|e| format!("resolve error: {e}"))?;
    let fetcher = Fetcher::new();
    let sources = extract_sources(&parser, &fetcher, &texts)
        .map_err(|e| format!("resolve error: {e}"))?;

    let payload: Vec<serde_json::Value> = sources
        .into_iter()
        .map(|((name, version), source)| {
            serde_json::json!({
                "name": name,
                "version": version,
                "source": source,
            })
        })
        .collect();
    println!("{}", json_pretty(&payload)?);
    Ok(EXIT_SUCCESS)
}
