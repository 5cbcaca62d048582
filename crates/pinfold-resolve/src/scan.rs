//! Working-tree scans over the checked-out editor sources: lockfile
//! discovery, runtime target extraction, product metadata.

use crate::ResolveError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// All lockfiles under `root`, depth-first and sorted, so downstream
/// resolution order never depends on directory iteration order.
pub fn find_lockfiles(root: &Path) -> Result<Vec<PathBuf>, ResolveError> {
    let mut found = Vec::new();
    walk(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), ResolveError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            walk(&path, found)?;
        } else if entry.file_name() == "yarn.lock" {
            found.push(path);
        }
    }
    Ok(())
}

/// The runtime version a `.yarnrc` targets, e.g. `target "1.7.9"`.
pub fn read_runtime_target(yarnrc: &str) -> Option<String> {
    for line in yarnrc.lines() {
        let Some(rest) = line.trim().strip_prefix("target ") else {
            continue;
        };
        return Some(rest.trim().trim_matches('"').to_owned());
    }
    None
}

/// Branding metadata shipped with the editor sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name_short: String,
    pub name_long: String,
    pub application_name: String,
    pub data_folder_name: String,
    pub darwin_bundle_identifier: String,
    #[serde(default)]
    pub license_name: Option<String>,
}

pub fn read_product_file(path: &Path) -> Result<ProductInfo, ResolveError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockfiles_found_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("extensions/emmet")).unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join("extensions/emmet/yarn.lock"), "b").unwrap();
        fs::write(dir.path().join("yarn.lock"), "a").unwrap();
        fs::write(dir.path().join(".git/yarn.lock"), "ignored").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let found = find_lockfiles(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("extensions/emmet/yarn.lock"),
                dir.path().join("yarn.lock"),
            ]
        );
    }

    #[test]
    fn runtime_target_parses_quoted_value() {
        let yarnrc = "disturl \"https://atom.io/download/electron\"\ntarget \"1.7.9\"\nruntime \"electron\"\n";
        assert_eq!(read_runtime_target(yarnrc).as_deref(), Some("1.7.9"));
        assert!(read_runtime_target("runtime \"electron\"\n").is_none());
    }

    #[test]
    fn product_file_parses_branding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.json");
        fs::write(
            &path,
            r#"{
                "nameShort": "Code - OSS",
                "nameLong": "Code - OSS",
                "applicationName": "code-oss",
                "dataFolderName": ".vscode-oss",
                "darwinBundleIdentifier": "com.visualstudio.code.oss",
                "win32MutexName": "vscodeoss"
            }"#,
        )
        .unwrap();
        let product = read_product_file(&path).unwrap();
        assert_eq!(product.application_name, "code-oss");
        assert_eq!(product.data_folder_name, ".vscode-oss");
        assert!(product.license_name.is_none());
    }
}
