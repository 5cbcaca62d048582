//! Base platform coordinates, fetched from the base application's own
//! published manifest so the two stay in lockstep.

use crate::config::GeneratorConfig;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::manifest::BaseRecipe;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BaseAppManifest {
    id: String,
    branch: String,
    runtime: String,
    #[serde(rename = "runtime-version")]
    runtime_version: String,
    sdk: String,
}

pub fn fetch_base_recipe(
    fetcher: &Fetcher,
    config: &GeneratorConfig,
) -> Result<BaseRecipe, ResolveError> {
    let body = fetcher.fetch_text(&config.base_app_url, &[])?;
    let manifest: BaseAppManifest = serde_json::from_str(&body)?;
    Ok(BaseRecipe {
        base: manifest.id,
        base_version: manifest.branch,
        runtime: manifest.runtime,
        runtime_version: manifest.runtime_version,
        sdk: manifest.sdk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockServer;

    #[test]
    fn base_manifest_maps_to_recipe() {
        let body = br#"{
            "id": "io.atom.electron.BaseApp",
            "branch": "stable",
            "runtime": "org.freedesktop.Platform",
            "runtime-version": "1.6",
            "sdk": "org.freedesktop.Sdk",
            "modules": []
        }"#;
        let server = MockServer::start(&[("/base.json", 200, body)]);
        let mut config = GeneratorConfig::default();
        config.base_app_url = format!("{}/base.json", server.addr);

        let fetcher = Fetcher::new();
        let recipe = fetch_base_recipe(&fetcher, &config).unwrap();
        assert_eq!(recipe.base, "io.atom.electron.BaseApp");
        assert_eq!(recipe.base_version, "stable");
        assert_eq!(recipe.runtime_version, "1.6");
    }

    #[test]
    fn malformed_base_manifest_is_json_error() {
        let server = MockServer::start(&[("/base.json", 200, b"{\"id\": 3}")]);
        let mut config = GeneratorConfig::default();
        config.base_app_url = format!("{}/base.json", server.addr);
        let fetcher = Fetcher::new();
        let err = fetch_base_recipe(&fetcher, &config).unwrap_err();
        assert!(matches!(err, ResolveError::Json(_)));
    }
}
