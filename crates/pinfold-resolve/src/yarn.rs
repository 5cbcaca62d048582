//! Pinning of the standalone package manager script used inside the
//! offline build.

use crate::config::GeneratorConfig;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::source::{Digest, FileSource, SourceRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Release {
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    browser_download_url: String,
}

/// Pin the latest standalone script release.
///
/// The release's asset list carries the `.asc` signature first and the
/// script second; the second asset is the one shipped.
pub fn pin_script(fetcher: &Fetcher, config: &GeneratorConfig) -> Result<SourceRecord, ResolveError> {
    let body = fetcher.fetch_text(&config.yarn_release_api, &[])?;
    let release: Release = serde_json::from_str(&body)?;
    let Some(asset) = release.assets.get(1) else {
        return Err(ResolveError::Parse(format!(
            "release at {} has {} assets, expected the script as the second",
            config.yarn_release_api,
            release.assets.len()
        )));
    };
    let pinned = fetcher.locate_sha512(&asset.browser_download_url)?;
    Ok(SourceRecord::File(
        FileSource::remote(pinned.url, "bin", "yarn.js").with_digest(Digest::Sha512(pinned.sha512)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockServer;

    #[test]
    fn second_asset_is_pinned() {
        let body = b"#!/usr/bin/env node\n";
        let server = MockServer::start(&[("/dl/yarn-1.3.2.js", 200, body)]);
        let release = format!(
            r#"{{"assets": [
                {{"browser_download_url": "{0}/dl/yarn-1.3.2.js.asc"}},
                {{"browser_download_url": "{0}/dl/yarn-1.3.2.js"}}
            ]}}"#,
            server.addr
        );
        let api = MockServer::start(&[("/latest", 200, release.as_bytes())]);
        let mut config = GeneratorConfig::default();
        config.yarn_release_api = format!("{}/latest", api.addr);

        let fetcher = Fetcher::new();
        let SourceRecord::File(file) = pin_script(&fetcher, &config).unwrap() else {
            panic!("expected file source");
        };
        assert!(file.url.as_deref().is_some_and(|u| u.ends_with("yarn-1.3.2.js")));
        assert_eq!(file.dest.as_deref(), Some("bin"));
        assert_eq!(file.dest_filename.as_deref(), Some("yarn.js"));
        assert_eq!(
            file.sha512.as_deref(),
            Some(pinfold_fetch::sha512_hex(body).as_str())
        );
    }

    #[test]
    fn short_asset_list_is_parse_error() {
        let api = MockServer::start(&[(
            "/latest",
            200,
            br#"{"assets": [{"browser_download_url": "https://x.example/only.asc"}]}"#,
        )]);
        let mut config = GeneratorConfig::default();
        config.yarn_release_api = format!("{}/latest", api.addr);
        let fetcher = Fetcher::new();
        let err = pin_script(&fetcher, &config).unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }
}
