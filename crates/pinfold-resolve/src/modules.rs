//! Redirect-following import resolver for the modular-language
//! ecosystem.
//!
//! A symbolic package path resolves to a repository either structurally
//! (well-known hosting convention) or through the host's indirection
//! markup (`?go-get=1` meta tag). Each repository is cloned shallowly
//! into a per-canonical-path directory and pinned to its HEAD commit;
//! the ecosystem's own listing tool then reports unresolved transitive
//! imports, which are resolved recursively. Presence of the clone
//! directory is the sole dedup key, which both makes discovery
//! idempotent and guarantees termination.

use crate::config::ToolRoot;
use crate::process::{capture, run};
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::source::{GitSource, SourceRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One indirection instruction published by a hosting endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportMeta {
    pub prefix: String,
    pub vcs: String,
    pub repo_url: String,
}

/// Extract the single `go-import` instruction from indirection markup.
///
/// Returns `None` when no well-formed instruction is present; the
/// caller decides whether that is fatal.
pub fn parse_import_meta(markup: &str) -> Option<ImportMeta> {
    for (start, _) in markup.match_indices("<meta") {
        let rest = &markup[start..];
        let end = rest.find('>')?;
        let tag = &rest[..end];
        if attr(tag, "name") != Some("go-import") {
            continue;
        }
        let content = attr(tag, "content")?;
        let mut fields = content.split_whitespace();
        let (prefix, vcs, repo_url) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() {
            continue;
        }
        return Some(ImportMeta {
            prefix: prefix.to_owned(),
            vcs: vcs.to_owned(),
            repo_url: repo_url.to_owned(),
        });
    }
    None
}

fn attr<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{key}=\"");
    let start = tag.find(&marker)? + marker.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// Version-control and listing operations the resolver shells out for.
/// Tests substitute a canned implementation.
pub trait ModuleTooling {
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), ResolveError>;
    fn head_commit(&self, dir: &Path) -> Result<String, ResolveError>;
    /// Raw output of the ecosystem's dependency listing tool: a stream
    /// of JSON records, each optionally carrying unresolved-import
    /// errors.
    fn list_imports(&self, dir: &Path) -> Result<String, ResolveError>;
}

/// Real tooling: `git` for clones, `go list` for introspection.
#[derive(Debug, Default)]
pub struct GitTooling;

impl ModuleTooling for GitTooling {
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), ResolveError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        run(
            "git",
            Command::new("git")
                .args(["clone", "--depth", "1", url])
                .arg(dest),
        )
    }

    fn head_commit(&self, dir: &Path) -> Result<String, ResolveError> {
        let out = capture(
            "git",
            Command::new("git")
                .args(["rev-parse", "HEAD"])
                .current_dir(dir),
        )?;
        Ok(out.trim().to_owned())
    }

    fn list_imports(&self, dir: &Path) -> Result<String, ResolveError> {
        capture(
            "go",
            Command::new("go")
                .args(["list", "-e", "-json", "all"])
                .current_dir(dir),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRecord {
    #[serde(default)]
    deps_errors: Vec<DepsError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DepsError {
    #[serde(default)]
    import_stack: Vec<String>,
}

/// Sources and install commands produced by one resolver run, each
/// sorted by its stable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModules {
    pub sources: Vec<SourceRecord>,
    pub build_commands: Vec<String>,
}

pub struct ModuleResolver<'a> {
    fetcher: &'a Fetcher,
    tooling: &'a dyn ModuleTooling,
    workdir: PathBuf,
    insecure_http: bool,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(fetcher: &'a Fetcher, tooling: &'a dyn ModuleTooling, workdir: PathBuf) -> Self {
        ModuleResolver {
            fetcher,
            tooling,
            workdir,
            insecure_http: false,
        }
    }

    /// Resolve indirection metadata over plain HTTP instead of HTTPS
    /// (GOINSECURE-style; needed for private hosts and tests).
    pub fn insecure_http(mut self, yes: bool) -> Self {
        self.insecure_http = yes;
        self
    }

    /// Resolve every root path and all transitively discovered
    /// dependencies to pinned version-control sources, plus one install
    /// command per requested root.
    pub fn resolve(&self, roots: &[ToolRoot]) -> Result<ResolvedModules, ResolveError> {
        let mut sources: BTreeMap<String, SourceRecord> = BTreeMap::new();
        for root in roots {
            self.resolve_path(&root.path, &mut sources)?;
        }

        let mut build_commands: Vec<String> = roots
            .iter()
            .map(|root| match &root.renamed_binary {
                None => format!("go install {}", root.path),
                Some(bin) => format!("go build -o /app/local/bin/{bin} {}", root.path),
            })
            .collect();
        build_commands.sort();
        build_commands.dedup();

        Ok(ResolvedModules {
            sources: sources.into_values().collect(),
            build_commands,
        })
    }

    fn resolve_path(
        &self,
        path: &str,
        sources: &mut BTreeMap<String, SourceRecord>,
    ) -> Result<(), ResolveError> {
        let (canonical, repo_url) = self.repository_location(path)?;
        let dir = self.workdir.join(&canonical);
        if dir.exists() {
            // Already discovered in this run; the existing clone and
            // source record stand.
            tracing::debug!("'{canonical}' already cloned, skipping");
            return Ok(());
        }

        tracing::info!("cloning '{canonical}' from {repo_url}");
        self.tooling.clone_shallow(&repo_url, &dir)?;
        let commit = self.tooling.head_commit(&dir)?;
        sources.insert(
            repo_url.clone(),
            SourceRecord::Git(GitSource {
                url: repo_url,
                tag: None,
                commit,
                dest: Some(format!("go/src/{canonical}")),
            }),
        );

        let listing = self.tooling.list_imports(&dir)?;
        for import in discovered_imports(&listing)? {
            self.resolve_path(&import, sources)?;
        }
        Ok(())
    }

    /// Resolve a symbolic path to its canonical prefix and clone URL.
    fn repository_location(&self, path: &str) -> Result<(String, String), ResolveError> {
        // Well-known hosting convention: the clone URL is derived from
        // the path structure, no indirection round-trip needed.
        if let Some(rest) = path.strip_prefix("github.com/") {
            let mut segments = rest.split('/');
            let (Some(org), Some(repo)) = (segments.next(), segments.next()) else {
                return Err(ResolveError::resolution(
                    path,
                    "well-known host path needs at least org/repo",
                ));
            };
            if org.is_empty() || repo.is_empty() {
                return Err(ResolveError::resolution(
                    path,
                    "well-known host path needs at least org/repo",
                ));
            }
            let canonical = format!("github.com/{org}/{repo}");
            let url = format!("https://{canonical}");
            return Ok((canonical, url));
        }

        let meta = self.lookup_meta(path)?;
        match meta.vcs.as_str() {
            "git" => {}
            vcs @ ("hg" | "svn" | "bzr" | "fossil") => {
                return Err(ResolveError::UnsupportedProtocol {
                    path: path.to_owned(),
                    vcs: vcs.to_owned(),
                });
            }
            other => {
                return Err(ResolveError::resolution(
                    path,
                    format!("unrecognized vcs kind '{other}'"),
                ));
            }
        }
        if path != meta.prefix && !path.starts_with(&format!("{}/", meta.prefix)) {
            return Err(ResolveError::resolution(
                path,
                format!("declared prefix '{}' does not cover the path", meta.prefix),
            ));
        }
        if path != meta.prefix {
            // Guard against a host serving inconsistent metadata for
            // sub-packages: the canonical prefix must declare the same
            // instruction for itself.
            let canonical_meta = self.lookup_meta(&meta.prefix)?;
            if canonical_meta != meta {
                return Err(ResolveError::resolution(
                    path,
                    format!(
                        "indirection metadata for sub-path disagrees with canonical prefix '{}'",
                        meta.prefix
                    ),
                ));
            }
        }
        Ok((meta.prefix, meta.repo_url))
    }

    fn lookup_meta(&self, path: &str) -> Result<ImportMeta, ResolveError> {
        let scheme = if self.insecure_http { "http" } else { "https" };
        let url = format!("{scheme}://{path}?go-get=1");
        let markup = self.fetcher.fetch_text(&url, &[])?;
        parse_import_meta(&markup)
            .ok_or_else(|| ResolveError::resolution(path, "no go-import meta tag in response"))
    }
}

/// Innermost unresolved import paths reported by the listing tool, in
/// first-seen order.
fn discovered_imports(listing: &str) -> Result<Vec<String>, ResolveError> {
    let mut found: Vec<String> = Vec::new();
    for record in serde_json::Deserializer::from_str(listing).into_iter::<ListRecord>() {
        let record = record?;
        for error in record.deps_errors {
            if let Some(innermost) = error.import_stack.last() {
                if !found.iter().any(|p| p == innermost) {
                    found.push(innermost.clone());
                }
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockServer;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockTooling {
        /// Listing output keyed by canonical path (clone dir suffix).
        listings: HashMap<String, String>,
        clones: Mutex<Vec<String>>,
    }

    impl MockTooling {
        fn new(listings: &[(&str, &str)]) -> Self {
            MockTooling {
                listings: listings
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
                clones: Mutex::new(Vec::new()),
            }
        }

        fn clone_count(&self) -> usize {
            self.clones.lock().unwrap().len()
        }
    }

    impl ModuleTooling for MockTooling {
        fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), ResolveError> {
            fs::create_dir_all(dest)?;
            self.clones.lock().unwrap().push(url.to_owned());
            Ok(())
        }

        fn head_commit(&self, _dir: &Path) -> Result<String, ResolveError> {
            Ok("a".repeat(40))
        }

        fn list_imports(&self, dir: &Path) -> Result<String, ResolveError> {
            for (canonical, listing) in &self.listings {
                if dir.ends_with(canonical) {
                    return Ok(listing.clone());
                }
            }
            Ok(String::new())
        }
    }

    fn root(path: &str) -> ToolRoot {
        ToolRoot {
            path: path.to_owned(),
            renamed_binary: None,
        }
    }

    #[test]
    fn meta_tag_parses() {
        let markup = r#"<html><head>
<meta name="go-import" content="example.dev/pkg git https://git.example/pkg.git">
</head></html>"#;
        let meta = parse_import_meta(markup).unwrap();
        assert_eq!(meta.prefix, "example.dev/pkg");
        assert_eq!(meta.vcs, "git");
        assert_eq!(meta.repo_url, "https://git.example/pkg.git");
    }

    #[test]
    fn meta_tag_ignores_unrelated_metas() {
        let markup = r#"<meta charset="utf-8">
<meta name="go-source" content="x y z w">
<meta name="go-import" content="a.example/b hg https://hg.example/b">"#;
        let meta = parse_import_meta(markup).unwrap();
        assert_eq!(meta.vcs, "hg");
    }

    #[test]
    fn meta_tag_absent_or_malformed_is_none() {
        assert!(parse_import_meta("<html></html>").is_none());
        // Two fields instead of three.
        assert!(parse_import_meta(r#"<meta name="go-import" content="a git">"#).is_none());
        // Four fields.
        assert!(parse_import_meta(r#"<meta name="go-import" content="a git u extra">"#).is_none());
    }

    #[test]
    fn well_known_host_resolves_without_indirection() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf());

        let resolved = resolver
            .resolve(&[root("github.com/example/tool/cmd/tool")])
            .unwrap();
        assert_eq!(resolved.sources.len(), 1);
        let SourceRecord::Git(git) = &resolved.sources[0] else {
            panic!("expected git source");
        };
        assert_eq!(git.url, "https://github.com/example/tool");
        assert_eq!(git.commit, "a".repeat(40));
        assert_eq!(git.dest.as_deref(), Some("go/src/github.com/example/tool"));
        assert_eq!(
            resolved.build_commands,
            vec!["go install github.com/example/tool/cmd/tool"]
        );
    }

    #[test]
    fn well_known_path_too_short_fails() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf());
        let err = resolver.resolve(&[root("github.com/onlyorg")]).unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));
    }

    #[test]
    fn transitive_dependency_discovered_through_listing_errors() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();

        // Listing for the root reports one unresolved import; the
        // dependency itself lists clean.
        let listing_a = r#"{"ImportPath": "example.dev/tool", "DepsErrors": [
            {"ImportStack": ["example.dev/tool", "github.com/example/dep"], "Err": "cannot find package"}
        ]}"#;
        let server = MockServer::start_templated(&[(
            "/tool?go-get=1",
            200,
            r#"<meta name="go-import" content="{host}/tool git https://vcs.example/tool.git">"#,
        )]);

        let tool_canonical = format!("{}/tool", server.host);
        let tooling = MockTooling::new(&[(tool_canonical.as_str(), listing_a)]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);

        // The dependency is also an explicitly requested root; its
        // transitive discovery must not duplicate anything.
        let resolved = resolver
            .resolve(&[root(&tool_canonical), root("github.com/example/dep")])
            .unwrap();
        assert_eq!(resolved.sources.len(), 2, "root plus discovered dep");
        let urls: Vec<&str> = resolved.sources.iter().map(|s| s.sort_key()).collect();
        let mut sorted = urls.clone();
        sorted.sort_unstable();
        assert_eq!(urls, sorted, "sources must be sorted by URL");
        assert!(urls.contains(&"https://github.com/example/dep"));
        assert!(urls.contains(&"https://vcs.example/tool.git"));
        assert_eq!(
            resolved.build_commands,
            vec![
                format!("go install {tool_canonical}"),
                "go install github.com/example/dep".to_owned(),
            ]
        );
        assert_eq!(tooling.clone_count(), 2);
    }

    #[test]
    fn rediscovery_of_cloned_path_is_noop() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf());

        // Two roots under the same canonical repository.
        let resolved = resolver
            .resolve(&[
                root("github.com/example/tool/cmd/a"),
                root("github.com/example/tool/cmd/b"),
            ])
            .unwrap();
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(tooling.clone_count(), 1, "second resolution must not re-clone");
        assert_eq!(resolved.build_commands.len(), 2);

        // A second full run against the same workdir adds nothing.
        let again = resolver.resolve(&[root("github.com/example/tool")]).unwrap();
        assert_eq!(tooling.clone_count(), 1);
        assert!(again.sources.is_empty(), "already-present path yields no new record");
    }

    #[test]
    fn subpath_metadata_must_agree_with_canonical_prefix() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);

        let server = MockServer::start_templated(&[
            (
                "/pkg/sub?go-get=1",
                200,
                r#"<meta name="go-import" content="{host}/pkg git https://vcs.example/one.git">"#,
            ),
            (
                "/pkg?go-get=1",
                200,
                r#"<meta name="go-import" content="{host}/pkg git https://vcs.example/two.git">"#,
            ),
        ]);

        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);
        let err = resolver
            .resolve(&[root(&format!("{}/pkg/sub", server.host))])
            .unwrap_err();
        match err {
            ResolveError::Resolution { reason, .. } => {
                assert!(reason.contains("disagrees"), "unexpected reason: {reason}");
            }
            other => panic!("expected Resolution error, got {other}"),
        }
    }

    #[test]
    fn subpath_with_consistent_metadata_resolves() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();

        let meta = r#"<meta name="go-import" content="{host}/pkg git https://vcs.example/pkg.git">"#;
        let server =
            MockServer::start_templated(&[("/pkg/sub?go-get=1", 200, meta), ("/pkg?go-get=1", 200, meta)]);

        let tooling = MockTooling::new(&[]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);
        let resolved = resolver
            .resolve(&[root(&format!("{}/pkg/sub", server.host))])
            .unwrap();
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(resolved.sources[0].sort_key(), "https://vcs.example/pkg.git");
        // Both lookups happened: sub-path and canonical prefix.
        assert_eq!(server.hits("/pkg/sub?go-get=1"), 1);
        assert_eq!(server.hits("/pkg?go-get=1"), 1);
    }

    #[test]
    fn unsupported_vcs_kind_is_fatal() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);

        let server = MockServer::start_templated(&[(
            "/pkg?go-get=1",
            200,
            r#"<meta name="go-import" content="{host}/pkg hg https://hg.example/pkg">"#,
        )]);

        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);
        let err = resolver
            .resolve(&[root(&format!("{}/pkg", server.host))])
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedProtocol { vcs, .. } if vcs == "hg"));
    }

    #[test]
    fn prefix_not_covering_path_is_fatal() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);

        let meta = r#"<meta name="go-import" content="other.example/x git https://vcs.example/x.git">"#;
        let server = MockServer::start(&[("/pkg?go-get=1", 200, meta.as_bytes())]);

        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);
        let err = resolver
            .resolve(&[root(&format!("{}/pkg", server.host))])
            .unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));
    }

    #[test]
    fn missing_meta_tag_is_fatal() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);
        let server = MockServer::start(&[("/pkg?go-get=1", 200, b"<html>no meta</html>")]);

        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf())
            .insecure_http(true);
        let err = resolver
            .resolve(&[root(&format!("{}/pkg", server.host))])
            .unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));
    }

    #[test]
    fn renamed_binary_gets_distinct_build_command() {
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new();
        let tooling = MockTooling::new(&[]);
        let resolver = ModuleResolver::new(&fetcher, &tooling, workdir.path().to_path_buf());

        let resolved = resolver
            .resolve(&[ToolRoot {
                path: "github.com/example/tool".to_owned(),
                renamed_binary: Some("tool2".to_owned()),
            }])
            .unwrap();
        assert_eq!(
            resolved.build_commands,
            vec!["go build -o /app/local/bin/tool2 github.com/example/tool"]
        );
    }

    #[test]
    fn listing_errors_parse_from_json_stream() {
        let listing = r#"
{"ImportPath": "a", "DepsErrors": [{"ImportStack": ["a", "b", "c"], "Err": "x"}]}
{"ImportPath": "d"}
{"ImportPath": "e", "DepsErrors": [{"ImportStack": ["e", "c"], "Err": "y"}]}
"#;
        let imports = discovered_imports(listing).unwrap();
        assert_eq!(imports, vec!["c"]);
    }

    #[test]
    fn malformed_listing_is_parse_error() {
        assert!(discovered_imports("{not json").is_err());
    }
}
