use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use pinfold_fetch::Fetcher;
use pinfold_resolve::base::fetch_base_recipe;
use pinfold_resolve::config::parse_config_file;
use pinfold_resolve::electron::reconcile;
use pinfold_resolve::lockfile::{extract_sources, YarnLockParser};
use pinfold_resolve::modules::{GitTooling, ModuleResolver};
use pinfold_resolve::node::SystemNode;
use pinfold_resolve::prereqs::prerequisite_modules;
use pinfold_resolve::releases::{clone_editor, fetch_releases, release_dates};
use pinfold_resolve::ripgrep::pin_binaries;
use pinfold_resolve::scan::{find_lockfiles, read_product_file, read_runtime_target};
use pinfold_resolve::yarn::pin_script;
use pinfold_resolve::{GeneratorConfig, ResolveError};
use pinfold_schema::manifest::{assemble, ManifestMeta};
use pinfold_schema::module::{BuildModule, BuildOptions};
use pinfold_schema::source::{FileSource, GitSource, ScriptSource, SourceRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub struct GenerateArgs<'a> {
    pub config: Option<&'a Path>,
    pub source_tree: Option<&'a Path>,
    pub workdir: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub json: bool,
}

fn resolve_err(e: ResolveError) -> String {
    format!("resolve error: {e}")
}

#[allow(clippy::too_many_lines)]
pub fn run(args: &GenerateArgs) -> Result<u8, String> {
    let config = match args.config {
        Some(path) => parse_config_file(path).map_err(|e| format!("config error: {e}"))?,
        None => GeneratorConfig::default(),
    };

    // Keep an unnamed tempdir alive for the whole run when no workdir
    // was given.
    let (workdir, _scratch): (PathBuf, Option<tempfile::TempDir>) = match args.workdir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| format!("config error: {e}"))?;
            (dir.to_path_buf(), None)
        }
        None => {
            let scratch = tempfile::tempdir().map_err(|e| e.to_string())?;
            (scratch.path().to_path_buf(), Some(scratch))
        }
    };

    let fetcher = Fetcher::new();
    let pb = if args.json {
        None
    } else {
        Some(spinner("resolving release listing..."))
    };

    let result = generate(&config, args.source_tree, &workdir, &fetcher);
    let (manifest, newest_version) = match result {
        Ok(pair) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "manifest assembled");
            }
            pair
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "generation failed");
            }
            return Err(e);
        }
    };

    let output = args
        .output
        .map_or_else(|| PathBuf::from(format!("{}.json", manifest.app_id)), Path::to_path_buf);
    manifest
        .write_to_file(&output)
        .map_err(|e| format!("manifest error: {e}"))?;

    if args.json {
        let payload = serde_json::json!({
            "app_id": manifest.app_id,
            "version": newest_version,
            "modules": manifest.modules.len(),
            "output": output.display().to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let styled = console::Style::new().bold().apply_to(output.display());
        println!(
            "generated manifest for {} {} ({} modules)",
            manifest.app_id,
            newest_version,
            manifest.modules.len()
        );
        println!("written to {styled}");
    }
    Ok(EXIT_SUCCESS)
}

fn generate(
    config: &GeneratorConfig,
    source_tree: Option<&Path>,
    workdir: &Path,
    fetcher: &Fetcher,
) -> Result<(pinfold_schema::manifest::Manifest, String), String> {
    let releases = fetch_releases(fetcher, config).map_err(resolve_err)?;
    let newest = releases
        .first()
        .ok_or_else(|| resolve_err(ResolveError::Parse("no post-1.0 release published".into())))?
        .clone();

    let checkout: PathBuf = match source_tree {
        Some(tree) => tree.to_path_buf(),
        None => {
            let dest = workdir.join("editor");
            clone_editor(&newest.version, &dest, config).map_err(resolve_err)?;
            dest
        }
    };
    let notes = release_dates(&releases, &checkout).map_err(resolve_err)?;

    let product =
        read_product_file(&checkout.join("product.json")).map_err(resolve_err)?;
    let yarnrc = fs::read_to_string(checkout.join(".yarnrc"))
        .map_err(|e| resolve_err(ResolveError::Io(e)))?;
    let runtime_version = read_runtime_target(&yarnrc).ok_or_else(|| {
        resolve_err(ResolveError::Parse(
            ".yarnrc carries no runtime target line".into(),
        ))
    })?;

    tracing::info!(
        "building {} {} against runtime {runtime_version}",
        product.application_name,
        newest.version
    );

    let lock_paths = find_lockfiles(&checkout).map_err(resolve_err)?;
    let mut lock_texts = Vec::with_capacity(lock_paths.len());
    for path in &lock_paths {
        lock_texts.push(fs::read_to_string(path).map_err(|e| resolve_err(ResolveError::Io(e)))?);
    }
    let parser = YarnLockParser::install().map_err(resolve_err)?;
    let package_sources =
        extract_sources(&parser, fetcher, &lock_texts).map_err(resolve_err)?;
    let package_pins: BTreeSet<(String, String)> = package_sources.keys().cloned().collect();
    let package_versions: BTreeMap<String, String> = package_sources
        .keys()
        .map(|(name, version)| (name.clone(), version.clone()))
        .collect();

    let node = SystemNode;
    let electron_sources =
        reconcile(&package_pins, &runtime_version, fetcher, config).map_err(resolve_err)?;
    let ripgrep_sources =
        pin_binaries(&package_versions, fetcher, &node, config).map_err(resolve_err)?;
    let yarn_source = pin_script(fetcher, config).map_err(resolve_err)?;

    let mut modules = prerequisite_modules(fetcher, config).map_err(resolve_err)?;
    modules.push(editor_module(
        config,
        &product.application_name,
        &product.darwin_bundle_identifier,
        &newest,
        fetcher,
        package_sources,
        electron_sources,
        ripgrep_sources,
        yarn_source,
    )?);
    if !config.tools.is_empty() {
        let tooling = GitTooling;
        let resolver = ModuleResolver::new(fetcher, &tooling, workdir.join("modules"));
        let resolved = resolver.resolve(&config.tools).map_err(resolve_err)?;
        let mut tools = BuildModule::new("tools");
        tools.buildsystem = Some("simple".to_owned());
        tools.build_options = Some(BuildOptions {
            prefix: None,
            append_path: Some("/app/local/bin".to_owned()),
        });
        tools.build_commands = resolved.build_commands;
        tools.sources = resolved.sources;
        tools.cleanup = vec!["/local".to_owned()];
        modules.push(tools);
    }

    let mut finish_args = config.finish_args.clone();
    finish_args.push(format!("--persist={}", product.data_folder_name));
    let meta = ManifestMeta {
        app_id: product.darwin_bundle_identifier.clone(),
        branch: config.branch.clone(),
        command: product.application_name.clone(),
        separate_locales: false,
        finish_args,
    };
    let base = fetch_base_recipe(fetcher, config).map_err(resolve_err)?;

    let manifest =
        assemble(meta, base, notes, modules).map_err(|e| format!("manifest error: {e}"))?;
    Ok((manifest, newest.version))
}

#[allow(clippy::too_many_arguments)]
fn editor_module(
    config: &GeneratorConfig,
    name: &str,
    app_id: &str,
    newest: &pinfold_resolve::releases::ReleaseEntry,
    fetcher: &Fetcher,
    package_sources: BTreeMap<(String, String), SourceRecord>,
    electron_sources: Vec<SourceRecord>,
    ripgrep_sources: Vec<SourceRecord>,
    yarn_source: SourceRecord,
) -> Result<BuildModule, String> {
    let mut module = BuildModule::new(name);
    module.buildsystem = Some("simple".to_owned());
    module.build_options = Some(BuildOptions {
        prefix: None,
        append_path: Some("/app/local/bin".to_owned()),
    });
    module.build_commands = vec![config.build_command.clone()];
    module.cleanup = vec!["/local".to_owned()];

    let mut sources = vec![SourceRecord::Git(GitSource {
        url: config.editor_repo.clone(),
        tag: Some(newest.version.clone()),
        commit: newest.id.clone(),
        dest: Some("vscode".to_owned()),
    })];

    // The builder program itself ships inside the manifest, so the
    // offline build needs nothing beyond the pinned sources.
    let script_path = Path::new(&config.builder_script);
    let script_text = fs::read_to_string(script_path)
        .map_err(|e| format!("config error: cannot read builder script '{}': {e}", config.builder_script))?;
    let script_name = script_path
        .file_name()
        .map_or_else(|| config.builder_script.clone(), |n| n.to_string_lossy().into_owned());
    sources.push(SourceRecord::Script(ScriptSource {
        commands: script_text.lines().map(str::to_owned).collect(),
        dest_filename: Some(script_name),
    }));

    // The emitted manifest is shipped back in as a plain file, letting
    // the builder read its own pinned source table.
    sources.push(SourceRecord::local_file(format!("{app_id}.json")));

    let pinned_product = fetcher
        .locate_sha512(&config.product_json_url)
        .map_err(|e| resolve_err(ResolveError::Fetch(e)))?;
    sources.push(SourceRecord::File(FileSource {
        url: Some(pinned_product.url),
        sha512: Some(pinned_product.sha512),
        ..FileSource::default()
    }));

    sources.extend(package_sources.into_values());
    sources.push(yarn_source);
    sources.extend(electron_sources);
    sources.extend(ripgrep_sources);
    module.sources = sources;
    Ok(module)
}
