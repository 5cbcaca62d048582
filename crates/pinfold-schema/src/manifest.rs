use crate::arch::SUPPORTED_ARCHES;
use crate::module::BuildModule;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Marker written into every generated manifest.
pub const NOTICE: &str = "This file is auto-generated, do not modify";

/// One entry of the release history carried in the manifest metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNote {
    pub version: String,
    pub date: String,
}

/// Metadata block ignored by the builder but kept for downstream steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comments {
    #[serde(rename = "NOTICE")]
    pub notice: String,
    pub releases: Vec<ReleaseNote>,
}

/// Runtime/sdk identity lifted from the shared base application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRecipe {
    pub base: String,
    pub base_version: String,
    pub runtime: String,
    pub runtime_version: String,
    pub sdk: String,
}

/// Application identity and permission grants for the manifest head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestMeta {
    pub app_id: String,
    pub branch: String,
    pub command: String,
    pub separate_locales: bool,
    pub finish_args: Vec<String>,
}

/// The final artifact: an ordered sequence of build modules plus the
/// top-level identity the sandboxed builder expects.
///
/// Field order is the serialization order; together with the sorting
/// performed by `assemble`, two runs against identical upstream state
/// produce byte-identical documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(rename = "@comments")]
    pub comments: Comments,
    pub app_id: String,
    pub branch: String,
    pub base: String,
    pub base_version: String,
    pub runtime: String,
    pub runtime_version: String,
    pub sdk: String,
    pub command: String,
    pub separate_locales: bool,
    pub finish_args: Vec<String>,
    pub modules: Vec<BuildModule>,
}

/// Merge resolved modules into one manifest.
///
/// Modules are kept in the caller's logical order (native libraries,
/// language runtimes, the application, toolchains); within each module
/// sources and build commands are sorted. Architectures not covered by
/// any module get one inert placeholder module so downstream tooling
/// always sees a non-empty per-architecture build graph. Every source
/// is re-validated against the pinning invariant; an unpinned source
/// aborts assembly and nothing is emitted.
pub fn assemble(
    meta: ManifestMeta,
    base: BaseRecipe,
    releases: Vec<ReleaseNote>,
    mut modules: Vec<BuildModule>,
) -> Result<Manifest, SchemaError> {
    for module in &mut modules {
        module.normalize();
        for source in &module.sources {
            source.verify_pinned()?;
        }
    }

    let missing = uncovered_arches(&modules);
    if !missing.is_empty() {
        let mut placeholder = BuildModule::new("placeholder");
        placeholder.buildsystem = Some("simple".to_owned());
        placeholder.build_commands = vec!["true".to_owned()];
        placeholder.only_arches = Some(missing);
        modules.push(placeholder);
    }

    Ok(Manifest {
        comments: Comments {
            notice: NOTICE.to_owned(),
            releases,
        },
        app_id: meta.app_id,
        branch: meta.branch,
        base: base.base,
        base_version: base.base_version,
        runtime: base.runtime,
        runtime_version: base.runtime_version,
        sdk: base.sdk,
        command: meta.command,
        separate_locales: meta.separate_locales,
        finish_args: meta.finish_args,
        modules,
    })
}

/// Supported architectures no module applies to. A module without an
/// `only-arches` constraint covers everything.
fn uncovered_arches(modules: &[BuildModule]) -> Vec<String> {
    let mut missing = Vec::new();
    for arch in SUPPORTED_ARCHES {
        let covered = modules.iter().any(|m| match &m.only_arches {
            None => true,
            Some(list) => list.iter().any(|a| a == arch.linux),
        });
        if !covered {
            missing.push(arch.linux.to_owned());
        }
    }
    missing.sort();
    missing
}

impl Manifest {
    /// Canonical serialized form, newline-terminated.
    pub fn to_json_string(&self) -> Result<String, SchemaError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Write the manifest atomically: serialize first, then persist via
    /// a temp file rename, so a failed run never leaves a partial
    /// document on disk.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        let path = path.as_ref();
        let content = self.to_json_string()?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SchemaError::Io(e.error))?;
        // Fsync parent directory to make the rename durable.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }
}
