use crate::source::SourceRecord;
use serde::{Deserialize, Serialize};

/// Build options forwarded verbatim to the sandboxed builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_path: Option<String>,
}

/// One component of the assembled manifest: a name, how to build it,
/// and the pinned sources it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildModule {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildsystem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_options: Option<BuildOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_opts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_install: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_arches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRecord>,
}

impl BuildModule {
    pub fn new(name: impl Into<String>) -> Self {
        BuildModule {
            name: name.into(),
            buildsystem: None,
            build_options: None,
            config_opts: Vec::new(),
            build_commands: Vec::new(),
            post_install: Vec::new(),
            cleanup: Vec::new(),
            only_arches: None,
            sources: Vec::new(),
        }
    }

    /// Sort sources by locator and build commands lexicographically so
    /// the serialized module is independent of resolution order.
    pub fn normalize(&mut self) {
        self.sources
            .sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        self.build_commands.sort();
        if let Some(arches) = &mut self.only_arches {
            arches.sort();
        }
    }
}
