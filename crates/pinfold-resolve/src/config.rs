use crate::ResolveError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// All upstream endpoints and policy the generator consults.
///
/// Every field has a default pointing at the real upstream; a TOML
/// config file can override any subset (tests point the endpoints at
/// local mock servers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Release channel recorded in the manifest head.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Editor release listing API (versioned, JSON).
    #[serde(default = "default_releases_url")]
    pub releases_url: String,
    /// Editor source repository, cloned at the newest release tag.
    #[serde(default = "default_editor_repo")]
    pub editor_repo: String,
    /// Pinned product descriptor override fetched into the app module.
    #[serde(default = "default_product_json_url")]
    pub product_json_url: String,
    /// Base URL of the electron binary release train.
    #[serde(default = "default_electron_release_base")]
    pub electron_release_base: String,
    /// Base URL of the iojs headers tarball downloads.
    #[serde(default = "default_iojs_base")]
    pub iojs_base: String,
    /// Raw-file base of the ripgrep wrapper package (install script).
    #[serde(default = "default_ripgrep_script_base")]
    pub ripgrep_script_base: String,
    /// Base URL of the ripgrep binary releases.
    #[serde(default = "default_ripgrep_release_base")]
    pub ripgrep_release_base: String,
    /// Release API returning the latest yarn release and its assets.
    #[serde(default = "default_yarn_release_api")]
    pub yarn_release_api: String,
    /// Shared electron base application descriptor.
    #[serde(default = "default_base_app_url")]
    pub base_app_url: String,
    #[serde(default = "default_git_archive_url")]
    pub git_archive_url: String,
    #[serde(default = "default_imagemagick_archive_url")]
    pub imagemagick_archive_url: String,
    #[serde(default = "default_node_archive_url")]
    pub node_archive_url: String,
    /// Builder script shipped next to the manifest and run inside the
    /// sandbox to consume it.
    #[serde(default = "default_builder_script")]
    pub builder_script: String,
    #[serde(default = "default_build_command")]
    pub build_command: String,
    /// Permission grants for the manifest head.
    #[serde(default = "default_finish_args")]
    pub finish_args: Vec<String>,
    /// Modular-language tool roots to resolve and install.
    #[serde(default)]
    pub tools: Vec<ToolRoot>,
}

/// One requested root package path in the modular-language ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolRoot {
    pub path: String,
    /// When set, the tool's binary is built relocated under this name
    /// instead of plainly installed.
    #[serde(default)]
    pub renamed_binary: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            branch: default_branch(),
            releases_url: default_releases_url(),
            editor_repo: default_editor_repo(),
            product_json_url: default_product_json_url(),
            electron_release_base: default_electron_release_base(),
            iojs_base: default_iojs_base(),
            ripgrep_script_base: default_ripgrep_script_base(),
            ripgrep_release_base: default_ripgrep_release_base(),
            yarn_release_api: default_yarn_release_api(),
            base_app_url: default_base_app_url(),
            git_archive_url: default_git_archive_url(),
            imagemagick_archive_url: default_imagemagick_archive_url(),
            node_archive_url: default_node_archive_url(),
            builder_script: default_builder_script(),
            build_command: default_build_command(),
            finish_args: default_finish_args(),
            tools: Vec::new(),
        }
    }
}

fn default_branch() -> String {
    "stable".to_owned()
}
fn default_releases_url() -> String {
    "https://vscode-update.azurewebsites.net/api/releases/stable".to_owned()
}
fn default_editor_repo() -> String {
    "https://github.com/Microsoft/vscode.git".to_owned()
}
fn default_product_json_url() -> String {
    "https://raw.githubusercontent.com/Microsoft/vscode/b00945fc8c79f6db74b280ef53eba060ed9a1388/product.json"
        .to_owned()
}
fn default_electron_release_base() -> String {
    "https://github.com/electron/electron/releases/download".to_owned()
}
fn default_iojs_base() -> String {
    "https://atom.io/download/electron".to_owned()
}
fn default_ripgrep_script_base() -> String {
    "https://github.com/roblourens/vscode-ripgrep/raw".to_owned()
}
fn default_ripgrep_release_base() -> String {
    "https://github.com/roblourens/ripgrep/releases/download".to_owned()
}
fn default_yarn_release_api() -> String {
    "https://api.github.com/repos/yarnpkg/yarn/releases/latest".to_owned()
}
fn default_base_app_url() -> String {
    "https://github.com/flathub/io.atom.electron.BaseApp/raw/master/io.atom.electron.BaseApp.json"
        .to_owned()
}
fn default_git_archive_url() -> String {
    "https://www.kernel.org/pub/software/scm/git/git-2.16.3.tar.xz".to_owned()
}
fn default_imagemagick_archive_url() -> String {
    "https://www.imagemagick.org/download/releases/ImageMagick-7.0.7-28.tar.xz".to_owned()
}
fn default_node_archive_url() -> String {
    "https://nodejs.org/dist/v8.9.1/node-v8.9.1.tar.xz".to_owned()
}
fn default_builder_script() -> String {
    "build.py".to_owned()
}
fn default_build_command() -> String {
    "python3 build.py".to_owned()
}
fn default_finish_args() -> Vec<String> {
    [
        "--share=ipc",
        "--socket=x11",
        "--socket=pulseaudio",
        "--share=network",
        "--device=dri",
        "--filesystem=host",
        "--persist=.pki",
        "--talk-name=org.freedesktop.Notifications",
    ]
    .map(str::to_owned)
    .to_vec()
}

pub fn parse_config_str(input: &str) -> Result<GeneratorConfig, ResolveError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<GeneratorConfig, ResolveError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
