//! Toolchain and library modules the editor build needs inside the
//! sandbox, each pinned at manifest-generation time.
//!
//! Version-control sources carry hard-coded tag/commit pairs; archive
//! sources are pinned by fetching and digesting the exact tarball named
//! in the configuration.

use crate::config::GeneratorConfig;
use crate::ResolveError;
use pinfold_fetch::Fetcher;
use pinfold_schema::module::{BuildModule, BuildOptions};
use pinfold_schema::source::{GitSource, SourceRecord};

fn pinned_archive(fetcher: &Fetcher, url: &str) -> Result<SourceRecord, ResolveError> {
    let pinned = fetcher.locate_sha512(url)?;
    Ok(SourceRecord::archive(pinned.url, pinned.sha512))
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// The fixed prerequisite modules, in build order.
pub fn prerequisite_modules(
    fetcher: &Fetcher,
    config: &GeneratorConfig,
) -> Result<Vec<BuildModule>, ResolveError> {
    let mut libsecret = BuildModule::new("libsecret");
    libsecret.config_opts = owned(&[
        "--disable-manpages",
        "--disable-gtk-doc",
        "--disable-static",
        "--disable-introspection",
    ]);
    libsecret.cleanup = owned(&[
        "/bin",
        "/include",
        "/lib/pkgconfig",
        "/share/gtk-doc",
        "*.la",
    ]);
    libsecret.sources = vec![SourceRecord::Git(GitSource {
        url: "https://git.gnome.org/browse/libsecret.git".to_owned(),
        tag: Some("0.18.5".to_owned()),
        commit: "0c468b56b074d8b8cf29e58f3c488f12161a3969".to_owned(),
        dest: None,
    })];

    let mut libxkbfile = BuildModule::new("libxkbfile");
    libxkbfile.config_opts = owned(&["--disable-static"]);
    libxkbfile.cleanup = owned(&["/include", "/lib/*.la", "/lib/pkgconfig"]);
    libxkbfile.sources = vec![SourceRecord::Git(GitSource {
        url: "https://anongit.freedesktop.org/git/xorg/lib/libxkbfile.git".to_owned(),
        tag: Some("libxkbfile-1.0.9".to_owned()),
        commit: "de4f2307448583988a55a587cb6a3f43e4868378".to_owned(),
        dest: None,
    })];

    // The sandbox runtime's git is too old for the lockfile-driven
    // mirror setup, so a pinned one is built into the app prefix.
    let mut git = BuildModule::new("git");
    git.config_opts = owned(&["--without-tcltk"]);
    git.sources = vec![pinned_archive(fetcher, &config.git_archive_url)?];

    let mut imagemagick = BuildModule::new("ImageMagick");
    imagemagick.build_options = Some(BuildOptions {
        prefix: Some("/app/local".to_owned()),
        append_path: None,
    });
    imagemagick.cleanup = owned(&["/local"]);
    imagemagick.config_opts = owned(&[
        "--enable-static=no",
        "--with-modules",
        "--disable-docs",
        "--disable-deprecated",
        "--without-autotrace",
        "--without-bzlib",
        "--without-djvu",
        "--without-dps",
        "--without-fftw",
        "--without-fontconfig",
        "--without-fpx",
        "--without-freetype",
        "--without-gvc",
        "--without-jbig",
        "--without-jpeg",
        "--without-lcms",
        "--without-lzma",
        "--without-magick-plus-plus",
        "--without-openexr",
        "--without-openjp2",
        "--without-pango",
        "--without-raqm",
        "--without-tiff",
        "--without-webp",
        "--without-wmf",
        "--without-x",
        "--without-xml",
        "--without-zlib",
    ]);
    imagemagick.sources = vec![pinned_archive(fetcher, &config.imagemagick_archive_url)?];

    let mut node = BuildModule::new("node");
    node.build_options = Some(BuildOptions {
        prefix: Some("/app/local".to_owned()),
        append_path: None,
    });
    node.cleanup = owned(&["/local"]);
    node.post_install = owned(&[
        "python -m compileall /app/local/lib/node_modules/npm/node_modules/node-gyp",
    ]);
    node.sources = vec![pinned_archive(fetcher, &config.node_archive_url)?];

    Ok(vec![libsecret, libxkbfile, git, imagemagick, node])
}
