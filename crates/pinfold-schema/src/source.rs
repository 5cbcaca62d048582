use crate::SchemaError;
use serde::{Deserialize, Serialize};

/// An algorithm-tagged content digest, as produced by the resolvers.
///
/// Strong digests (`Sha512`, `Sha256`) are computed by fetching the
/// exact bytes; the weak `Sha1` is only accepted when the upstream
/// lockfile itself supplies it as the integrity fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    Sha512(String),
    Sha256(String),
    Sha1(String),
}

impl Digest {
    pub fn hex(&self) -> &str {
        match self {
            Digest::Sha512(h) | Digest::Sha256(h) | Digest::Sha1(h) => h,
        }
    }
}

/// Free-form metadata attached to a source record.
///
/// Ignored by the builder's fetch logic but consumed by later build
/// steps (the binary release train reconstructs its checksum listings
/// from the recorded versions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceComment {
    pub version: String,
}

/// A fully pinned, verifiable acquisition unit.
///
/// Every variant other than `Script` must be content-addressed: an
/// unverified network fetch is never permitted in the emitted manifest.
/// `verify_pinned` enforces this before assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceRecord {
    Archive(ArchiveSource),
    File(FileSource),
    Git(GitSource),
    Script(ScriptSource),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArchiveSource {
    pub url: String,
    pub sha512: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileSource {
    /// Remote location; mutually exclusive with `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local file shipped alongside the manifest; needs no digest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_arches: Option<Vec<String>>,
    #[serde(rename = "@comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<SourceComment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitSource {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Exact commit the clone is pinned to.
    pub commit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScriptSource {
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_filename: Option<String>,
}

impl FileSource {
    /// A remote file downloaded into `dest` under `dest_filename`.
    /// Still unpinned until a digest is applied.
    pub fn remote(
        url: impl Into<String>,
        dest: impl Into<String>,
        dest_filename: impl Into<String>,
    ) -> Self {
        FileSource {
            url: Some(url.into()),
            dest: Some(dest.into()),
            dest_filename: Some(dest_filename.into()),
            ..FileSource::default()
        }
    }

    /// Apply an algorithm-tagged digest to the matching field.
    pub fn with_digest(mut self, digest: Digest) -> Self {
        match digest {
            Digest::Sha512(h) => self.sha512 = Some(h),
            Digest::Sha256(h) => self.sha256 = Some(h),
            Digest::Sha1(h) => self.sha1 = Some(h),
        }
        self
    }

    pub fn digest(&self) -> Option<Digest> {
        if let Some(h) = &self.sha512 {
            Some(Digest::Sha512(h.clone()))
        } else if let Some(h) = &self.sha256 {
            Some(Digest::Sha256(h.clone()))
        } else {
            self.sha1.as_ref().map(|h| Digest::Sha1(h.clone()))
        }
    }
}

impl SourceRecord {
    pub fn archive(url: impl Into<String>, sha512: impl Into<String>) -> Self {
        SourceRecord::Archive(ArchiveSource {
            url: url.into(),
            sha512: sha512.into(),
        })
    }

    pub fn local_file(path: impl Into<String>) -> Self {
        SourceRecord::File(FileSource {
            path: Some(path.into()),
            ..FileSource::default()
        })
    }

    /// Stable ordering key: the locator (URL or local path), falling
    /// back to the destination filename for inline scripts. Sources
    /// within a module are sorted by this key before serialization.
    pub fn sort_key(&self) -> &str {
        match self {
            SourceRecord::Archive(s) => &s.url,
            SourceRecord::File(s) => s
                .url
                .as_deref()
                .or(s.path.as_deref())
                .or(s.dest_filename.as_deref())
                .unwrap_or(""),
            SourceRecord::Git(s) => &s.url,
            SourceRecord::Script(s) => s.dest_filename.as_deref().unwrap_or(""),
        }
    }

    /// Enforce the pinning invariant: non-script records carry a
    /// content digest (or are local files), git records an exact commit.
    pub fn verify_pinned(&self) -> Result<(), SchemaError> {
        match self {
            SourceRecord::Script(_) => Ok(()),
            SourceRecord::Archive(s) => {
                if s.sha512.is_empty() {
                    return Err(SchemaError::UnpinnedSource(s.url.clone()));
                }
                Ok(())
            }
            SourceRecord::File(s) => {
                if s.url.is_some() && !s.digest().is_some_and(|d| !d.hex().is_empty()) {
                    return Err(SchemaError::UnpinnedSource(self.sort_key().to_owned()));
                }
                if s.url.is_none() && s.path.is_none() {
                    return Err(SchemaError::UnpinnedSource(self.sort_key().to_owned()));
                }
                Ok(())
            }
            SourceRecord::Git(s) => {
                if s.commit.is_empty() {
                    return Err(SchemaError::UnpinnedCommit(s.url.clone()));
                }
                Ok(())
            }
        }
    }
}
