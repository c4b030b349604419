//! Upstream shape classification
//!
//! Each recognized shape is an anchored, case-insensitive pattern. Several
//! shapes are prefixes of one another, so they are tried in a fixed order and
//! the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Which upstream resource a normalized path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// `github.com/<owner>/<repo>/releases/...` or `/archive/...`
    ReleaseOrArchive,
    /// `github.com/<owner>/<repo>/blob/...` or `/raw/...`
    BlobOrRaw,
    /// Smart-HTTP git endpoints: `/info/refs`, `/git-upload-pack`, ...
    GitInfoOrUpload,
    /// `raw.githubusercontent.com` and `raw.github.com`
    RawContentHost,
    /// `gist.githubusercontent.com` and `gist.github.com`
    Gist,
    /// `github.com/<owner>/<repo>/tags...`
    Tags,
    /// `api.github.com`
    ApiHost,
    /// `git.io` short links
    ShortLink,
    /// Anything else; served from the asset origin.
    Unmatched,
}

impl Classification {
    /// Relayed through the engine as-is. Blob paths get redirected first and
    /// unmatched paths go to the asset origin.
    pub fn is_relayed(self) -> bool {
        !matches!(self, Self::BlobOrRaw | Self::Unmatched)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReleaseOrArchive => "release-or-archive",
            Self::BlobOrRaw => "blob-or-raw",
            Self::GitInfoOrUpload => "git-info-or-upload",
            Self::RawContentHost => "raw-content-host",
            Self::Gist => "gist",
            Self::Tags => "tags",
            Self::ApiHost => "api-host",
            Self::ShortLink => "short-link",
            Self::Unmatched => "unmatched",
        };
        f.write_str(name)
    }
}

/// Ordered shape table. The optional scheme lets the same table serve both
/// normalized paths and absolute redirect targets.
static SHAPES: Lazy<Vec<(Classification, Regex)>> = Lazy::new(|| {
    [
        (
            Classification::ReleaseOrArchive,
            r"^(?:https?://)?github\.com/.+?/.+?/(?:releases|archive)/.*$",
        ),
        (
            Classification::BlobOrRaw,
            r"^(?:https?://)?github\.com/.+?/.+?/(?:blob|raw)/.*$",
        ),
        (
            Classification::GitInfoOrUpload,
            r"^(?:https?://)?github\.com/.+?/.+?/(?:info|git-).*$",
        ),
        (
            Classification::RawContentHost,
            r"^(?:https?://)?raw\.(?:githubusercontent|github)\.com/.+?/.+?/.+?/.+$",
        ),
        (
            Classification::Gist,
            r"^(?:https?://)?gist\.(?:githubusercontent|github)\.com/.+?/.+?/.+$",
        ),
        (
            Classification::Tags,
            r"^(?:https?://)?github\.com/.+?/.+?/tags.*$",
        ),
        (Classification::ApiHost, r"^(?:https?://)?api\.github\.com/.*$"),
        (Classification::ShortLink, r"^(?:https?://)?git\.io/.*$"),
    ]
    .into_iter()
    .map(|(tag, pattern)| {
        let regex = Regex::new(&format!("(?i){}", pattern)).expect("valid shape regex");
        (tag, regex)
    })
    .collect()
});

/// Classify a normalized path. Total: every input gets exactly one tag.
pub fn classify(path: &str) -> Classification {
    SHAPES
        .iter()
        .find(|(_, regex)| regex.is_match(path))
        .map(|(tag, _)| *tag)
        .unwrap_or(Classification::Unmatched)
}

/// Whether an absolute URL is one of the recognized upstream shapes, i.e.
/// safe to hand back to the client as a relay location.
pub fn is_recognized(url: &str) -> bool {
    classify(url) != Classification::Unmatched
}
