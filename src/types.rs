//! Core types for tagmap - the ranked-tag repository mapper.
//!
//! Key design decisions:
//! - `Arc<str>` for shared ownership of path and identifier strings; a large
//!   repo produces many tags that all point at the same few file names
//! - Frozen/immutable records so tags can be cached and shared freely
//! - 0-based line numbers throughout; the renderer indexes straight into the
//!   file's line array

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde serialization helpers for Arc<str> fields
mod arc_str_serde {
    use super::*;

    pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.into())
    }
}

/// The fundamental unit of code structure - a symbol tag.
/// Represents either a definition ("def") or reference ("ref").
///
/// This is the atom from which all ranking and rendering is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Relative path for display, forward-slash normalized (e.g. "src/lib.rs")
    #[serde(with = "arc_str_serde")]
    pub rel_fname: Arc<str>,
    /// Absolute path; graph node identity and cache key
    #[serde(with = "arc_str_serde")]
    pub fname: Arc<str>,
    /// Symbol name (function, class, variable name)
    #[serde(with = "arc_str_serde")]
    pub name: Arc<str>,
    /// Start row of the captured name node (0-based)
    pub line: u32,
    /// Definition or reference
    pub kind: TagKind,
}

/// Tag kind - definition or reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// Symbol definition (function def, class def, constant)
    Def,
    /// Symbol reference (function call, identifier use)
    Ref,
}

impl Tag {
    /// Check if this is a definition tag
    pub fn is_def(&self) -> bool {
        matches!(self.kind, TagKind::Def)
    }

    /// Check if this is a reference tag
    pub fn is_ref(&self) -> bool {
        matches!(self.kind, TagKind::Ref)
    }
}

/// A definition with its computed importance rank, ready for selection.
///
/// Produced by the ranker: one entry per `(file, identifier)` pair, carrying
/// the best (lowest) definition line as the render anchor.
#[derive(Debug, Clone)]
pub struct RankedTag {
    /// Importance score (distributed PageRank mass)
    pub rank: f64,
    /// Relative path for display
    pub rel_fname: Arc<str>,
    /// Absolute path for I/O
    pub fname: Arc<str>,
    /// Symbol name
    pub name: Arc<str>,
    /// Anchor line of the definition (0-based)
    pub line: u32,
}

/// Cache refresh policy for tag extraction.
///
/// Controls when the persistent tag cache is consulted and written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Use cache when the file's (mtime, size) stamp matches; otherwise
    /// re-extract and write back.
    #[default]
    Auto,
    /// Always re-extract the scanned files; still write back.
    Files,
    /// Use cache unconditionally; never write back.
    Manual,
    /// Drop the cache, re-extract everything, write back.
    Always,
}

impl FromStr for RefreshMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(RefreshMode::Auto),
            "files" => Ok(RefreshMode::Files),
            "manual" => Ok(RefreshMode::Manual),
            "always" => Ok(RefreshMode::Always),
            other => bail!(
                "unknown refresh mode {other:?} (expected auto, files, manual, or always)"
            ),
        }
    }
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefreshMode::Auto => "auto",
            RefreshMode::Files => "files",
            RefreshMode::Manual => "manual",
            RefreshMode::Always => "always",
        };
        f.write_str(s)
    }
}

/// Identity stamp of a file's on-disk state: modification time in nanoseconds
/// since UNIX_EPOCH plus byte size.
///
/// Cache validity is exact equality of the whole stamp, not a newer-than test:
/// a restored backup with an older mtime must also invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    /// Modification time, nanoseconds since UNIX_EPOCH
    pub mtime_ns: u128,
    /// File size in bytes
    pub size: u64,
}

impl FileStamp {
    /// Read the stamp for a file from the filesystem.
    pub fn read(path: &std::path::Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?;
        let mtime = meta
            .modified()
            .with_context(|| format!("no mtime for {}", path.display()))?;
        let mtime_ns = mtime
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .with_context(|| format!("mtime before epoch for {}", path.display()))?
            .as_nanos();
        Ok(Self {
            mtime_ns,
            size: meta.len(),
        })
    }
}
