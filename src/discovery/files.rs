//! Source file discovery for the CLI.
//!
//! The map engine takes its scanned set as an argument; this walk derives
//! one from a directory. Traversal goes through the `ignore` crate so
//! .gitignore rules apply, entries are visited in sorted path order so the
//! scan is reproducible, and content the extractor can do nothing with
//! (binaries, generated blobs) is dropped up front.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use ignore::WalkBuilder;

/// Find mappable source files under `directory`.
///
/// A path that is already a file is returned as-is; a missing path is an
/// error. Directory results come back in walk order, which is sorted and
/// therefore stable across runs.
pub fn find_source_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if directory.is_file() {
        return Ok(vec![directory.to_path_buf()]);
    }
    if !directory.is_dir() {
        bail!("path does not exist: {}", directory.display());
    }

    // Dotfiles stay in (CI configs and rc files carry real identifiers),
    // .gitignore applies even without a .git directory, and the sorted
    // walk makes the scan order reproducible without a post-pass.
    let mut builder = WalkBuilder::new(directory);
    builder
        .hidden(false)
        .require_git(false)
        .follow_links(false)
        .sort_by_file_path(|a, b| a.cmp(b));

    let mut files = Vec::new();
    for entry in builder.build() {
        let Ok(entry) = entry else {
            // Unreadable entry: permissions, broken symlink. Skip.
            continue;
        };
        if !entry.file_type().map_or(false, |t| t.is_file()) {
            continue;
        }
        if is_mappable(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Whether extraction could produce tags for this path.
///
/// Grammar-backed languages parse; anything else still yields reference
/// tags through the identifier lexer, which only makes sense for text.
/// Extension-less files pass: they may hit a filename override like
/// `Makefile`.
fn is_mappable(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => !is_opaque(&ext.to_ascii_lowercase()),
        None => true,
    }
}

/// Content the extractor has no use for: not text at all, or generated
/// text whose identifier soup would drown the reference graph (a single
/// lock file can outweigh every real symbol in the repo).
fn is_opaque(ext: &str) -> bool {
    matches!(
        ext,
        // compiled and packaged artifacts
        "o" | "a" | "so" | "dylib" | "dll" | "exe" | "lib" | "class" | "jar"
            | "pyc" | "pyo" | "wasm" | "bin" | "dat"
            // images and fonts
            | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "svg" | "webp"
            | "ttf" | "otf" | "eot" | "woff" | "woff2"
            // audio and video
            | "mp3" | "mp4" | "mkv" | "wav" | "ogg" | "webm" | "avi" | "mov"
            // documents
            | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            // archives
            | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar" | "tgz"
            // databases and generated manifests
            | "db" | "sqlite" | "sqlite3" | "lock" | "sum"
    )
}
