//! Source file discovery.
//!
//! Derives a scanned file set from a directory: gitignore-aware, sorted
//! walk order, opaque content filtered out. CLI-side only; the engine
//! takes its file set as an argument.

mod files;

pub use files::find_source_files;
