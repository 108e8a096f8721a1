//! Persistent caching with redb.
//!
//! Caches extracted tags per file, keyed by absolute path and validated by
//! an exact (mtime, size) stamp. Degrades to memory when the store cannot
//! be opened.

mod store;

pub use store::{cache_dir_name, TagCache, TAGS_CACHE_VERSION};
