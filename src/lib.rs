//! tagmap - ranked repository maps for LLM context seeding
//!
//! Produces a compact textual map of a source repository: the files with
//! the most relevant definitions, elided down to the lines that matter,
//! sized to a token budget. The map seeds a language-model session with
//! enough structure to reason about where to look next.
//!
//! # Architecture
//!
//! ```text
//! File Set → Tag Extraction → Graph Building → PageRank → Selection → Rendering
//!     ↓           ↓                ↓              ↓           ↓           ↓
//!  caller     tree-sitter      petgraph       power     binary      elided
//!  supplied    + .scm + lexer   DiGraph       iteration  search      snippets
//! ```
//!
//! Extraction results are cached per file in a redb store keyed by
//! (mtime, size), so warm runs skip parsing entirely.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use tagmap::{CharEstimator, ConsoleIo, MapBuilder};
//!
//! let mut builder = MapBuilder::new(
//!     "/path/to/repo",
//!     Arc::new(ConsoleIo),
//!     Arc::new(CharEstimator::default()),
//! )
//! .map_tokens(1024);
//!
//! let map = builder.generate_map(
//!     &[],
//!     &["/path/to/repo/src/main.rs".into()],
//!     &HashSet::new(),
//!     &HashSet::new(),
//!     false,
//! );
//! println!("{map}");
//! ```

pub mod cache;
pub mod discovery;
pub mod extraction;
pub mod io;
pub mod map;
pub mod mentions;
pub mod ranking;
pub mod rendering;
pub mod selection;
pub mod types;

// Re-export the public surface
pub use io::{CharEstimator, ConsoleIo, Io, Model, NoProgress, Progress};
pub use map::MapBuilder;
pub use types::{RankedTag, RefreshMode, Tag, TagKind};
