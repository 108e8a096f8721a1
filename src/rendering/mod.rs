//! Output rendering - from (file, line) anchors to the final map text.
//!
//! One renderer: elided tree-style source listings with `⋮` markers and
//! context hoisting. Plain text only; the output is meant for an LLM
//! prompt, not a terminal.

mod tree;

pub use tree::{FileBlock, TreeRenderer};
