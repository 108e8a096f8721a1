//! Ranking pipeline - from tags to importance scores.
//!
//! The ranking system combines:
//! - A weighted reference graph between files (one edge per referenced
//!   identifier, sqrt-scaled by reference count)
//! - Personalized PageRank with chat/mentioned-file teleport bias
//! - Distribution of file rank onto individual (file, identifier) pairs

mod graph;
mod pagerank;

pub use graph::{build_graph, EdgeData, FileTags, TagGraph};
pub use pagerank::rank_tags;
