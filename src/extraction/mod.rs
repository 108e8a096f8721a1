//! Tag extraction from source code.
//!
//! This module handles:
//! - Resolving file paths to languages and .scm tag queries
//! - Parsing source files into ASTs and running the queries
//! - Lexer fallback for languages without a grammar
//!
//! # Extraction Strategy
//!
//! 1. Check the path against the language registry
//! 2. If a grammar is available -> AST-based extraction (defs + refs)
//! 3. Otherwise -> regex lexer (refs only)
//! 4. Grammar runs that yield no references get a lexer pass on top
//!
//! This ensures every readable file contributes at least reference edges
//! to the graph.

mod lexer;
mod tags;
mod treesitter;

pub use lexer::lex_references;
pub use tags::extract_tags;
pub use treesitter::{extension_to_language, language_for_path, TreeSitterExtractor};
