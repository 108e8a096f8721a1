//! Tag extraction orchestration.
//!
//! Ties the language registry, the tree-sitter extractor, and the regex
//! lexer into one entry point. The ladder:
//!
//! 1. No language or no grammar for it -> lexer fallback (refs only)
//! 2. Grammar path -> parse + run the tag query
//! 3. Grammar yielded zero references -> rerun the lexer for refs, keep
//!    the grammar's definitions
//!
//! Extraction is pure with respect to `content`: same text, same tags.
//! Nothing here is fatal; the worst case is an empty tag list.

use std::cell::RefCell;
use std::path::Path;

use crate::extraction::lexer::lex_references;
use crate::extraction::treesitter::{language_for_path, TreeSitterExtractor};
use crate::types::Tag;

thread_local! {
    /// Thread-local extractor (tree-sitter parsers are not thread-safe)
    static TS_EXTRACTOR: RefCell<TreeSitterExtractor> = RefCell::new(TreeSitterExtractor::new());
}

/// Extract symbol tags from one file's contents.
///
/// `fname` is the absolute path (tag identity), `rel_fname` the display
/// path. The file is not read here; the caller already has `content`.
pub fn extract_tags(content: &str, fname: &str, rel_fname: &str) -> Vec<Tag> {
    let language = language_for_path(Path::new(fname));

    let lang = match language {
        Some(l) if TreeSitterExtractor::supports_language(l) => l,
        hint => return lex_references(content, fname, rel_fname, hint),
    };

    let mut tags = TS_EXTRACTOR.with(|p| {
        p.borrow_mut()
            .extract_tags(content, lang, fname, rel_fname)
    });

    // A grammar that produced no references (terse file, partial parse)
    // still needs reference edges for ranking; recover them lexically.
    if !tags.iter().any(|t| t.is_ref()) {
        tags.extend(lex_references(content, fname, rel_fname, Some(lang)));
    }

    tags
}
