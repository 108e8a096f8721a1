//! Regex identifier lexer - the fallback extraction path.
//!
//! Unknown languages still contribute reference edges to the graph: every
//! identifier-class token becomes a ref-kind tag. No definitions are emitted
//! here; only a grammar can tell a definition from a use.
//!
//! The tokenizer is deliberately simple. Tokens that are really keywords or
//! noise never define anything anywhere, so they create no edges downstream.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Tag, TagKind};

/// Identifier-class token: a letter or underscore followed by word characters.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("invalid identifier regex"));

/// Tokenize `content` and emit one ref-kind tag per identifier token.
///
/// The `_language_hint` names the language when the registry resolved one
/// without having a grammar for it (e.g. `make`); the regex tokenizer treats
/// every language the same.
pub fn lex_references(
    content: &str,
    fname: &str,
    rel_fname: &str,
    _language_hint: Option<&str>,
) -> Vec<Tag> {
    let rel: Arc<str> = Arc::from(rel_fname);
    let abs: Arc<str> = Arc::from(fname);

    let mut tags = Vec::new();
    for (row, line) in content.lines().enumerate() {
        for m in IDENTIFIER.find_iter(line) {
            tags.push(Tag {
                rel_fname: Arc::clone(&rel),
                fname: Arc::clone(&abs),
                name: Arc::from(m.as_str()),
                line: row as u32,
                kind: TagKind::Ref,
            });
        }
    }
    tags
}
