//! Mention extraction from free-form context text.
//!
//! The engine boosts identifiers and files the conversation is already
//! talking about. These helpers derive those sets from raw text: the CLI
//! feeds `--context` through them before calling the builder.
//!
//! Matching is intentionally conservative: a basename only counts as a
//! file mention when it is unambiguous in the repo, and identifier-to-file
//! stem matching requires at least five characters so short words like
//! `main` or `test` don't drag in half the tree.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Non-identifier separator; everything `\W` in the original.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("invalid word-split regex"));

/// Minimum length for identifier-to-file-stem matching.
const MIN_STEM_LEN: usize = 5;

/// Split context text into candidate identifiers.
pub fn extract_identifiers(text: &str) -> HashSet<String> {
    NON_WORD
        .split(text)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Find repo files mentioned in context text.
///
/// A word matches when it equals a repo-relative path, or when it equals a
/// basename that occurs exactly once in the repo. Basenames already present
/// in the chat set are skipped; the caller sees those files anyway.
pub fn extract_file_mentions(
    text: &str,
    rel_files: &[String],
    chat_rel: &HashSet<String>,
) -> HashSet<String> {
    let words: HashSet<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_end_matches([',', '.', '!', ';', ':', '?'])
                .trim_matches(['"', '\'', '`', '*', '_'])
                .replace('\\', "/")
        })
        .filter(|w| !w.is_empty())
        .collect();

    let mut mentioned = HashSet::new();

    for rel in rel_files {
        if words.contains(rel.as_str()) {
            mentioned.insert(rel.clone());
        }
    }

    // Basename matching: only names that look like file names (carry a dot,
    // underscore, or dash) and map to exactly one repo file.
    let mut by_basename: HashMap<&str, Vec<&String>> = HashMap::new();
    for rel in rel_files {
        let base = basename(rel);
        if base.contains('.') || base.contains('_') || base.contains('-') {
            by_basename.entry(base).or_default().push(rel);
        }
    }

    let chat_basenames: HashSet<&str> = chat_rel.iter().map(|r| basename(r)).collect();

    for (base, rels) in by_basename {
        if chat_basenames.contains(base) {
            continue;
        }
        if rels.len() == 1 && words.contains(base) {
            mentioned.insert(rels[0].clone());
        }
    }

    mentioned
}

/// Match mentioned identifiers against file stems.
///
/// `DatabaseManager` mentioned in context pulls in `database_manager.py`
/// when the lowercased stem matches; both sides need `MIN_STEM_LEN` chars.
pub fn match_identifiers_to_files(
    identifiers: &HashSet<String>,
    rel_files: &[String],
) -> HashSet<String> {
    if identifiers.is_empty() {
        return HashSet::new();
    }

    let mut by_stem: HashMap<String, Vec<&String>> = HashMap::new();
    for rel in rel_files {
        let stem = Path::new(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if stem.len() >= MIN_STEM_LEN {
            by_stem.entry(stem).or_default().push(rel);
        }
    }

    let mut matches = HashSet::new();
    for ident in identifiers {
        if ident.len() < MIN_STEM_LEN {
            continue;
        }
        if let Some(rels) = by_stem.get(&ident.to_lowercase()) {
            matches.extend(rels.iter().map(|r| (*r).clone()));
        }
    }

    matches
}

fn basename(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_identifiers() {
        let idents = extract_identifiers("call parse_config() then Renderer.render");
        assert!(idents.contains("parse_config"));
        assert!(idents.contains("Renderer"));
        assert!(idents.contains("render"));
        assert!(!idents.contains(""));
    }

    #[test]
    fn test_full_path_mention() {
        let files = rels(&["src/render.py", "src/parse.py"]);
        let found = extract_file_mentions("look at src/render.py first", &files, &HashSet::new());
        assert!(found.contains("src/render.py"));
        assert!(!found.contains("src/parse.py"));
    }

    #[test]
    fn test_unique_basename_mention() {
        let files = rels(&["src/render_tree.py", "src/parse.py"]);
        let found =
            extract_file_mentions("the bug is in render_tree.py", &files, &HashSet::new());
        assert!(found.contains("src/render_tree.py"));
    }

    #[test]
    fn test_ambiguous_basename_ignored() {
        let files = rels(&["a/util.py", "b/util.py"]);
        let found = extract_file_mentions("check util.py", &files, &HashSet::new());
        assert!(found.is_empty());
    }

    #[test]
    fn test_chat_basenames_skipped() {
        let files = rels(&["src/render_tree.py"]);
        let chat: HashSet<String> = ["render_tree.py".to_string()].into();
        let found = extract_file_mentions("see render_tree.py", &files, &chat);
        assert!(found.is_empty());
    }

    #[test]
    fn test_punctuation_and_quotes_stripped() {
        let files = rels(&["src/render_tree.py"]);
        let found =
            extract_file_mentions("edit `render_tree.py`, please", &files, &HashSet::new());
        assert!(found.contains("src/render_tree.py"));
    }

    #[test]
    fn test_identifier_stem_matching() {
        let files = rels(&["src/database_manager.py", "src/main.py"]);
        let idents: HashSet<String> = ["Database_Manager".to_string(), "main".to_string()].into();

        let found = match_identifiers_to_files(&idents, &files);
        assert!(found.contains("src/database_manager.py"));
        // "main" is below the length floor
        assert!(!found.contains("src/main.py"));
    }
}
