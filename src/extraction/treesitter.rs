//! Language registry and tree-sitter tag extraction.
//!
//! Resolves a file path to a language and its .scm tag query, parses the
//! source into a concrete syntax tree, and turns query matches into tags.
//!
//! # Query Format
//!
//! Each query pattern pairs an outer capture with an inner `@name` capture:
//! - `@definition.class`, `@definition.function`, ... - the defining node
//! - `@reference.call`, `@reference.class`, ... - the referencing node
//! - `@name` - the identifier whose text and start row become the tag
//!
//! The registry does not interpret the suffix after `definition.` /
//! `reference.`; only the prefix decides the tag kind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser as TsParser, Query, QueryCursor};

use crate::types::{Tag, TagKind};

/// Embedded query files - compiled into the binary
mod queries {
    pub const PYTHON: &str = include_str!("../../queries/python-tags.scm");
    pub const RUST: &str = include_str!("../../queries/rust-tags.scm");
    pub const JAVASCRIPT: &str = include_str!("../../queries/javascript-tags.scm");
    pub const TYPESCRIPT: &str = include_str!("../../queries/typescript-tags.scm");
    pub const GO: &str = include_str!("../../queries/go-tags.scm");
    pub const JAVA: &str = include_str!("../../queries/java-tags.scm");
    pub const C: &str = include_str!("../../queries/c-tags.scm");
    pub const CPP: &str = include_str!("../../queries/cpp-tags.scm");
    pub const RUBY: &str = include_str!("../../queries/ruby-tags.scm");
    pub const PHP: &str = include_str!("../../queries/php-tags.scm");
}

/// Language configuration with grammar and compiled query
struct LangConfig {
    language: Language,
    query: Query,
}

/// Get tree-sitter language by name
fn get_language(name: &str) -> Option<Language> {
    match name {
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        "c" => Some(tree_sitter_c::LANGUAGE.into()),
        "cpp" => Some(tree_sitter_cpp::LANGUAGE.into()),
        "ruby" => Some(tree_sitter_ruby::LANGUAGE.into()),
        "php" => Some(tree_sitter_php::LANGUAGE_PHP.into()),
        _ => None,
    }
}

/// Get query source for a language
fn get_query_source(name: &str) -> Option<&'static str> {
    match name {
        "python" => Some(queries::PYTHON),
        "rust" => Some(queries::RUST),
        "javascript" => Some(queries::JAVASCRIPT),
        "typescript" | "tsx" => Some(queries::TYPESCRIPT),
        "go" => Some(queries::GO),
        "java" => Some(queries::JAVA),
        "c" => Some(queries::C),
        "cpp" => Some(queries::CPP),
        "ruby" => Some(queries::RUBY),
        "php" => Some(queries::PHP),
        _ => None,
    }
}

/// Map file extension (lowercased) to language name
pub fn extension_to_language(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "pyi" | "pyw" => Some("python"),
        "rs" => Some("rust"),
        "js" | "mjs" | "cjs" | "jsx" => Some("javascript"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "go" => Some("go"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Some("cpp"),
        "rb" | "rake" | "gemspec" => Some("ruby"),
        "php" | "php3" | "php4" | "php5" | "phtml" => Some("php"),
        "kt" | "kts" => Some("kotlin"),
        "scala" | "sc" => Some("scala"),
        "swift" => Some("swift"),
        "lua" => Some("lua"),
        "pl" | "pm" => Some("perl"),
        "sh" | "bash" | "zsh" => Some("shell"),
        _ => None,
    }
}

/// Hard-coded filename overrides for extension-less files.
///
/// None of these have a grammar in the registry, so they take the lexer
/// fallback with the returned name as a hint.
pub fn filename_override(file_name: &str) -> Option<&'static str> {
    match file_name {
        "Makefile" | "makefile" | "GNUmakefile" => Some("make"),
        "Dockerfile" | "Containerfile" => Some("dockerfile"),
        "CMakeLists.txt" => Some("cmake"),
        "Rakefile" => Some("ruby"),
        "Gemfile" => Some("ruby"),
        _ => None,
    }
}

/// Resolve a path to a language name, extension first (case-insensitive),
/// then filename overrides.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(lang) = extension_to_language(&ext.to_ascii_lowercase()) {
            return Some(lang);
        }
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(filename_override)
}

/// Cached language configurations
static LANG_CONFIGS: Lazy<HashMap<&'static str, LangConfig>> = Lazy::new(|| {
    let mut configs = HashMap::new();

    for lang_name in &[
        "python",
        "rust",
        "javascript",
        "typescript",
        "tsx",
        "go",
        "java",
        "c",
        "cpp",
        "ruby",
        "php",
    ] {
        if let (Some(language), Some(query_src)) =
            (get_language(lang_name), get_query_source(lang_name))
        {
            // A query that fails to compile (grammar version drift) drops
            // that one language; the rest of the registry stays usable.
            match Query::new(&language, query_src) {
                Ok(query) => {
                    configs.insert(*lang_name, LangConfig { language, query });
                }
                Err(e) => {
                    eprintln!("warning: failed to compile tag query for {lang_name}: {e}");
                }
            }
        }
    }

    configs
});

/// Tree-sitter based tag extractor.
pub struct TreeSitterExtractor {
    /// Parser instance; tree-sitter parsers are not thread-safe, so callers
    /// hold one per thread.
    parser: TsParser,
}

impl TreeSitterExtractor {
    pub fn new() -> Self {
        Self {
            parser: TsParser::new(),
        }
    }

    /// Check if the registry has a grammar + query for a language.
    pub fn supports_language(lang: &str) -> bool {
        LANG_CONFIGS.contains_key(lang)
    }

    /// Extract tags from source code using the language's tag query.
    ///
    /// Returns an empty vector on parse failure or unsupported language;
    /// extraction problems are never fatal.
    pub fn extract_tags(
        &mut self,
        content: &str,
        language: &str,
        fname: &str,
        rel_fname: &str,
    ) -> Vec<Tag> {
        let config = match LANG_CONFIGS.get(language) {
            Some(c) => c,
            None => return Vec::new(),
        };

        if self.parser.set_language(&config.language).is_err() {
            return Vec::new();
        }

        let tree = match self.parser.parse(content, None) {
            Some(t) => t,
            None => return Vec::new(),
        };

        let rel: Arc<str> = Arc::from(rel_fname);
        let abs: Arc<str> = Arc::from(fname);

        let capture_names = config.query.capture_names();
        let mut tags = Vec::new();
        let mut cursor = QueryCursor::new();

        let mut matches = cursor.matches(&config.query, tree.root_node(), content.as_bytes());
        while let Some(m) = matches.next() {
            let mut name: Option<&str> = None;
            let mut line: Option<u32> = None;
            let mut kind: Option<TagKind> = None;

            for capture in m.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");

                if capture_name == "name" {
                    line = Some(capture.node.start_position().row as u32);
                    name = capture.node.utf8_text(content.as_bytes()).ok();
                } else if capture_name.starts_with("definition.") {
                    kind = Some(TagKind::Def);
                } else if capture_name.starts_with("reference.") {
                    kind = Some(TagKind::Ref);
                }
            }

            if let (Some(name), Some(line), Some(kind)) = (name, line, kind) {
                if name.is_empty() {
                    continue;
                }
                tags.push(Tag {
                    rel_fname: Arc::clone(&rel),
                    fname: Arc::clone(&abs),
                    name: Arc::from(name),
                    line,
                    kind,
                });
            }
        }

        tags
    }
}

impl Default for TreeSitterExtractor {
    fn default() -> Self {
        Self::new()
    }
}
