//! Map generation - the single entry point of the engine.
//!
//! `MapBuilder` owns the repo root, the injected collaborators, and the
//! refresh policy, and orchestrates the full pipeline:
//!
//! 1. Tag extraction over chat + scanned files, through the cache
//! 2. Reference graph construction with mention-aware edge weights
//! 3. Personalized PageRank and rank distribution onto definitions
//! 4. Budget fitting via binary search, rendering as it probes
//!
//! `generate_map` returns a `String`, never an error: per-file and cache
//! problems produce at most one warning each and degrade gracefully; an
//! impossible budget produces the empty string. The call is idempotent for
//! identical inputs and cache state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::TagCache;
use crate::extraction::extract_tags;
use crate::io::{Io, Model, NoProgress, Progress};
use crate::ranking::{build_graph, rank_tags, FileTags};
use crate::rendering::TreeRenderer;
use crate::selection::select_map;
use crate::types::{FileStamp, RefreshMode, Tag};

/// Divisor applied to the model's context window when the caller does not
/// set an explicit map budget.
const CONTEXT_FRACTION: usize = 16;
/// Floor for the defaulted budget.
const MIN_DEFAULT_TOKENS: usize = 1024;

/// Builds ranked repository maps.
///
/// Construct with the repo root and the injected collaborators, tune with
/// the builder methods, then call [`MapBuilder::generate_map`] as often as
/// needed; the tag cache persists across calls.
pub struct MapBuilder {
    root: PathBuf,
    io: Arc<dyn Io>,
    model: Arc<dyn Model>,
    progress: Arc<dyn Progress>,
    map_tokens: Option<usize>,
    refresh: RefreshMode,
    cancel: Arc<AtomicBool>,
    cache: Option<TagCache>,
    warned: HashSet<String>,
}

impl MapBuilder {
    pub fn new(root: impl Into<PathBuf>, io: Arc<dyn Io>, model: Arc<dyn Model>) -> Self {
        Self {
            root: root.into(),
            io,
            model,
            progress: Arc::new(NoProgress),
            map_tokens: None,
            refresh: RefreshMode::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            cache: None,
            warned: HashSet::new(),
        }
    }

    /// Token budget for the rendered map. When unset, defaults from the
    /// model's context window.
    pub fn map_tokens(mut self, tokens: usize) -> Self {
        self.map_tokens = Some(tokens);
        self
    }

    /// Cache refresh policy (default: [`RefreshMode::Auto`]).
    pub fn refresh(mut self, mode: RefreshMode) -> Self {
        self.refresh = mode;
        self
    }

    /// Progress reporter for the extraction phase.
    pub fn progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Cooperative cancellation flag, checked between files. A cancelled
    /// run still commits the tags computed so far.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Generate the map.
    ///
    /// - `chat_files`: already visible to the caller; excluded from output
    ///   but they anchor the ranking via teleport personalization
    /// - `other_files`: the scanned set
    /// - `mentioned_fnames`: repo-relative paths named in surrounding text
    /// - `mentioned_idents`: identifiers named in surrounding text
    /// - `force_refresh`: re-extract everything this call, as `always`
    ///
    /// Returns the rendered map; empty means nothing fit the budget.
    pub fn generate_map(
        &mut self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        mentioned_fnames: &HashSet<String>,
        mentioned_idents: &HashSet<String>,
        force_refresh: bool,
    ) -> String {
        let budget = self
            .map_tokens
            .unwrap_or_else(|| default_map_tokens(self.model.as_ref()));
        if budget == 0 {
            return String::new();
        }

        let mode = if force_refresh {
            RefreshMode::Always
        } else {
            self.refresh
        };

        let mut cache = match self.cache.take() {
            Some(c) => c,
            None => TagCache::open(&self.root, self.io.as_ref()),
        };
        if mode == RefreshMode::Always {
            cache.clear();
        }

        let chat_norm: Vec<(Arc<str>, Arc<str>)> =
            chat_files.iter().map(|p| self.normalize(p)).collect();
        let other_norm: Vec<(Arc<str>, Arc<str>)> =
            other_files.iter().map(|p| self.normalize(p)).collect();
        let chat_set: HashSet<String> = chat_norm
            .iter()
            .map(|(_, fname)| fname.to_string())
            .collect();

        // Extraction phase: chat files first, then the scanned set.
        self.progress.start(chat_norm.len() + other_norm.len());
        let mut files: Vec<FileTags> = Vec::new();
        let mut seen: HashSet<Arc<str>> = HashSet::new();
        let mut cancelled = false;

        for (rel_fname, fname) in chat_norm.iter().chain(other_norm.iter()) {
            if self.cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if !seen.insert(Arc::clone(fname)) {
                continue;
            }
            self.progress.step(rel_fname);

            let tags = self.file_tags(&mut cache, fname, rel_fname, mode);
            files.push(FileTags {
                fname: Arc::clone(fname),
                rel_fname: Arc::clone(rel_fname),
                tags,
            });
        }
        self.progress.stop();

        // The cache commits even on cancellation so the next run benefits
        // from whatever was extracted.
        if let Err(e) = cache.commit() {
            self.warn_once(format!("tag cache commit failed: {e}"));
        }
        self.cache = Some(cache);

        if cancelled {
            return String::new();
        }

        let graph = build_graph(&files, &chat_set, mentioned_fnames, mentioned_idents);
        let ranked = rank_tags(&graph, &chat_set);

        let scanned: Vec<(Arc<str>, Arc<str>)> = files
            .iter()
            .filter(|f| !chat_set.contains(f.fname.as_ref()))
            .map(|f| (Arc::clone(&f.rel_fname), Arc::clone(&f.fname)))
            .collect();

        let renderer = TreeRenderer::new(self.io.as_ref());
        select_map(&ranked, &scanned, budget, self.model.as_ref(), &renderer)
    }

    /// Tags for one file, honoring the refresh policy.
    fn file_tags(
        &mut self,
        cache: &mut TagCache,
        fname: &Arc<str>,
        rel_fname: &Arc<str>,
        mode: RefreshMode,
    ) -> Vec<Tag> {
        if mode == RefreshMode::Manual {
            if let Some(tags) = cache.get_unvalidated(fname) {
                return tags;
            }
            // Not cached: extract, but manual mode never writes back.
            return self.extract_one(fname, rel_fname);
        }

        let stamp = match FileStamp::read(Path::new(fname.as_ref())) {
            Ok(s) => s,
            Err(e) => {
                self.warn_once(format!("map cannot include {fname}: {e}"));
                return Vec::new();
            }
        };

        if mode == RefreshMode::Auto {
            if let Some(tags) = cache.get(fname, stamp) {
                return tags;
            }
        }

        let tags = self.extract_one(fname, rel_fname);
        cache.put(fname, stamp, tags.clone());
        tags
    }

    /// Read and extract one file; failures warn once and yield no tags.
    fn extract_one(&mut self, fname: &Arc<str>, rel_fname: &Arc<str>) -> Vec<Tag> {
        match self.io.read_text(Path::new(fname.as_ref())) {
            Ok(content) => extract_tags(&content, fname, rel_fname),
            Err(e) => {
                self.warn_once(format!("map cannot include {fname}: {e}"));
                Vec::new()
            }
        }
    }

    /// Normalize a caller path to `(rel_fname, fname)`.
    ///
    /// Relative inputs are joined onto the root; the relative form is
    /// forward-slash normalized for display. Purely lexical: missing files
    /// surface later as per-file warnings, not here.
    fn normalize(&self, path: &Path) -> (Arc<str>, Arc<str>) {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let rel = abs.strip_prefix(&self.root).unwrap_or(&abs);
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        (
            Arc::from(rel_str.as_str()),
            Arc::from(abs.to_string_lossy().as_ref()),
        )
    }

    fn warn_once(&mut self, msg: String) {
        if self.warned.insert(msg.clone()) {
            self.io.tool_warning(&msg);
        }
    }
}

/// Default budget when the caller sets none: a fraction of the model's
/// context window, floored so small models still get a usable map.
fn default_map_tokens(model: &dyn Model) -> usize {
    (model.max_context_tokens() / CONTEXT_FRACTION).max(MIN_DEFAULT_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CharEstimator;
    use anyhow::Result;

    struct QuietIo;

    impl Io for QuietIo {
        fn read_text(&self, path: &Path) -> Result<String> {
            let bytes = std::fs::read(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        fn tool_warning(&self, _msg: &str) {}
        fn tool_error(&self, _msg: &str) {}
    }

    fn scratch_repo(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        root
    }

    fn builder(root: &Path) -> MapBuilder {
        MapBuilder::new(root, Arc::new(QuietIo), Arc::new(CharEstimator::default()))
            .map_tokens(4096)
    }

    fn no_mentions() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_empty_repo_yields_empty_map() {
        let root = scratch_repo("tagmap_map_empty", &[]);
        let mut mb = builder(&root).map_tokens(1024);

        let out = mb.generate_map(&[], &[], &no_mentions(), &no_mentions(), false);
        assert_eq!(out, "");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_single_definition_rendered() {
        let root = scratch_repo(
            "tagmap_map_single",
            &[("greet.py", "# hello\ndef greet():\n    pass\n")],
        );
        let mut mb = builder(&root);

        let out = mb.generate_map(
            &[],
            &[root.join("greet.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );
        assert_eq!(out, "greet.py:\n⋮\n│def greet():\n⋮\n\n");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_zero_budget_short_circuits() {
        let root = scratch_repo("tagmap_map_zero", &[("a.py", "def a():\n    pass\n")]);
        let mut mb = builder(&root).map_tokens(0);

        let out = mb.generate_map(
            &[],
            &[root.join("a.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );
        assert_eq!(out, "");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let root = scratch_repo("tagmap_map_missing", &[("a.py", "def a():\n    pass\n")]);
        let mut mb = builder(&root);

        let out = mb.generate_map(
            &[],
            &[root.join("a.py"), root.join("ghost.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );
        assert!(out.contains("│def a():"));
        // The unreadable file still appears header-only: it is part of the
        // scanned set, it just has no tags.
        assert!(out.contains("ghost.py:\n⋮\n"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_chat_file_excluded_but_influences_ranking() {
        let root = scratch_repo(
            "tagmap_map_chat",
            &[
                ("a.py", "class Foo:\n    def bar(self):\n        pass\n"),
                ("b.py", "Foo()\nFoo()\n"),
                ("c.py", "def unrelated():\n    pass\n"),
            ],
        );
        let mut mb = builder(&root);

        let out = mb.generate_map(
            &[root.join("b.py")],
            &[root.join("a.py"), root.join("c.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );

        assert!(!out.contains("b.py:"), "chat file leaked into output: {out}");
        assert!(out.contains("│class Foo:"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_idempotent_across_cache_states() {
        let root = scratch_repo(
            "tagmap_map_idempotent",
            &[
                ("a.py", "def alpha():\n    beta()\n"),
                ("b.py", "def beta():\n    pass\n"),
            ],
        );
        let others = vec![root.join("a.py"), root.join("b.py")];

        // Cold cache
        let mut mb = builder(&root);
        let cold = mb.generate_map(&[], &others, &no_mentions(), &no_mentions(), false);
        // Warm cache, same builder
        let warm = mb.generate_map(&[], &others, &no_mentions(), &no_mentions(), false);
        // Forced re-extraction
        let forced = mb.generate_map(&[], &others, &no_mentions(), &no_mentions(), true);

        assert_eq!(cold, warm);
        assert_eq!(cold, forced);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_cancellation_returns_empty_and_commits() {
        let root = scratch_repo("tagmap_map_cancel", &[("a.py", "def a():\n    pass\n")]);
        let flag = Arc::new(AtomicBool::new(true));
        let mut mb = builder(&root).cancel_flag(Arc::clone(&flag));

        let out = mb.generate_map(
            &[],
            &[root.join("a.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );
        assert_eq!(out, "");

        // Lifting the flag lets the same builder produce the full map.
        flag.store(false, Ordering::Relaxed);
        let out = mb.generate_map(
            &[],
            &[root.join("a.py")],
            &no_mentions(),
            &no_mentions(),
            false,
        );
        assert!(out.contains("│def a():"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_default_budget_from_model() {
        let small = CharEstimator::new(1000);
        assert_eq!(default_map_tokens(&small), MIN_DEFAULT_TOKENS);

        let large = CharEstimator::new(128 * 1024);
        assert_eq!(default_map_tokens(&large), 128 * 1024 / CONTEXT_FRACTION);
    }
}
