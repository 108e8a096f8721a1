//! Budget fitting - binary search over the ranked-prefix length.
//!
//! A candidate at prefix `k` renders the first `k` ranked tags as source
//! snippets, plus a header-only line for every scanned file not covered by
//! those tags. The search finds the largest `k` whose rendered token count
//! stays within the budget (with 15% slack), memoizing renders so each
//! prefix is rendered at most once: at most ceil(log2 N) + 1 renders per
//! call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::io::Model;
use crate::rendering::{FileBlock, TreeRenderer};
use crate::types::RankedTag;

/// Fraction of the budget the output may overshoot.
const BUDGET_SLACK: f64 = 0.15;

/// Probes closer than this fraction of the budget end the search early.
const PROBE_EPSILON: f64 = 0.01;

/// Select and render the best-fitting map.
///
/// `other_files` is the scanned, non-chat `(rel_fname, fname)` set; files
/// in it that contribute no selected tag appear header-only. Returns the
/// empty string when the budget is zero or nothing fits - that is not an
/// error.
pub fn select_map(
    ranked: &[RankedTag],
    other_files: &[(Arc<str>, Arc<str>)],
    max_tokens: usize,
    model: &dyn Model,
    renderer: &TreeRenderer,
) -> String {
    if max_tokens == 0 {
        return String::new();
    }

    let limit = (max_tokens as f64 * (1.0 + BUDGET_SLACK)).ceil() as usize;
    let epsilon = (max_tokens as f64 * PROBE_EPSILON) as usize;

    let mut renders: HashMap<usize, String> = HashMap::new();

    let mut lo = 0usize;
    let mut hi = ranked.len();
    let mut best: Option<usize> = None;
    let mut prev_tokens: Option<usize> = None;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let rendered = renders
            .entry(mid)
            .or_insert_with(|| render_candidate(ranked, mid, other_files, renderer));
        let tokens = model.token_count(rendered);

        if tokens <= limit {
            best = Some(mid);
            if mid == ranked.len() {
                break;
            }
            lo = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            hi = mid - 1;
        }

        // Consecutive probes this close will not change the outcome by
        // more than the slack already allows.
        if let Some(prev) = prev_tokens {
            if best.is_some() && tokens.abs_diff(prev) < epsilon {
                break;
            }
        }
        prev_tokens = Some(tokens);
    }

    match best {
        Some(k) => renders.remove(&k).unwrap_or_default(),
        None => String::new(),
    }
}

/// Compose and render the candidate at prefix length `k`.
fn render_candidate(
    ranked: &[RankedTag],
    k: usize,
    other_files: &[(Arc<str>, Arc<str>)],
    renderer: &TreeRenderer,
) -> String {
    let mut blocks: BTreeMap<Arc<str>, FileBlock> = BTreeMap::new();

    for tag in &ranked[..k.min(ranked.len())] {
        blocks
            .entry(Arc::clone(&tag.rel_fname))
            .or_insert_with(|| FileBlock {
                fname: Arc::clone(&tag.fname),
                lines: Default::default(),
            })
            .lines
            .insert(tag.line);
    }

    for (rel_fname, fname) in other_files {
        blocks.entry(Arc::clone(rel_fname)).or_insert_with(|| FileBlock {
            fname: Arc::clone(fname),
            lines: Default::default(),
        });
    }

    renderer.render(&blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CharEstimator, Io};
    use anyhow::{bail, Result};
    use std::path::Path;

    struct FakeIo {
        files: HashMap<String, String>,
    }

    impl Io for FakeIo {
        fn read_text(&self, path: &Path) -> Result<String> {
            match self.files.get(path.to_str().unwrap_or("")) {
                Some(content) => Ok(content.clone()),
                None => bail!("no such file: {}", path.display()),
            }
        }
        fn tool_warning(&self, _msg: &str) {}
        fn tool_error(&self, _msg: &str) {}
    }

    fn ranked_tag(rel: &str, name: &str, line: u32, rank: f64) -> RankedTag {
        RankedTag {
            rank,
            rel_fname: rel.into(),
            fname: format!("/repo/{rel}").into(),
            name: name.into(),
            line,
        }
    }

    fn repo_io(n: usize) -> FakeIo {
        let files = (0..n)
            .map(|i| {
                (
                    format!("/repo/f{i}.py"),
                    format!("def item{i}():\n    return {i}\n"),
                )
            })
            .collect();
        FakeIo { files }
    }

    #[test]
    fn test_zero_budget_is_empty() {
        let io = repo_io(1);
        let renderer = TreeRenderer::new(&io);
        let ranked = vec![ranked_tag("f0.py", "item0", 0, 1.0)];

        let out = select_map(&ranked, &[], 0, &CharEstimator::default(), &renderer);
        assert_eq!(out, "");
    }

    #[test]
    fn test_empty_inputs_are_empty() {
        let io = repo_io(0);
        let renderer = TreeRenderer::new(&io);

        let out = select_map(&[], &[], 1024, &CharEstimator::default(), &renderer);
        assert_eq!(out, "");
    }

    #[test]
    fn test_everything_fits_large_budget() {
        let io = repo_io(3);
        let renderer = TreeRenderer::new(&io);
        let ranked: Vec<RankedTag> = (0..3)
            .map(|i| ranked_tag(&format!("f{i}.py"), &format!("item{i}"), 0, 1.0))
            .collect();

        let out = select_map(&ranked, &[], 10_000, &CharEstimator::default(), &renderer);
        for i in 0..3 {
            assert!(out.contains(&format!("│def item{i}():")), "missing item{i} in {out:?}");
        }
    }

    #[test]
    fn test_budget_respected_with_slack() {
        let io = repo_io(10);
        let renderer = TreeRenderer::new(&io);
        let model = CharEstimator::default();
        let ranked: Vec<RankedTag> = (0..10)
            .map(|i| ranked_tag(&format!("f{i}.py"), &format!("item{i}"), 0, 1.0))
            .collect();

        for budget in [10usize, 30, 60, 120, 400] {
            let out = select_map(&ranked, &[], budget, &model, &renderer);
            let limit = (budget as f64 * 1.15).ceil() as usize;
            assert!(
                model.token_count(&out) <= limit,
                "budget {budget}: output {} tokens over limit {limit}",
                model.token_count(&out)
            );
        }
    }

    #[test]
    fn test_uncovered_files_appear_header_only() {
        let io = repo_io(2);
        let renderer = TreeRenderer::new(&io);
        let ranked = vec![ranked_tag("f0.py", "item0", 0, 1.0)];
        let other: Vec<(Arc<str>, Arc<str>)> = vec![
            ("f0.py".into(), "/repo/f0.py".into()),
            ("f1.py".into(), "/repo/f1.py".into()),
        ];

        let out = select_map(&ranked, &other, 10_000, &CharEstimator::default(), &renderer);
        assert!(out.contains("│def item0():"));
        // f1 contributed no tag: header only, no content line
        assert!(out.contains("f1.py:\n⋮\n"));
        assert!(!out.contains("│def item1():"));
    }

    #[test]
    fn test_truncation_drops_lowest_ranked() {
        let io = repo_io(10);
        let renderer = TreeRenderer::new(&io);
        let model = CharEstimator::default();
        let ranked: Vec<RankedTag> = (0..10)
            .map(|i| ranked_tag(&format!("f{i}.py"), &format!("item{i}"), 0, 1.0 / (i + 1) as f64))
            .collect();

        // Whole map costs ~10 tokens per file; a small budget keeps a prefix
        let out = select_map(&ranked, &[], 40, &model, &renderer);
        assert!(out.contains("│def item0():"));
        assert!(!out.contains("│def item9():"));
    }

    #[test]
    fn test_nothing_fits_returns_empty() {
        let io = repo_io(0);
        let renderer = TreeRenderer::new(&io);
        // Even the zero-prefix render (headers for every file) overflows
        let other: Vec<(Arc<str>, Arc<str>)> = (0..50)
            .map(|i| {
                (
                    Arc::<str>::from(format!("some/deeply/nested/module_{i:03}.py")),
                    Arc::<str>::from(format!("/repo/some/deeply/nested/module_{i:03}.py")),
                )
            })
            .collect();

        let out = select_map(&[], &other, 5, &CharEstimator::default(), &renderer);
        assert_eq!(out, "");
    }

    #[test]
    fn test_raising_budget_never_removes_headers() {
        let io = repo_io(6);
        let renderer = TreeRenderer::new(&io);
        let model = CharEstimator::default();
        let ranked: Vec<RankedTag> = (0..6)
            .map(|i| ranked_tag(&format!("f{i}.py"), &format!("item{i}"), 0, 1.0 / (i + 1) as f64))
            .collect();
        let other: Vec<(Arc<str>, Arc<str>)> = (0..6)
            .map(|i| {
                (
                    Arc::<str>::from(format!("f{i}.py")),
                    Arc::<str>::from(format!("/repo/f{i}.py")),
                )
            })
            .collect();

        let small = select_map(&ranked, &other, 60, &model, &renderer);
        let large = select_map(&ranked, &other, 600, &model, &renderer);

        for i in 0..6 {
            let header = format!("f{i}.py:");
            if small.contains(&header) {
                assert!(large.contains(&header), "budget raise removed {header}");
            }
        }
    }
}
