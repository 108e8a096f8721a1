//! Elided tree rendering - from (file, line) anchors to a source listing.
//!
//! Each file becomes a block:
//!
//! ```text
//! src/server.py:
//! ⋮
//! │class Server:
//! ⋮
//! │    def dispatch(self, request):
//! ⋮
//! ```
//!
//! Kept lines carry a `│` prefix; every contiguous run of omitted lines
//! collapses to a single `⋮`. An anchored line hoists its enclosing scope:
//! parent lines with strictly decreasing indentation are kept too, so a
//! method never appears without its class header.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::io::Io;

/// Elision marker replacing one or more omitted lines.
const ELISION: &str = "⋮";

/// One file's contribution to the map.
#[derive(Debug, Clone)]
pub struct FileBlock {
    /// Absolute path for reading
    pub fname: Arc<str>,
    /// Anchor lines (0-based); empty means header-only
    pub lines: BTreeSet<u32>,
}

/// Renders anchor sets into the final map text.
pub struct TreeRenderer<'a> {
    io: &'a dyn Io,
}

impl<'a> TreeRenderer<'a> {
    pub fn new(io: &'a dyn Io) -> Self {
        Self { io }
    }

    /// Render file blocks keyed by relative path, in path order.
    ///
    /// Blocks with anchors are read and elided; header-only blocks (and
    /// blocks whose file cannot be read) emit `rel:` followed by a single
    /// elision marker. Every block ends with one blank line.
    pub fn render(&self, blocks: &BTreeMap<Arc<str>, FileBlock>) -> String {
        let mut out = String::new();

        for (rel_fname, block) in blocks {
            if block.lines.is_empty() {
                push_header_only(&mut out, rel_fname);
                continue;
            }

            match self.io.read_text(Path::new(block.fname.as_ref())) {
                Ok(content) => render_file(&mut out, rel_fname, &content, &block.lines),
                Err(_) => push_header_only(&mut out, rel_fname),
            }
        }

        out
    }
}

fn push_header_only(out: &mut String, rel_fname: &str) {
    out.push_str(rel_fname);
    out.push_str(":\n");
    out.push_str(ELISION);
    out.push_str("\n\n");
}

/// Render one file's kept lines with elision markers.
fn render_file(out: &mut String, rel_fname: &str, content: &str, anchors: &BTreeSet<u32>) {
    let lines: Vec<&str> = content.lines().collect();
    let keep = keep_lines(&lines, anchors);

    out.push_str(rel_fname);
    out.push_str(":\n");

    let mut last_emitted: Option<usize> = None;
    for &row in &keep {
        let gap = match last_emitted {
            None => row > 0,
            Some(prev) => row > prev + 1,
        };
        if gap {
            out.push_str(ELISION);
            out.push('\n');
        }
        out.push('│');
        out.push_str(lines[row]);
        out.push('\n');
        last_emitted = Some(row);
    }

    let trailing_skipped = match last_emitted {
        None => !lines.is_empty(),
        Some(prev) => prev + 1 < lines.len(),
    };
    if trailing_skipped {
        out.push_str(ELISION);
        out.push('\n');
    }

    out.push('\n');
}

/// Compute the kept line set: each anchor plus its hoisted context.
///
/// From an anchor, walk upward keeping every line whose indentation is
/// strictly below the last kept one, stopping at column 0 or at the first
/// blank line.
fn keep_lines(lines: &[&str], anchors: &BTreeSet<u32>) -> BTreeSet<usize> {
    let mut keep = BTreeSet::new();

    for &anchor in anchors {
        let anchor = anchor as usize;
        if anchor >= lines.len() {
            continue;
        }
        keep.insert(anchor);

        let mut threshold = indentation(lines[anchor]);
        let mut row = anchor;
        while row > 0 && threshold > 0 {
            row -= 1;
            let line = lines[row];
            if line.trim().is_empty() {
                break;
            }
            let indent = indentation(line);
            if indent < threshold {
                keep.insert(row);
                threshold = indent;
            }
        }
    }

    keep
}

/// Leading whitespace width in characters.
fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}
