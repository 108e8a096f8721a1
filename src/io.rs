//! Injected collaborators: file I/O facade, token-counting model, progress.
//!
//! The map engine never touches stdout, never panics on a bad file, and never
//! counts tokens itself. Everything observable goes through these traits so
//! callers can substitute fakes in tests and real tokenizers in production.

use std::path::Path;

use anyhow::{Context, Result};

/// File I/O facade with non-fatal diagnostics.
///
/// Read failures are reported through the `Result`; the engine decides
/// whether to warn and skip. `tool_warning`/`tool_error` are fire-and-forget.
pub trait Io {
    /// Read a file as UTF-8 text.
    fn read_text(&self, path: &Path) -> Result<String>;

    /// Non-fatal diagnostic, e.g. a skipped file.
    fn tool_warning(&self, msg: &str);

    /// Stronger diagnostic; still non-fatal to the engine.
    fn tool_error(&self, msg: &str);
}

/// Stderr-backed I/O, lossy on invalid UTF-8.
///
/// Source files with stray bytes still produce usable tags; the replacement
/// character never survives into an identifier match.
#[derive(Debug, Default)]
pub struct ConsoleIo;

impl Io for ConsoleIo {
    fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn tool_warning(&self, msg: &str) {
        eprintln!("warning: {msg}");
    }

    fn tool_error(&self, msg: &str) {
        eprintln!("error: {msg}");
    }
}

/// Token-counting model contract.
///
/// `max_context_tokens` is consulted only to default the map budget when the
/// caller does not supply one.
pub trait Model {
    /// Count tokens in `text` with the downstream model's tokenizer.
    fn token_count(&self, text: &str) -> usize;

    /// Context window of the downstream model, in tokens.
    fn max_context_tokens(&self) -> usize;
}

/// Character-based token estimator (1 token ~ 4 chars).
///
/// Fast and tokenizer-free; accurate enough for budget fitting, which
/// already carries 15% slack.
#[derive(Debug, Clone, Copy)]
pub struct CharEstimator {
    context_tokens: usize,
}

impl CharEstimator {
    pub fn new(context_tokens: usize) -> Self {
        Self { context_tokens }
    }
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self {
            context_tokens: 16384,
        }
    }
}

impl Model for CharEstimator {
    fn token_count(&self, text: &str) -> usize {
        (text.len() + 3) / 4
    }

    fn max_context_tokens(&self) -> usize {
        self.context_tokens
    }
}

/// Progress reporting seam for long extraction phases.
pub trait Progress {
    /// Begin a phase expected to take `total` steps.
    fn start(&self, total: usize);

    /// One unit of work done; `msg` names it (usually a file path).
    fn step(&self, msg: &str);

    /// Phase finished or abandoned.
    fn stop(&self);
}

/// No-op progress reporter for headless runs.
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _total: usize) {}
    fn step(&self, _msg: &str) {}
    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_estimator() {
        let model = CharEstimator::default();
        assert_eq!(model.token_count(""), 0);
        assert_eq!(model.token_count("abcd"), 1);
        assert_eq!(model.token_count("abcde"), 2);
        assert_eq!(model.max_context_tokens(), 16384);
    }

    #[test]
    fn test_console_io_read_missing() {
        let io = ConsoleIo;
        assert!(io.read_text(Path::new("/nonexistent/tagmap/file")).is_err());
    }

    #[test]
    fn test_console_io_lossy_read() {
        let path = std::env::temp_dir().join("tagmap_io_lossy.bin");
        std::fs::write(&path, [0x66, 0x6f, 0x6f, 0xff, 0x62, 0x61, 0x72]).unwrap();

        let io = ConsoleIo;
        let text = io.read_text(&path).unwrap();
        assert!(text.starts_with("foo"));
        assert!(text.ends_with("bar"));

        std::fs::remove_file(&path).ok();
    }
}
