//! tagmap CLI - ranked repository maps from the command line
//!
//! Thin front-end over the map engine:
//!
//! 1. File Discovery: find source files respecting .gitignore
//! 2. Mention Extraction: pull identifiers/filenames out of --context
//! 3. Map Generation: extract (cached) → rank → fit to budget → render
//!
//! The map itself goes to stdout; diagnostics go to stderr, so the output
//! can be piped straight into a prompt.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use tagmap::discovery::find_source_files;
use tagmap::mentions;
use tagmap::{CharEstimator, ConsoleIo, MapBuilder, RefreshMode};

/// Generate a ranked, token-budgeted map of a repository.
///
/// tagmap extracts definitions and references with tree-sitter, ranks them
/// with personalized PageRank over the file reference graph, and renders
/// the winners as elided source snippets that fit a token budget.
///
/// Examples:
///   tagmap                                      # Map the current repo
///   tagmap --root ~/src/project --tokens 2048   # Tighter budget elsewhere
///   tagmap src/server.py --context "dispatch bug"
#[derive(Parser, Debug)]
#[command(name = "tagmap")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Files already in the conversation (chat files)
    ///
    /// Chat files are excluded from the map but strongly bias the ranking
    /// toward the code they use.
    #[arg(value_name = "CHAT_FILES")]
    chat_files: Vec<PathBuf>,

    /// Project root to map
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Extra file to scan beyond discovery (repeatable)
    ///
    /// Adds files the walk would miss, e.g. gitignored or generated code
    /// that should still show up in the map.
    #[arg(long, value_name = "FILE")]
    other: Vec<PathBuf>,

    /// Token budget for the rendered map
    ///
    /// The output may exceed this by at most 15%. Defaults from the
    /// assumed model context when omitted.
    #[arg(short = 't', long)]
    tokens: Option<usize>,

    /// Free-form context text to mine for mentioned files and identifiers
    #[arg(long)]
    context: Option<String>,

    /// Identifier to boost explicitly (repeatable)
    #[arg(long, value_name = "IDENT")]
    mention: Vec<String>,

    /// Repo-relative file to boost explicitly (repeatable)
    #[arg(long, value_name = "PATH")]
    mention_file: Vec<String>,

    /// Tag cache refresh policy: auto, files, manual, or always
    #[arg(long, default_value = "auto")]
    refresh: String,

    /// Re-extract everything this run, ignoring the cache
    #[arg(long)]
    force_refresh: bool,

    /// Print discovery and ranking statistics to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let map = run(&cli)?;
    print!("{map}");
    Ok(())
}

fn run(cli: &Cli) -> Result<String> {
    // Unknown refresh modes fail fast here, before any work happens.
    let refresh: RefreshMode = cli.refresh.parse()?;

    let root = cli.root.canonicalize()?;

    let chat_files: Vec<PathBuf> = cli
        .chat_files
        .iter()
        .map(|p| absolutize(&root, p))
        .collect();
    let chat_set: HashSet<PathBuf> = chat_files.iter().cloned().collect();

    // Scanned set: everything discovery finds plus explicit --other files,
    // minus whatever is already in the chat.
    let mut scanned: BTreeSet<PathBuf> = find_source_files(&root)?.into_iter().collect();
    scanned.extend(cli.other.iter().map(|p| absolutize(&root, p)));
    let other_files: Vec<PathBuf> = scanned
        .into_iter()
        .filter(|p| !chat_set.contains(p))
        .collect();

    if cli.verbose {
        eprintln!(
            "tagmap: {} scanned files, {} chat files",
            other_files.len(),
            chat_files.len()
        );
    }

    // Mention sets: explicit flags plus whatever the context text yields.
    let rel_files: Vec<String> = other_files
        .iter()
        .chain(chat_files.iter())
        .filter_map(|p| p.strip_prefix(&root).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();
    let chat_rel: HashSet<String> = chat_files
        .iter()
        .filter_map(|p| p.strip_prefix(&root).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();

    let mut mentioned_idents: HashSet<String> = cli.mention.iter().cloned().collect();
    let mut mentioned_fnames: HashSet<String> = cli.mention_file.iter().cloned().collect();

    if let Some(context) = &cli.context {
        mentioned_idents.extend(mentions::extract_identifiers(context));
        mentioned_fnames.extend(mentions::extract_file_mentions(context, &rel_files, &chat_rel));
        mentioned_fnames.extend(mentions::match_identifiers_to_files(
            &mentioned_idents,
            &rel_files,
        ));
    }

    let mut builder = MapBuilder::new(
        &root,
        Arc::new(ConsoleIo),
        Arc::new(CharEstimator::default()),
    )
    .refresh(refresh);
    if let Some(tokens) = cli.tokens {
        builder = builder.map_tokens(tokens);
    }

    let map = builder.generate_map(
        &chat_files,
        &other_files,
        &mentioned_fnames,
        &mentioned_idents,
        cli.force_refresh,
    );

    if cli.verbose && map.is_empty() {
        eprintln!("tagmap: nothing fit the token budget");
    }

    Ok(map)
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
