use crate::config::TidemarkConfig;
use crate::core::{IndexEvent, Snapshot, SnapshotHandle};
use crate::format::{Formatter, create_formatter};
use crate::utils::analysis::impact::ImpactAnalyzer;
use crate::utils::analysis::opinion::ExternalOpinion;
use crate::utils::analysis::query::rank;
use crate::utils::cache::{ContextCache, ContextKey};
use crate::utils::summary::build_structure_context;
use crate::utils::watch::{Debouncer, FileWatcher, WatchEvent, is_relevant_change};
use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Quiet period after the last change before a watch rebuild starts
const WATCH_SETTLE: Duration = Duration::from_millis(500);
const WATCH_POLL: Duration = Duration::from_millis(200);

/// What the CLI was asked to do
#[derive(Debug, Clone)]
pub enum Command {
    /// Print the structural index
    Index,
    /// Print the dependency graph and its cycles
    Graph,
    /// Rank files against a query and print them with their content
    Rank { query: String },
    /// Classify the impact of a proposed change
    Analyze {
        description: String,
        opinion: Option<PathBuf>,
    },
    /// List the graph neighbours of one file
    Modules { file: String },
    /// Print the structure context block for a query
    Context { query: String },
    /// Re-index on every relevant change; optionally re-emit context for a query
    Watch { query: Option<String> },
}

/// Main entry point for the tidemark CLI.
///
/// Builds a snapshot of the repository (indexing on a background thread while
/// the main thread renders progress), then runs `command` against it and
/// writes the rendered result to `output`, or stdout when `None`.
pub fn run(config: TidemarkConfig, command: Command, output: Option<&Path>) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut out = open_output(output)?;
    let mut formatter = create_formatter(config.output_format);
    let snapshot = load_snapshot(&config)?;

    match command {
        Command::Index => formatter.write_index(&mut out, &snapshot.index)?,
        Command::Graph => formatter.write_graph(&mut out, &snapshot.graph)?,
        Command::Rank { query } => {
            let ranked = rank(&query, &snapshot.index, config.top_k);
            formatter.write_ranking(&mut out, &query, &ranked)?;
        }
        Command::Analyze {
            description,
            opinion,
        } => {
            let opinion = match opinion {
                Some(path) => load_opinion(&path)?,
                None => None,
            };
            let analyzer = ImpactAnalyzer::with_settings(
                &snapshot.index,
                &snapshot.graph,
                config.impact.clone(),
            );
            let report = analyzer.analyze(&description, opinion.as_ref())?;
            formatter.write_report(&mut out, &report)?;
        }
        Command::Modules { file } => {
            let analyzer = ImpactAnalyzer::new(&snapshot.index, &snapshot.graph);
            let modules = analyzer.affected_modules(&file);
            formatter.write_modules(&mut out, &file, &modules)?;
        }
        Command::Context { query } => {
            let cache = ContextCache::new();
            let context = context_for(&cache, &snapshot, &query, config.top_k)?;
            write!(out, "{}", context)?;
        }
        Command::Watch { query } => {
            drop(out);
            watch(config, snapshot, query, output)?;
            return Ok(());
        }
    }

    out.flush()?;
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Ok(Box::new(io::BufWriter::new(file)))
        }
        None => Ok(Box::new(io::BufWriter::new(io::stdout()))),
    }
}

/// Indexes on a worker thread and renders its events as a progress bar.
pub fn load_snapshot(config: &TidemarkConfig) -> Result<Snapshot> {
    let (tx, rx) = crossbeam_channel::unbounded();

    let worker_config = config.clone();
    let worker =
        std::thread::spawn(move || Snapshot::build_with_events(&worker_config, Some(tx)));

    let progress = if config.verbose {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|e| {
                warn!("Progress template error: {}, using default", e);
                ProgressStyle::default_bar()
            }),
    );

    // The worker owns the only sender, so this ends when indexing does.
    for event in rx {
        match event {
            IndexEvent::Started => progress.set_message("discovering files"),
            IndexEvent::FilesFound(n) => {
                progress.set_length(n as u64);
                progress.set_message("parsing");
            }
            IndexEvent::FileIndexed(path) => {
                progress.inc(1);
                progress.set_message(path);
            }
            IndexEvent::FileSkipped { path, .. } => {
                progress.inc(1);
                progress.set_message(format!("skipped {}", path));
            }
            IndexEvent::Complete { files_parsed } => {
                progress.finish_with_message(format!("{} files parsed", files_parsed));
            }
        }
    }
    progress.finish_and_clear();

    let snapshot = worker
        .join()
        .map_err(|_| anyhow!("Indexing thread panicked"))?
        .context("Failed to index repository")?;
    Ok(snapshot)
}

/// Reads an opinion file. Unparseable content counts as no opinion.
fn load_opinion(path: &Path) -> Result<Option<ExternalOpinion>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read opinion file: {:?}", path))?;
    let opinion = ExternalOpinion::parse_lenient(&text);
    if opinion.is_none() {
        warn!(
            "Opinion in {:?} is not a JSON object; falling back to keywords",
            path
        );
    }
    Ok(opinion)
}

fn context_for(
    cache: &ContextCache,
    snapshot: &Snapshot,
    query: &str,
    top_k: usize,
) -> Result<std::sync::Arc<String>> {
    let key = ContextKey::new(snapshot.fingerprint.as_str(), query, top_k);
    let context = cache.get_or_insert_with(&key, || {
        let ranked = rank(query, &snapshot.index, top_k);
        build_structure_context(&snapshot.index, &ranked)
    })?;
    Ok(context)
}

fn watch(
    config: TidemarkConfig,
    snapshot: Snapshot,
    query: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let handle = SnapshotHandle::new(snapshot);
    let cache = ContextCache::new();
    // Notify reports absolute paths.
    let watch_root = config
        .path
        .canonicalize()
        .unwrap_or_else(|_| config.path.clone());
    let watcher = FileWatcher::new(&watch_root)
        .with_context(|| format!("Failed to watch {:?}", config.path))?;
    let mut debouncer = Debouncer::new(WATCH_SETTLE);
    let mut formatter = create_formatter(config.output_format);

    let emit = |formatter: &mut Box<dyn Formatter>, cache: &ContextCache| -> Result<()> {
        let current = handle.current();
        let mut out = open_output(output)?;
        match &query {
            Some(query) => {
                let context = context_for(cache, &current, query, config.top_k)?;
                write!(out, "{}", context)?;
            }
            None => formatter.write_graph(&mut out, &current.graph)?,
        }
        out.flush()?;
        Ok(())
    };

    emit(&mut formatter, &cache)?;
    info!("Watching {:?} for changes", config.path);

    let mut dirty_since: Option<Instant> = None;
    loop {
        if let Some(event) = watcher.next_event(WATCH_POLL) {
            let mut events = vec![event];
            events.extend(watcher.pending_events());
            for event in events {
                if let WatchEvent::Error(e) = &event {
                    warn!("Watch error: {}", e);
                    continue;
                }
                let Some(path) = event.path() else {
                    continue;
                };
                if is_relevant_change(path, &watch_root, &config.extensions, &config.ignore_dirs)
                    && debouncer.should_process(path)
                {
                    dirty_since = Some(Instant::now());
                }
            }
        }

        let settled = dirty_since.is_some_and(|since| since.elapsed() >= WATCH_SETTLE);
        if !settled {
            continue;
        }
        dirty_since = None;
        debouncer.cleanup();

        let previous = handle.current().fingerprint.clone();
        match handle.rebuild(&config) {
            Ok(current) => {
                if current.fingerprint == previous {
                    // Same structure, but file bodies may have changed.
                    cache.invalidate(&previous);
                } else {
                    cache.retain_only(&current.fingerprint);
                }
                if let Err(e) = emit(&mut formatter, &cache) {
                    warn!("Failed to write output: {:#}", e);
                }
            }
            Err(e) => warn!("Re-index failed, keeping previous snapshot: {}", e),
        }
    }
}
