//! Index builder: walks a tree and parses every eligible file
//!
//! Files are parsed in parallel; results are merged sorted by relative path.
//! A file that cannot be read or parsed is logged and left out, never fatal.

use std::path::Path;

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{TidemarkConfig, validate_root};
use crate::core::{IndexEvent, RepositoryIndex, SkippedFile, SourceFile};
use crate::error::Result;
use crate::fs::{WalkConfig, relative_path, walk_source_files};
use crate::utils::ast::parse_source;
use crate::utils::ignorefile::load_ignore_file;
use crate::utils::preflight;

/// Notify helper for optional sender
fn notify(tx: &Option<Sender<IndexEvent>>, event: IndexEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}

enum FileOutcome {
    Parsed(SourceFile),
    Skipped(SkippedFile),
}

/// Builds an index of `root`, excluding files under any of `ignore_dirs`.
/// Other settings take their defaults.
pub fn build_index(root: &Path, ignore_dirs: &[String]) -> Result<RepositoryIndex> {
    let config = TidemarkConfig {
        path: root.to_path_buf(),
        ignore_dirs: ignore_dirs.to_vec(),
        ..Default::default()
    };
    build_index_with_events(&config, None)
}

/// Builds an index of `config.path`, reporting progress on `tx`.
///
/// Fails only when the root is not a readable directory or the tree exceeds
/// the configured preflight limits; no partial index is returned then.
pub fn build_index_with_events(
    config: &TidemarkConfig,
    tx: Option<Sender<IndexEvent>>,
) -> Result<RepositoryIndex> {
    notify(&tx, IndexEvent::Started);

    validate_root(&config.path)?;
    let root = config.path.canonicalize()?;

    let mut ignore_dirs = config.ignore_dirs.clone();
    ignore_dirs.extend(load_ignore_file(&root));

    let paths = walk_source_files(
        &root,
        WalkConfig {
            ignore_dirs: &ignore_dirs,
            extensions: &config.extensions,
            respect_gitignore: config.respect_gitignore,
        },
    )?;

    let analysis = preflight::analyze(&paths);
    debug!("{}", analysis);
    preflight::check_limits(config, &analysis)?;

    info!("Found {} source files under {}", paths.len(), root.display());
    notify(&tx, IndexEvent::FilesFound(paths.len()));

    let outcomes: Vec<FileOutcome> = paths
        .par_iter()
        .map(|path| index_file(path, &root, &tx))
        .collect();

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Parsed(file) => files.push(file),
            FileOutcome::Skipped(skip) => skipped.push(skip),
        }
    }

    let index = RepositoryIndex::from_files(root, files, skipped);
    info!(
        "Indexed {} files ({} skipped): {} classes, {} functions, {} imports",
        index.files_parsed,
        index.skipped.len(),
        index.classes.len(),
        index.functions.len(),
        index.imports.len()
    );
    notify(
        &tx,
        IndexEvent::Complete {
            files_parsed: index.files_parsed,
        },
    );
    Ok(index)
}

fn index_file(path: &Path, root: &Path, tx: &Option<Sender<IndexEvent>>) -> FileOutcome {
    let relative = relative_path(path, root);

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| format!("Unreadable: {}", e))
        .and_then(|text| parse_source(&text, &relative).map_err(|e| e.to_string()));

    match parsed {
        Ok(file) => {
            notify(tx, IndexEvent::FileIndexed(relative));
            FileOutcome::Parsed(file)
        }
        Err(reason) => {
            warn!("Skipping {}: {}", relative, reason);
            notify(
                tx,
                IndexEvent::FileSkipped {
                    path: relative.clone(),
                    reason: reason.clone(),
                },
            );
            FileOutcome::Skipped(SkippedFile {
                path: relative,
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TidemarkError;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn write_tree(root: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(root.join("app"))?;
        fs::create_dir_all(root.join(".git"))?;
        fs::write(
            root.join("app/models.py"),
            "class User:\n    def save(self):\n        pass\n",
        )?;
        fs::write(
            root.join("app/routes.py"),
            "from app.models import User\n\ndef index():\n    return User()\n",
        )?;
        fs::write(root.join("broken.py"), "def broken(:\n")?;
        fs::write(root.join(".git/hook.py"), "def hook():\n    pass\n")?;
        Ok(())
    }

    #[test]
    fn test_build_index_skips_broken_and_ignored() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        write_tree(temp.path())?;

        let index = build_index(temp.path(), &[".git".to_string()])?;

        assert_eq!(index.files_parsed, 2);
        let paths: Vec<_> = index.file_paths().collect();
        assert_eq!(paths, vec!["app/models.py", "app/routes.py"]);
        assert_eq!(index.skipped.len(), 1);
        assert_eq!(index.skipped[0].path, "broken.py");

        assert_eq!(index.classes.len(), 1);
        assert_eq!(index.classes[0].file_path, "app/models.py");
        assert_eq!(index.functions.len(), 1);
        assert_eq!(index.functions[0].item.name, "index");
        assert_eq!(index.imports.len(), 1);
        assert_eq!(index.imports[0].file_path, "app/routes.py");
        Ok(())
    }

    #[test]
    fn test_build_index_is_idempotent() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        write_tree(temp.path())?;

        let first = build_index(temp.path(), &[".git".to_string()])?;
        let second = build_index(temp.path(), &[".git".to_string()])?;

        assert_eq!(first.files_parsed, second.files_parsed);
        let names = |idx: &RepositoryIndex| -> BTreeSet<String> {
            idx.classes
                .iter()
                .map(|c| format!("{}::{}", c.file_path, c.item.name))
                .chain(
                    idx.functions
                        .iter()
                        .map(|f| format!("{}::{}", f.file_path, f.item.name)),
                )
                .collect()
        };
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.fingerprint(), second.fingerprint());
        Ok(())
    }

    #[test]
    fn test_invalid_root_is_fatal() {
        let err = build_index(Path::new("/definitely/not/here"), &[]).unwrap_err();
        assert!(matches!(err, TidemarkError::InvalidRoot { .. }));
    }

    #[test]
    fn test_file_root_is_fatal() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("single.py");
        fs::write(&file, "x = 1\n")?;
        let err = build_index(&file, &[]).unwrap_err();
        assert!(matches!(err, TidemarkError::InvalidRoot { .. }));
        Ok(())
    }

    #[test]
    fn test_events_are_reported() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        write_tree(temp.path())?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let config = TidemarkConfig {
            path: temp.path().to_path_buf(),
            ..Default::default()
        };
        build_index_with_events(&config, Some(tx))?;

        let events: Vec<IndexEvent> = rx.iter().collect();
        assert!(matches!(events.first(), Some(IndexEvent::Started)));
        assert!(events.iter().any(|e| matches!(e, IndexEvent::FilesFound(3))));
        assert!(events.iter().any(
            |e| matches!(e, IndexEvent::FileSkipped { path, .. } if path == "broken.py")
        ));
        assert!(matches!(
            events.last(),
            Some(IndexEvent::Complete { files_parsed: 2 })
        ));
        Ok(())
    }

    #[test]
    fn test_ignore_file_extends_ignore_dirs() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        write_tree(temp.path())?;
        fs::create_dir_all(temp.path().join("migrations"))?;
        fs::write(temp.path().join("migrations/0001.py"), "x = 1\n")?;
        fs::write(temp.path().join(".tidemarkignore"), "migrations\n")?;

        let index = build_index(temp.path(), &[".git".to_string()])?;
        assert!(index.file("migrations/0001.py").is_none());
        Ok(())
    }
}
