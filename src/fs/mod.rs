use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::warn;

use crate::error::Result;

/// Walk configuration for source discovery
pub struct WalkConfig<'a> {
    /// Directory names pruned wherever they appear in a path
    pub ignore_dirs: &'a [String],
    /// File extensions (without the dot) that count as source
    pub extensions: &'a [String],
    /// Honour `.gitignore` files in addition to `ignore_dirs`
    pub respect_gitignore: bool,
}

/// Recursively lists source files under `root`, sorted.
///
/// Any file with a path segment in `ignore_dirs` is excluded; matching
/// directories are pruned rather than descended.
pub fn walk_source_files(root: &Path, config: WalkConfig<'_>) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(root);

    builder
        .standard_filters(false)
        .git_ignore(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .require_git(false)
        .follow_links(false);

    let ignore_dirs: Vec<String> = config.ignore_dirs.to_vec();
    builder.filter_entry(move |entry| {
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        let name = entry.file_name().to_string_lossy();
        !(is_dir && entry.depth() > 0 && is_ignored_name(&name, &ignore_dirs))
    });

    let mut files = Vec::new();
    for result in builder.build() {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                let path = entry.into_path();
                if has_extension(&path, config.extensions)
                    && !has_ignored_segment(&path, root, config.ignore_dirs)
                {
                    files.push(path);
                }
            }
            Err(err) => warn!("Error walking directory: {}", err),
        }
    }

    files.sort();
    Ok(files)
}

/// Relative, forward-slash form of `path` under `root`.
pub fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

/// Checks only the segments below `root`; ancestors of the root never count.
pub(crate) fn has_ignored_segment(path: &Path, root: &Path, ignore_dirs: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .any(|c| is_ignored_name(&c.as_os_str().to_string_lossy(), ignore_dirs))
}

fn is_ignored_name(name: &str, ignore_dirs: &[String]) -> bool {
    ignore_dirs.iter().any(|d| d == name)
}
