//! `.tidemarkignore` support - project-specific ignore directories

use std::fs;
use std::path::Path;

pub const IGNORE_FILE_NAME: &str = ".tidemarkignore";

/// Load extra ignore directory names from `.tidemarkignore` in the project root.
/// Returns an empty vec if the file doesn't exist.
pub fn load_ignore_file(root: &Path) -> Vec<String> {
    let ignore_file = root.join(IGNORE_FILE_NAME);
    if !ignore_file.exists() {
        return Vec::new();
    }

    fs::read_to_string(ignore_file)
        .unwrap_or_default()
        .lines()
        .map(|line| line.trim().trim_end_matches('/'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
