//! Structure summaries handed to an external text-generation collaborator

use crate::core::{RepositoryIndex, SourceFile};
use crate::error::Result;
use crate::utils::analysis::query::RankedFile;

pub const MAX_STRUCTURE_CHARS: usize = 5000;
pub const MAX_CONTEXT_FILES: usize = 10;
pub const MAX_FILE_CHARS: usize = 2000;
pub const MAX_FILES_BLOCK_CHARS: usize = 5000;

/// Builds the context block describing a repository: its serialized
/// structure followed by the contents of the most relevant files.
///
/// Every part is truncated to a fixed character budget.
pub fn build_structure_context(index: &RepositoryIndex, ranked: &[RankedFile]) -> Result<String> {
    let structure = serde_json::to_string_pretty(&index.files)?;

    let files_block = ranked
        .iter()
        .take(MAX_CONTEXT_FILES)
        .map(|f| {
            format!(
                "File: {}\n{}",
                f.path,
                truncate_chars(&f.content, MAX_FILE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(format!(
        "Repository Structure:\n{}\n\nRelevant Files:\n{}\n",
        truncate_chars(&structure, MAX_STRUCTURE_CHARS),
        truncate_chars(&files_block, MAX_FILES_BLOCK_CHARS)
    ))
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// One-line description of a file's declarations,
/// e.g. `2 classes (User, Admin); 1 function (load)`.
pub fn summarize_file(file: &SourceFile) -> String {
    let format_list = |singular: &str, plural: &str, items: Vec<&str>| -> Option<String> {
        if items.is_empty() {
            return None;
        }
        let label = if items.len() == 1 { singular } else { plural };
        let more = if items.len() > 5 { ", ..." } else { "" };
        let shown: Vec<&str> = items.iter().take(5).copied().collect();
        Some(format!(
            "{} {} ({}{})",
            items.len(),
            label,
            shown.join(", "),
            more
        ))
    };

    let classes = format_list(
        "class",
        "classes",
        file.classes.iter().map(|c| c.name.as_str()).collect(),
    );
    let functions = format_list(
        "function",
        "functions",
        file.functions.iter().map(|f| f.name.as_str()).collect(),
    );

    let parts: Vec<String> = [classes, functions].into_iter().flatten().collect();
    if parts.is_empty() {
        "no top-level declarations".to_string()
    } else {
        parts.join("; ")
    }
}
