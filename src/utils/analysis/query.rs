//! Relevance ranking of indexed files against a free-text query
//!
//! Each query term is matched as a substring against the file's base name,
//! its class and top-level function names, and its docstring. Scores are
//! summed across terms; only files with a positive score are returned.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;

use crate::core::{RepositoryIndex, SourceFile};

const FILE_NAME_WEIGHT: f64 = 2.0;
const CLASS_WEIGHT: f64 = 1.5;
const FUNCTION_WEIGHT: f64 = 1.0;
const DOCSTRING_WEIGHT: f64 = 0.5;

/// A file scored against a query, with its current on-disk content
#[derive(Debug, Clone, Serialize)]
pub struct RankedFile {
    pub path: String,
    pub score: f64,
    pub content: String,
}

impl std::fmt::Display for RankedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: score={:.2} ({} bytes)",
            self.path,
            self.score,
            self.content.len()
        )
    }
}

/// Lower-cased whitespace tokens of `query`.
pub fn query_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(|t| t.to_lowercase()).collect()
}

/// Scores one file. Class and function terms count once per matching name.
pub fn score_file(file: &SourceFile, terms: &[String]) -> f64 {
    let file_name = file.file_name().to_lowercase();
    let class_names: Vec<String> = file.classes.iter().map(|c| c.name.to_lowercase()).collect();
    let function_names: Vec<String> = file
        .functions
        .iter()
        .map(|f| f.name.to_lowercase())
        .collect();
    let docstring = file
        .docstring
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut score = 0.0;
    for term in terms {
        let term = term.as_str();
        if file_name.contains(term) {
            score += FILE_NAME_WEIGHT;
        }
        score += CLASS_WEIGHT * class_names.iter().filter(|n| n.contains(term)).count() as f64;
        score += FUNCTION_WEIGHT
            * function_names
                .iter()
                .filter(|n| n.contains(term))
                .count() as f64;
        if docstring.contains(term) {
            score += DOCSTRING_WEIGHT;
        }
    }
    score
}

/// Returns up to `top_k` files ranked by descending score.
///
/// Ties keep index order. Content is read from disk now, not from the
/// index; a file that cannot be read gets empty content.
pub fn rank(query: &str, index: &RepositoryIndex, top_k: usize) -> Vec<RankedFile> {
    let terms = query_terms(query);
    if terms.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&SourceFile, f64)> = index
        .files
        .par_iter()
        .map(|file| (file, score_file(file, &terms)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_par_iter()
        .map(|(file, score)| RankedFile {
            path: file.path.clone(),
            score,
            content: fs::read_to_string(index.root.join(&file.path)).unwrap_or_default(),
        })
        .collect()
}
