//! Pre-flight checks - bound the tree before parsing it

use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::config::TidemarkConfig;
use crate::error::{Result, TidemarkError};

/// Pre-flight analysis results
#[derive(Debug)]
pub struct PreflightAnalysis {
    pub total_files: usize,
    pub total_size_bytes: u64,
}

impl std::fmt::Display for PreflightAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pre-flight Analysis")?;
        writeln!(f, "===================")?;
        writeln!(f, "Source files: {}", self.total_files)?;
        writeln!(
            f,
            "Total size:   {:.2} MB",
            self.total_size_bytes as f64 / 1_048_576.0
        )
    }
}

/// Measure the discovered source files
pub fn analyze(files: &[PathBuf]) -> PreflightAnalysis {
    let total_size_bytes = files
        .par_iter()
        .map(|f| fs::metadata(f).map(|m| m.len()).unwrap_or(0))
        .sum();

    PreflightAnalysis {
        total_files: files.len(),
        total_size_bytes,
    }
}

/// Rejects trees that exceed the configured size or file-count limits.
pub fn check_limits(config: &TidemarkConfig, analysis: &PreflightAnalysis) -> Result<()> {
    if let Some(limit) = config.max_files
        && analysis.total_files > limit
    {
        return Err(TidemarkError::TooManyFiles {
            count: analysis.total_files,
            limit,
        });
    }

    if let Some(limit_bytes) = config.max_repo_size_bytes()
        && analysis.total_size_bytes > limit_bytes
    {
        return Err(TidemarkError::RepositoryTooLarge {
            size_bytes: analysis.total_size_bytes,
            limit_bytes,
        });
    }

    Ok(())
}
