use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{Result, TidemarkError};

pub const CONFIG_FILE_NAME: &str = "tidemark.toml";

/// Output format for rendered results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
    Markdown,
    Mermaid,
}

/// How far the impact analyzer follows `imports` edges from the seed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    /// Add the direct import targets of seed files, once.
    #[default]
    SingleHop,
    /// Keep following imports until no new file is added.
    Transitive,
}

/// Bounds on simple-cycle enumeration. `None` means unbounded; in a config
/// file, `0` asks for no bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleLimits {
    /// Stop enumerating once this many cycles have been found
    #[serde(
        deserialize_with = "zero_is_unbounded",
        serialize_with = "unbounded_is_zero"
    )]
    pub max_cycles: Option<usize>,
    /// Strongly connected components larger than this are reported as a
    /// whole instead of being enumerated
    #[serde(
        deserialize_with = "zero_is_unbounded",
        serialize_with = "unbounded_is_zero"
    )]
    pub max_component_size: Option<usize>,
}

fn zero_is_unbounded<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let limit = Option::<usize>::deserialize(deserializer)?;
    Ok(limit.filter(|&n| n > 0))
}

fn unbounded_is_zero<S>(limit: &Option<usize>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(limit.unwrap_or(0) as u64)
}

impl CycleLimits {
    pub fn unbounded() -> Self {
        Self {
            max_cycles: None,
            max_component_size: None,
        }
    }
}

impl Default for CycleLimits {
    fn default() -> Self {
        Self {
            max_cycles: Some(1000),
            max_component_size: Some(64),
        }
    }
}

/// Tuning for the impact analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactSettings {
    pub expansion: ExpansionMode,
    /// Path substrings that mark a file as core (entry point, config, auth...)
    pub core_keywords: Vec<String>,
    /// Description tokens must be longer than this to seed by path
    pub min_keyword_len: usize,
    /// Feature-name words must be longer than this to count as an overlap
    pub min_feature_word_len: usize,
}

impl Default for ImpactSettings {
    fn default() -> Self {
        let core_keywords = vec!["app.py", "config", "auth", "database", "model", "service"];
        Self {
            expansion: ExpansionMode::SingleHop,
            core_keywords: core_keywords.into_iter().map(String::from).collect(),
            min_keyword_len: 3,
            min_feature_word_len: 4,
        }
    }
}

/// Main configuration for tidemark
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidemarkConfig {
    /// Repository root to index
    pub path: PathBuf,
    /// Directory names excluded wherever they appear in a path
    pub ignore_dirs: Vec<String>,
    /// Source file extensions (without the dot)
    pub extensions: Vec<String>,
    /// Honour `.gitignore` files while walking
    pub respect_gitignore: bool,
    /// Refuse to index trees whose source files exceed this size
    pub max_repo_size_mb: Option<u64>,
    /// Refuse to index trees with more source files than this
    pub max_files: Option<usize>,
    /// Number of files returned by relevance ranking
    pub top_k: usize,
    /// Also resolve plain `import x.y` statements into graph edges
    pub include_direct_imports: bool,
    pub cycles: CycleLimits,
    pub impact: ImpactSettings,
    pub output_format: OutputFormat,
    /// Enable verbose logging to stderr
    pub verbose: bool,
}

impl TidemarkConfig {
    /// Validates the configuration, ensuring the root is a readable directory.
    pub fn validate(&self) -> Result<()> {
        validate_root(&self.path)?;
        if self.top_k == 0 {
            return Err(TidemarkError::Config("top_k must be at least 1".into()));
        }
        if self.extensions.is_empty() {
            return Err(TidemarkError::Config(
                "at least one source extension is required".into(),
            ));
        }
        Ok(())
    }

    /// Attempts to load configuration from `tidemark.toml` in the current
    /// directory, then from the user config directory.
    pub fn load_from_file() -> Option<Self> {
        let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("tidemark").join("config.toml"));
        }

        for candidate in candidates {
            let Ok(content) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            match Self::from_toml_str(&content) {
                Ok(config) => return Some(config),
                Err(e) => warn!("Ignoring {}: {}", candidate.display(), e),
            }
        }
        None
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TidemarkError::Config(e.to_string()))
    }

    /// Maximum repository size in bytes, if bounded.
    pub fn max_repo_size_bytes(&self) -> Option<u64> {
        self.max_repo_size_mb.map(|mb| mb * 1024 * 1024)
    }
}

impl Default for TidemarkConfig {
    fn default() -> Self {
        let ignore_dirs = vec![
            // Version control
            ".git",
            ".hg",
            ".svn",
            // Bytecode and tool caches
            "__pycache__",
            ".mypy_cache",
            ".pytest_cache",
            ".tox",
            // Dependencies
            "node_modules",
            "venv",
            ".venv",
            "env",
            "site-packages",
            "vendor",
        ];

        Self {
            path: PathBuf::from("."),
            ignore_dirs: ignore_dirs.into_iter().map(String::from).collect(),
            extensions: vec!["py".to_string()],
            respect_gitignore: false,
            max_repo_size_mb: Some(100),
            max_files: None,
            top_k: 5,
            include_direct_imports: false,
            cycles: CycleLimits::default(),
            impact: ImpactSettings::default(),
            output_format: OutputFormat::Plain,
            verbose: false,
        }
    }
}

/// Fails with [`TidemarkError::InvalidRoot`] unless `path` is an existing directory.
pub fn validate_root(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TidemarkError::InvalidRoot {
            path: path.to_path_buf(),
            reason: "does not exist".into(),
        });
    }
    if !path.is_dir() {
        return Err(TidemarkError::InvalidRoot {
            path: path.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    Ok(())
}
