//! Core types shared across tidemark modules

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted while building an index
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// Indexing has started
    Started,
    /// Number of eligible source files discovered
    FilesFound(usize),
    /// A file was parsed and added to the index
    FileIndexed(String),
    /// A file was left out of the index
    FileSkipped { path: String, reason: String },
    /// Indexing finished
    Complete { files_parsed: usize },
}

/// A parameter of a function or method. `annotation` is the literal source
/// text of the type hint, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub is_method: bool,
    pub is_async: bool,
    /// Name of the enclosing class for methods.
    pub owning_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub methods: Vec<FunctionDecl>,
    pub decorators: Vec<String>,
    pub base_names: Vec<String>,
    pub docstring: Option<String>,
    /// Relative path of the file declaring this class.
    pub owning_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import a.b [as c]`
    Direct,
    /// `from a.b import c [as d]`
    From,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    pub kind: ImportKind,
    /// Dotted module text, without the leading dots of a relative import.
    pub module: String,
    pub imported_name: Option<String>,
    pub alias: Option<String>,
    /// Leading-dot count of a relative `from` import; 0 when absolute.
    pub level: usize,
}

/// One successfully parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Relative, forward-slash path; unique within a repository.
    pub path: String,
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    pub imports: Vec<ImportRef>,
    pub docstring: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            classes: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            docstring: None,
        }
    }

    /// Base name of the file, e.g. `models.py` for `app/models.py`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A per-file parse failure. Returned as a value so one bad file never
/// aborts a whole-tree index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub path: String,
    pub message: String,
    /// 1-based position of the first error, when known.
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "{}:{}:{}: {}", self.path, line, column, self.message)
            }
            _ => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// A declaration lifted into one of the index's flat lists, tagged with the
/// path of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFile<T> {
    pub file_path: String,
    #[serde(flatten)]
    pub item: T,
}

impl<T> InFile<T> {
    pub fn new(file_path: impl Into<String>, item: T) -> Self {
        Self {
            file_path: file_path.into(),
            item,
        }
    }
}

/// A file left out of the index, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Repository-wide structural index. Rebuilt wholesale on every indexing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
    pub classes: Vec<InFile<ClassDecl>>,
    pub functions: Vec<InFile<FunctionDecl>>,
    pub imports: Vec<InFile<ImportRef>>,
    /// Number of files that parsed without errors.
    pub files_parsed: usize,
    pub skipped: Vec<SkippedFile>,
    pub indexed_at: DateTime<Utc>,
}

impl RepositoryIndex {
    /// Assembles an index from parsed files, flattening their declarations.
    /// Files are sorted by path so downstream consumers never depend on
    /// traversal order.
    pub fn from_files(
        root: PathBuf,
        mut files: Vec<SourceFile>,
        mut skipped: Vec<SkippedFile>,
    ) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        let mut classes = Vec::new();
        let mut functions = Vec::new();
        let mut imports = Vec::new();
        for file in &files {
            classes.extend(
                file.classes
                    .iter()
                    .map(|c| InFile::new(file.path.clone(), c.clone())),
            );
            functions.extend(
                file.functions
                    .iter()
                    .map(|f| InFile::new(file.path.clone(), f.clone())),
            );
            imports.extend(
                file.imports
                    .iter()
                    .map(|i| InFile::new(file.path.clone(), i.clone())),
            );
        }

        Self {
            root,
            files_parsed: files.len(),
            files,
            classes,
            functions,
            imports,
            skipped,
            indexed_at: Utc::now(),
        }
    }

    pub fn empty(root: PathBuf) -> Self {
        Self::from_files(root, Vec::new(), Vec::new())
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Content fingerprint: md5 of the serialized file records. The timestamp
    /// and skip list are excluded, so an unchanged tree keeps its fingerprint.
    pub fn fingerprint(&self) -> String {
        let serialized = serde_json::to_vec(&self.files).unwrap_or_default();
        format!("{:x}", md5::compute(serialized))
    }
}
