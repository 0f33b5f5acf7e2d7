//! Plain text output format for tidemark

use anyhow::Result;
use std::io::Write;

use super::Formatter;
use crate::core::{FunctionDecl, ImportKind, ImportRef, RepositoryIndex};
use crate::utils::analysis::graph::DependencyGraph;
use crate::utils::analysis::impact::{AffectedModule, Direction, ImpactReport};
use crate::utils::analysis::query::RankedFile;
use crate::utils::summary::summarize_file;

pub struct PlainFormatter;

/// `name(a: int, b) -> str`
pub fn signature(function: &FunctionDecl) -> String {
    let params: Vec<String> = function
        .parameters
        .iter()
        .map(|p| match &p.annotation {
            Some(annotation) => format!("{}: {}", p.name, annotation),
            None => p.name.clone(),
        })
        .collect();
    let prefix = if function.is_async { "async def" } else { "def" };
    match &function.return_type {
        Some(ret) => format!("{} {}({}) -> {}", prefix, function.name, params.join(", "), ret),
        None => format!("{} {}({})", prefix, function.name, params.join(", ")),
    }
}

/// Import statement as it would appear in source
pub fn import_line(import: &ImportRef) -> String {
    let alias = import
        .alias
        .as_ref()
        .map(|a| format!(" as {}", a))
        .unwrap_or_default();
    match import.kind {
        ImportKind::Direct => format!("import {}{}", import.module, alias),
        ImportKind::From => format!(
            "from {}{} import {}{}",
            ".".repeat(import.level),
            import.module,
            import.imported_name.as_deref().unwrap_or("*"),
            alias
        ),
    }
}

impl Formatter for PlainFormatter {
    fn write_index(&mut self, output: &mut dyn Write, index: &RepositoryIndex) -> Result<()> {
        writeln!(output, "=== REPOSITORY INDEX ===")?;
        writeln!(output, "Root: {}", index.root.display())?;
        writeln!(
            output,
            "Files parsed: {} (skipped: {})",
            index.files_parsed,
            index.skipped.len()
        )?;
        writeln!(
            output,
            "Declarations: {} classes, {} functions, {} imports",
            index.classes.len(),
            index.functions.len(),
            index.imports.len()
        )?;
        writeln!(output)?;

        for file in &index.files {
            writeln!(output, "--- {} ---", file.path)?;
            writeln!(output, "Summary: {}", summarize_file(file))?;
            for class in &file.classes {
                if class.base_names.is_empty() {
                    writeln!(output, "  class {}", class.name)?;
                } else {
                    writeln!(
                        output,
                        "  class {}({})",
                        class.name,
                        class.base_names.join(", ")
                    )?;
                }
                for method in &class.methods {
                    writeln!(output, "    {}", signature(method))?;
                }
            }
            for function in &file.functions {
                writeln!(output, "  {}", signature(function))?;
            }
            for import in &file.imports {
                writeln!(output, "  {}", import_line(import))?;
            }
            writeln!(output)?;
        }

        if !index.skipped.is_empty() {
            writeln!(output, "=== SKIPPED FILES ===")?;
            for skipped in &index.skipped {
                writeln!(output, "- {}: {}", skipped.path, skipped.reason)?;
            }
            writeln!(output)?;
        }
        writeln!(output, "=== END OF INDEX ===")?;
        Ok(())
    }

    fn write_graph(&mut self, output: &mut dyn Write, graph: &DependencyGraph) -> Result<()> {
        writeln!(output, "=== DEPENDENCY GRAPH ===")?;
        writeln!(
            output,
            "Nodes: {} ({} files) | Edges: {}",
            graph.node_count(),
            graph.file_nodes().count(),
            graph.edge_count()
        )?;
        writeln!(output)?;

        writeln!(output, "Imports:")?;
        for edge in graph.imports_edges() {
            writeln!(output, "  {} -> {}", edge.source, edge.target)?;
        }
        writeln!(output)?;

        writeln!(output, "Cycles: {}", graph.cycles().len())?;
        for cycle in graph.cycles() {
            let mut path = cycle.clone();
            if let Some(first) = cycle.first() {
                path.push(first.clone());
            }
            writeln!(output, "  {}", path.join(" -> "))?;
        }
        if graph.cycles_truncated() {
            writeln!(output, "  (cycle enumeration stopped at the configured limit)")?;
        }
        for component in graph.cyclic_components() {
            writeln!(
                output,
                "  cyclic, size {}: {}",
                component.size,
                component.nodes.join(", ")
            )?;
        }
        writeln!(output)?;
        writeln!(output, "=== END OF GRAPH ===")?;
        Ok(())
    }

    fn write_ranking(
        &mut self,
        output: &mut dyn Write,
        query: &str,
        ranked: &[RankedFile],
    ) -> Result<()> {
        writeln!(output, "=== RELEVANT FILES ===")?;
        writeln!(output, "Query: {}", query)?;
        writeln!(output)?;
        for file in ranked {
            writeln!(output, "--- {} (score {:.2}) ---", file.path, file.score)?;
            writeln!(output, "{}", file.content)?;
            writeln!(output)?;
        }
        writeln!(output, "=== END OF RESULTS ===")?;
        Ok(())
    }

    fn write_report(&mut self, output: &mut dyn Write, report: &ImpactReport) -> Result<()> {
        write!(output, "{}", report)?;
        Ok(())
    }

    fn write_modules(
        &mut self,
        output: &mut dyn Write,
        target: &str,
        modules: &[AffectedModule],
    ) -> Result<()> {
        writeln!(output, "Modules linked to {} ({}):", target, modules.len())?;
        for module in modules {
            let arrow = match module.direction {
                Direction::Outgoing => "->",
                Direction::Incoming => "<-",
            };
            writeln!(
                output,
                "  {} {} [{}]",
                arrow, module.file_path, module.relationship
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Parameter;
    use crate::utils::analysis::dependencies::build_graph;
    use crate::utils::ast::parse_source;
    use std::path::PathBuf;

    #[test]
    fn test_signature() {
        let function = FunctionDecl {
            name: "load".into(),
            parameters: vec![
                Parameter {
                    name: "path".into(),
                    annotation: Some("str".into()),
                },
                Parameter {
                    name: "**kwargs".into(),
                    annotation: None,
                },
            ],
            return_type: Some("dict".into()),
            decorators: Vec::new(),
            docstring: None,
            is_method: false,
            is_async: true,
            owning_class: None,
        };
        assert_eq!(signature(&function), "async def load(path: str, **kwargs) -> dict");
    }

    #[test]
    fn test_import_line() {
        let import = ImportRef {
            kind: ImportKind::From,
            module: "models".into(),
            imported_name: Some("User".into()),
            alias: Some("U".into()),
            level: 2,
        };
        assert_eq!(import_line(&import), "from ..models import User as U");
    }

    #[test]
    fn test_plain_index_and_graph() {
        let files = vec![
            parse_source("from b import run\n\nclass A(Base):\n    def go(self):\n        pass\n", "a.py")
                .unwrap(),
            parse_source("from a import A\n\ndef run():\n    pass\n", "b.py").unwrap(),
        ];
        let index = RepositoryIndex::from_files(PathBuf::from("/repo"), files, Vec::new());
        let graph = build_graph(&index);

        let mut output = Vec::new();
        PlainFormatter.write_index(&mut output, &index).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("--- a.py ---"));
        assert!(text.contains("  class A(Base)"));
        assert!(text.contains("    def go(self)"));
        assert!(text.contains("  from b import run"));

        let mut output = Vec::new();
        PlainFormatter.write_graph(&mut output, &graph).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("  a.py -> b.py"));
        assert!(text.contains("Cycles: 1"));
        assert!(text.contains("a.py -> b.py -> a.py"));
    }

    #[test]
    fn test_plain_modules() {
        let modules = vec![
            AffectedModule {
                file_path: "a.py::A".into(),
                relationship: crate::utils::analysis::graph::EdgeKind::Contains,
                direction: Direction::Outgoing,
                dependency_strength: 1.0,
            },
            AffectedModule {
                file_path: "b.py".into(),
                relationship: crate::utils::analysis::graph::EdgeKind::Imports,
                direction: Direction::Incoming,
                dependency_strength: 1.0,
            },
        ];
        let mut output = Vec::new();
        PlainFormatter
            .write_modules(&mut output, "a.py", &modules)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("Modules linked to a.py (2):"));
        assert!(text.contains("  -> a.py::A [contains]"));
        assert!(text.contains("  <- b.py [imports]"));
    }
}
