//! Markdown output format for tidemark

use anyhow::Result;
use std::io::Write;

use super::Formatter;
use super::mermaid::generate_diagram;
use super::plain::{import_line, signature};
use crate::core::RepositoryIndex;
use crate::utils::analysis::graph::DependencyGraph;
use crate::utils::analysis::impact::{AffectedModule, Direction, ImpactReport};
use crate::utils::analysis::query::RankedFile;
use crate::utils::summary::summarize_file;

pub struct MarkdownFormatter;

fn code_fence(path: &str) -> &'static str {
    if path.ends_with(".py") { "python" } else { "" }
}

impl Formatter for MarkdownFormatter {
    fn write_index(&mut self, output: &mut dyn Write, index: &RepositoryIndex) -> Result<()> {
        writeln!(output, "# Repository Index")?;
        writeln!(output)?;
        writeln!(
            output,
            "> {} files parsed, {} skipped. Indexed at {}.",
            index.files_parsed,
            index.skipped.len(),
            index.indexed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(output)?;

        writeln!(output, "| File | Summary |")?;
        writeln!(output, "|------|---------|")?;
        for file in &index.files {
            writeln!(output, "| {} | {} |", file.path, summarize_file(file))?;
        }
        writeln!(output)?;

        for file in &index.files {
            writeln!(output, "## {}", file.path)?;
            writeln!(output)?;
            if let Some(doc) = &file.docstring {
                writeln!(output, "> {}", doc.replace('\n', "\n> "))?;
                writeln!(output)?;
            }
            for class in &file.classes {
                writeln!(output, "- **class {}**", class.name)?;
                for method in &class.methods {
                    writeln!(output, "  - `{}`", signature(method))?;
                }
            }
            for function in &file.functions {
                writeln!(output, "- `{}`", signature(function))?;
            }
            if !file.imports.is_empty() {
                writeln!(output)?;
                writeln!(output, "```{}", code_fence(&file.path))?;
                for import in &file.imports {
                    writeln!(output, "{}", import_line(import))?;
                }
                writeln!(output, "```")?;
            }
            writeln!(output)?;
        }

        if !index.skipped.is_empty() {
            writeln!(output, "## Skipped Files")?;
            writeln!(output)?;
            for skipped in &index.skipped {
                writeln!(output, "- `{}`: {}", skipped.path, skipped.reason)?;
            }
            writeln!(output)?;
        }
        Ok(())
    }

    fn write_graph(&mut self, output: &mut dyn Write, graph: &DependencyGraph) -> Result<()> {
        writeln!(output, "# Dependency Graph")?;
        writeln!(output)?;
        writeln!(
            output,
            "> {} nodes, {} edges, {} cycles.",
            graph.node_count(),
            graph.edge_count(),
            graph.cycles().len()
        )?;
        writeln!(output)?;

        let diagram = generate_diagram(graph);
        if !diagram.is_empty() {
            writeln!(output, "```mermaid")?;
            writeln!(output, "{}", diagram)?;
            writeln!(output, "```")?;
            writeln!(output)?;
        }

        if !graph.cycles().is_empty() || !graph.cyclic_components().is_empty() {
            writeln!(output, "## Import Cycles")?;
            writeln!(output)?;
            for cycle in graph.cycles() {
                writeln!(output, "- {}", cycle.join(" → "))?;
            }
            for component in graph.cyclic_components() {
                writeln!(
                    output,
                    "- cyclic component of {} files: {}",
                    component.size,
                    component.nodes.join(", ")
                )?;
            }
            if graph.cycles_truncated() {
                writeln!(output)?;
                writeln!(output, "*Cycle enumeration stopped at the configured limit.*")?;
            }
            writeln!(output)?;
        }
        Ok(())
    }

    fn write_ranking(
        &mut self,
        output: &mut dyn Write,
        query: &str,
        ranked: &[RankedFile],
    ) -> Result<()> {
        writeln!(output, "# Relevant Files")?;
        writeln!(output)?;
        writeln!(output, "> **Query**")?;
        writeln!(output, "> {}", query.replace('\n', "\n> "))?;
        writeln!(output)?;
        writeln!(output, "| Rank | File | Score |")?;
        writeln!(output, "|------|------|-------|")?;
        for (i, file) in ranked.iter().enumerate() {
            writeln!(output, "| {} | {} | {:.2} |", i + 1, file.path, file.score)?;
        }
        writeln!(output)?;

        for file in ranked {
            writeln!(output, "## {}", file.path)?;
            writeln!(output)?;
            writeln!(output, "```{}", code_fence(&file.path))?;
            writeln!(output, "{}", file.content)?;
            writeln!(output, "```")?;
            writeln!(output)?;
        }
        Ok(())
    }

    fn write_report(&mut self, output: &mut dyn Write, report: &ImpactReport) -> Result<()> {
        writeln!(output, "# Impact Analysis")?;
        writeln!(output)?;
        writeln!(output, "| Risk | Proceed | Approval required |")?;
        writeln!(output, "|------|---------|-------------------|")?;
        writeln!(
            output,
            "| {} | {} | {} |",
            report.risk_level.as_str().to_uppercase(),
            if report.should_proceed { "yes" } else { "no" },
            if report.requires_approval { "yes" } else { "no" }
        )?;
        writeln!(output)?;

        writeln!(output, "## Affected Files")?;
        writeln!(output)?;
        if report.affected_files.is_empty() {
            writeln!(output, "*None identified.*")?;
        }
        for file in &report.affected_files {
            writeln!(output, "- `{}`", file)?;
        }
        writeln!(output)?;

        if !report.affected_features.is_empty() {
            writeln!(output, "## Affected Features")?;
            writeln!(output)?;
            for feature in &report.affected_features {
                writeln!(output, "- {}", feature)?;
            }
            writeln!(output)?;
        }

        if !report.warnings.is_empty() {
            writeln!(output, "## Warnings")?;
            writeln!(output)?;
            for warning in &report.warnings {
                writeln!(output, "- {}", warning)?;
            }
            writeln!(output)?;
        }

        writeln!(output, "> **Recommendation**")?;
        writeln!(output, "> {}", report.recommendation.replace('\n', "\n> "))?;
        Ok(())
    }

    fn write_modules(
        &mut self,
        output: &mut dyn Write,
        target: &str,
        modules: &[AffectedModule],
    ) -> Result<()> {
        writeln!(output, "# Modules linked to `{}`", target)?;
        writeln!(output)?;
        writeln!(output, "| Module | Relationship | Direction |")?;
        writeln!(output, "|--------|--------------|-----------|")?;
        for module in modules {
            let direction = match module.direction {
                Direction::Outgoing => "outgoing",
                Direction::Incoming => "incoming",
            };
            writeln!(
                output,
                "| {} | {} | {} |",
                module.file_path, module.relationship, direction
            )?;
        }
        Ok(())
    }
}
