//! Output format modules for tidemark

pub mod json;
pub mod markdown;
pub mod mermaid;
pub mod plain;

use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::core::RepositoryIndex;
use crate::utils::analysis::graph::DependencyGraph;
use crate::utils::analysis::impact::{AffectedModule, ImpactReport};
use crate::utils::analysis::query::RankedFile;

pub trait Formatter {
    fn write_index(&mut self, output: &mut dyn Write, index: &RepositoryIndex) -> Result<()>;

    fn write_graph(&mut self, output: &mut dyn Write, graph: &DependencyGraph) -> Result<()>;

    fn write_ranking(
        &mut self,
        output: &mut dyn Write,
        query: &str,
        ranked: &[RankedFile],
    ) -> Result<()>;

    fn write_report(&mut self, output: &mut dyn Write, report: &ImpactReport) -> Result<()>;

    /// Graph neighbours of `target`, as listed by the impact analyzer.
    fn write_modules(
        &mut self,
        output: &mut dyn Write,
        target: &str,
        modules: &[AffectedModule],
    ) -> Result<()>;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Json => Box::new(json::JsonFormatter),
        OutputFormat::Markdown => Box::new(markdown::MarkdownFormatter),
        OutputFormat::Plain => Box::new(plain::PlainFormatter),
        OutputFormat::Mermaid => Box::new(MermaidFormatter),
    }
}

/// Draws the graph as a Mermaid diagram; everything else renders as plain text.
pub struct MermaidFormatter;

impl Formatter for MermaidFormatter {
    fn write_index(&mut self, output: &mut dyn Write, index: &RepositoryIndex) -> Result<()> {
        plain::PlainFormatter.write_index(output, index)
    }

    fn write_graph(&mut self, output: &mut dyn Write, graph: &DependencyGraph) -> Result<()> {
        writeln!(output, "{}", mermaid::generate_diagram(graph))?;
        Ok(())
    }

    fn write_ranking(
        &mut self,
        output: &mut dyn Write,
        query: &str,
        ranked: &[RankedFile],
    ) -> Result<()> {
        plain::PlainFormatter.write_ranking(output, query, ranked)
    }

    fn write_report(&mut self, output: &mut dyn Write, report: &ImpactReport) -> Result<()> {
        plain::PlainFormatter.write_report(output, report)
    }

    fn write_modules(
        &mut self,
        output: &mut dyn Write,
        target: &str,
        modules: &[AffectedModule],
    ) -> Result<()> {
        plain::PlainFormatter.write_modules(output, target, modules)
    }
}
