//! JSON output format for tidemark

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use super::Formatter;
use crate::core::RepositoryIndex;
use crate::utils::analysis::graph::DependencyGraph;
use crate::utils::analysis::impact::{AffectedModule, ImpactReport};
use crate::utils::analysis::query::RankedFile;

pub struct JsonFormatter;

#[derive(Serialize)]
struct ModulesOutput<'a> {
    target: &'a str,
    modules: &'a [AffectedModule],
}

#[derive(Serialize)]
struct RankingOutput<'a> {
    query: &'a str,
    results: &'a [RankedFile],
}

fn write_json<T: Serialize + ?Sized>(output: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *output, value)?;
    writeln!(output)?;
    Ok(())
}

impl Formatter for JsonFormatter {
    fn write_index(&mut self, output: &mut dyn Write, index: &RepositoryIndex) -> Result<()> {
        write_json(output, index)
    }

    fn write_graph(&mut self, output: &mut dyn Write, graph: &DependencyGraph) -> Result<()> {
        write_json(output, graph)
    }

    fn write_ranking(
        &mut self,
        output: &mut dyn Write,
        query: &str,
        ranked: &[RankedFile],
    ) -> Result<()> {
        write_json(
            output,
            &RankingOutput {
                query,
                results: ranked,
            },
        )
    }

    fn write_report(&mut self, output: &mut dyn Write, report: &ImpactReport) -> Result<()> {
        write_json(output, report)
    }

    fn write_modules(
        &mut self,
        output: &mut dyn Write,
        target: &str,
        modules: &[AffectedModule],
    ) -> Result<()> {
        write_json(output, &ModulesOutput { target, modules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::analysis::dependencies::build_graph;
    use crate::utils::analysis::impact::analyze;
    use crate::utils::ast::parse_source;
    use std::path::PathBuf;

    #[test]
    fn test_graph_and_report_are_valid_json() {
        let files = vec![
            parse_source("from b import helper\n", "a.py").unwrap(),
            parse_source("def helper():\n    pass\n", "b.py").unwrap(),
        ];
        let index = RepositoryIndex::from_files(PathBuf::from("/repo"), files, Vec::new());
        let graph = build_graph(&index);

        let mut output = Vec::new();
        JsonFormatter.write_graph(&mut output, &graph).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["edges"].as_array().map(|e| e.len()), Some(2));

        let report = analyze("update docs wording", &index, &graph, None).unwrap();
        let mut output = Vec::new();
        JsonFormatter.write_report(&mut output, &report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["risk_level"], "low");
        assert!(value["affected_files"].is_array());
    }

    #[test]
    fn test_ranking_output() {
        let ranked = vec![RankedFile {
            path: "a.py".into(),
            score: 2.0,
            content: "x = 1\n".into(),
        }];
        let mut output = Vec::new();
        JsonFormatter
            .write_ranking(&mut output, "widget", &ranked)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["query"], "widget");
        assert_eq!(value["results"][0]["path"], "a.py");
    }
}
