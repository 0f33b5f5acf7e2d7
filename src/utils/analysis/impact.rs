//! Impact analysis for proposed changes
//!
//! Given a change description and an optional external opinion, finds the
//! affected files (seeded, then expanded along `imports` edges), detects
//! overlaps with existing classes and functions, and classifies the risk
//! with a fixed rule table.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ExpansionMode, ImpactSettings};
use crate::core::RepositoryIndex;
use crate::error::Result;
use crate::utils::analysis::graph::{DependencyGraph, EdgeKind};
use crate::utils::analysis::opinion::{ExternalOpinion, normalize_path};

pub const OVERLAP_TYPE: &str = "potential_conflict";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Proceed/approval policy attached to each level.
    pub fn policy(&self) -> RiskPolicy {
        match self {
            RiskLevel::Low => RiskPolicy {
                auto_proceed: true,
                requires_review: false,
                requires_approval: false,
                manual_review_required: false,
            },
            RiskLevel::Medium => RiskPolicy {
                auto_proceed: false,
                requires_review: true,
                requires_approval: false,
                manual_review_required: false,
            },
            RiskLevel::High => RiskPolicy {
                auto_proceed: false,
                requires_review: true,
                requires_approval: true,
                manual_review_required: false,
            },
            RiskLevel::Critical => RiskPolicy {
                auto_proceed: false,
                requires_review: true,
                requires_approval: true,
                manual_review_required: true,
            },
        }
    }

    fn default_recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low impact change. Safe to proceed.",
            RiskLevel::Medium => {
                "Moderate impact. Review the affected files and overlapping features before proceeding."
            }
            RiskLevel::High => {
                "High impact. Core modules or many files are affected; approval is required before proceeding."
            }
            RiskLevel::Critical => {
                "Critical impact. Core modules are affected with multiple warnings; approval and a manual review are required."
            }
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub auto_proceed: bool,
    pub requires_review: bool,
    pub requires_approval: bool,
    pub manual_review_required: bool,
}

/// Inputs to the risk rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiskFactors {
    pub affected_count: usize,
    pub has_overlaps: bool,
    pub affects_core: bool,
    pub warning_count: usize,
}

/// Rules are evaluated in priority order; the first match wins.
pub fn classify_risk(factors: &RiskFactors) -> RiskLevel {
    if factors.affects_core && factors.warning_count > 3 {
        RiskLevel::Critical
    } else if factors.affects_core || factors.affected_count > 8 {
        RiskLevel::High
    } else if factors.has_overlaps || factors.affected_count > 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapEntry {
    pub feature_name: String,
    pub overlap_type: String,
    pub conflict_description: String,
}

impl OverlapEntry {
    fn potential_conflict(feature_name: &str) -> Self {
        Self {
            feature_name: feature_name.to_string(),
            overlap_type: OVERLAP_TYPE.to_string(),
            conflict_description: format!(
                "Change may conflict with existing feature: {}",
                feature_name
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The target file points at this module
    Outgoing,
    /// This module points at the target file
    Incoming,
}

/// A graph neighbour of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedModule {
    pub file_path: String,
    pub relationship: EdgeKind,
    pub direction: Direction,
    pub dependency_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub risk_level: RiskLevel,
    pub affected_files: BTreeSet<String>,
    pub affected_features: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendation: String,
    pub should_proceed: bool,
    pub requires_approval: bool,
    pub overlaps: Vec<OverlapEntry>,
}

impl std::fmt::Display for ImpactReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Impact Analysis")?;
        writeln!(f, "===============")?;
        writeln!(f)?;

        writeln!(
            f,
            "Risk level: {}",
            self.risk_level.as_str().to_uppercase()
        )?;
        writeln!(
            f,
            "Proceed: {} | Approval required: {}",
            if self.should_proceed { "yes" } else { "no" },
            if self.requires_approval { "yes" } else { "no" }
        )?;

        writeln!(f)?;
        writeln!(f, "Affected files: {}", self.affected_files.len())?;
        for file in self.affected_files.iter().take(20) {
            writeln!(f, "  -> {}", file)?;
        }
        if self.affected_files.len() > 20 {
            writeln!(f, "  ... and {} more", self.affected_files.len() - 20)?;
        }

        if !self.affected_features.is_empty() {
            writeln!(f)?;
            writeln!(f, "Affected features:")?;
            for feature in &self.affected_features {
                writeln!(f, "  * {}", feature)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Recommendation: {}", self.recommendation)
    }
}

/// Impact analyzer over one index/graph pair
pub struct ImpactAnalyzer<'a> {
    index: &'a RepositoryIndex,
    graph: &'a DependencyGraph,
    settings: ImpactSettings,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(index: &'a RepositoryIndex, graph: &'a DependencyGraph) -> Self {
        Self::with_settings(index, graph, ImpactSettings::default())
    }

    pub fn with_settings(
        index: &'a RepositoryIndex,
        graph: &'a DependencyGraph,
        settings: ImpactSettings,
    ) -> Self {
        Self {
            index,
            graph,
            settings,
        }
    }

    /// Analyze a proposed change.
    ///
    /// Fails only when the graph is structurally invalid. A missing opinion,
    /// an empty index or an empty graph still produce a report.
    pub fn analyze(
        &self,
        change_description: &str,
        opinion: Option<&ExternalOpinion>,
    ) -> Result<ImpactReport> {
        self.graph.validate()?;

        let seed = self.seed_files(change_description, opinion);
        let affected_files = self.expand(&seed);
        debug!(
            "Seeded {} files, expanded to {}",
            seed.len(),
            affected_files.len()
        );

        let features = self.existing_features();
        let overlaps = self.detect_overlaps(change_description, &features);

        let opinion_warnings: &[String] = opinion.map(|o| o.warnings.as_slice()).unwrap_or(&[]);
        let factors = RiskFactors {
            affected_count: affected_files.len(),
            has_overlaps: !overlaps.is_empty(),
            affects_core: self.affects_core(&affected_files),
            warning_count: opinion_warnings.len(),
        };
        let risk_level = classify_risk(&factors);
        info!(
            "Classified change as {} ({} files, {} overlaps, core: {}, {} warnings)",
            risk_level,
            factors.affected_count,
            overlaps.len(),
            factors.affects_core,
            factors.warning_count
        );

        let mut warnings = opinion_warnings.to_vec();
        warnings.extend(overlaps.iter().map(|o| o.conflict_description.clone()));

        let affected_features = match opinion {
            Some(o) if !o.affected_features.is_empty() => o.affected_features.clone(),
            _ => overlaps.iter().map(|o| o.feature_name.clone()).collect(),
        };

        let recommendation = opinion
            .and_then(|o| o.recommendation.clone())
            .unwrap_or_else(|| risk_level.default_recommendation().to_string());

        let policy = risk_level.policy();
        Ok(ImpactReport {
            risk_level,
            affected_files,
            affected_features,
            warnings,
            recommendation,
            should_proceed: policy.auto_proceed,
            requires_approval: policy.requires_approval,
            overlaps,
        })
    }

    /// Opinion files when any are given, otherwise files whose path contains
    /// a description token.
    pub fn seed_files(
        &self,
        change_description: &str,
        opinion: Option<&ExternalOpinion>,
    ) -> BTreeSet<String> {
        match opinion {
            Some(o) if o.has_seed() => o.affected_files.iter().map(|p| normalize_path(p)).collect(),
            _ => self.keyword_seed(change_description),
        }
    }

    fn keyword_seed(&self, change_description: &str) -> BTreeSet<String> {
        let keywords: Vec<String> = change_description
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|k| k.chars().count() > self.settings.min_keyword_len)
            .collect();

        self.index
            .file_paths()
            .filter(|path| {
                let lower = path.to_lowercase();
                keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .map(String::from)
            .collect()
    }

    /// Adds the targets of `imports` edges leaving the set: once, or until
    /// nothing new is added in transitive mode.
    pub fn expand(&self, seed: &BTreeSet<String>) -> BTreeSet<String> {
        let mut affected = seed.clone();
        let mut frontier: Vec<String> = seed.iter().cloned().collect();

        while !frontier.is_empty() {
            let sources: HashSet<&str> = frontier.iter().map(String::as_str).collect();
            let added: Vec<String> = self
                .graph
                .imports_edges()
                .filter(|e| sources.contains(e.source.as_str()))
                .filter(|e| !affected.contains(&e.target))
                .map(|e| e.target.clone())
                .collect();

            affected.extend(added.iter().cloned());
            if self.settings.expansion == ExpansionMode::SingleHop {
                break;
            }
            frontier = added;
        }

        affected
    }

    /// Public class and top-level function names, de-duplicated.
    pub fn existing_features(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.index
            .classes
            .iter()
            .map(|c| c.item.name.as_str())
            .chain(self.index.functions.iter().map(|f| f.item.name.as_str()))
            .filter(|name| !name.is_empty() && !name.starts_with('_'))
            .filter(|name| seen.insert(*name))
            .map(String::from)
            .collect()
    }

    /// A feature overlaps when one of its words, longer than the threshold,
    /// appears in the lower-cased description.
    pub fn detect_overlaps(&self, change_description: &str, features: &[String]) -> Vec<OverlapEntry> {
        let description = change_description.to_lowercase();
        features
            .iter()
            .filter(|feature| {
                split_words(feature).iter().any(|word| {
                    word.chars().count() > self.settings.min_feature_word_len
                        && description.contains(word.as_str())
                })
            })
            .map(|feature| OverlapEntry::potential_conflict(feature))
            .collect()
    }

    pub fn affects_core(&self, files: &BTreeSet<String>) -> bool {
        files.iter().any(|file| {
            let lower = file.to_lowercase();
            self.settings
                .core_keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
        })
    }

    /// Every graph neighbour of `target_file`, with the edge kind linking them.
    pub fn affected_modules(&self, target_file: &str) -> Vec<AffectedModule> {
        let target_file = normalize_path(target_file);
        self.graph
            .edges()
            .iter()
            .filter_map(|edge| {
                if edge.source == target_file {
                    Some((edge.target.clone(), edge.kind, Direction::Outgoing))
                } else if edge.target == target_file {
                    Some((edge.source.clone(), edge.kind, Direction::Incoming))
                } else {
                    None
                }
            })
            .map(|(file_path, relationship, direction)| AffectedModule {
                file_path,
                relationship,
                direction,
                dependency_strength: 1.0,
            })
            .collect()
    }
}

/// Analyze a change with default settings.
pub fn analyze(
    change_description: &str,
    index: &RepositoryIndex,
    graph: &DependencyGraph,
    opinion: Option<&ExternalOpinion>,
) -> Result<ImpactReport> {
    ImpactAnalyzer::new(index, graph).analyze(change_description, opinion)
}

/// Lower-cased words of an identifier, split on `_`, punctuation and
/// camelCase boundaries (`HTTPServerError` -> `http`, `server`, `error`).
pub fn split_words(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current).to_lowercase());
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current).to_lowercase());
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TidemarkError;
    use crate::utils::analysis::dependencies::build_graph;
    use crate::utils::analysis::graph::NodeKind;
    use crate::utils::ast::parse_source;
    use std::path::PathBuf;

    fn index_of(sources: &[(&str, &str)]) -> RepositoryIndex {
        let files = sources
            .iter()
            .map(|(path, text)| parse_source(text, path).unwrap())
            .collect();
        RepositoryIndex::from_files(PathBuf::from("/repo"), files, Vec::new())
    }

    fn chain_index() -> RepositoryIndex {
        index_of(&[
            ("handlers.py", "from views import render\n"),
            ("views.py", "from helpers import fmt\n"),
            ("helpers.py", "def fmt():\n    pass\n"),
        ])
    }

    #[test]
    fn test_risk_table_priority() {
        let nine = RiskFactors {
            affected_count: 9,
            ..Default::default()
        };
        assert_eq!(classify_risk(&nine), RiskLevel::High);

        let core_with_warnings = RiskFactors {
            affected_count: 1,
            affects_core: true,
            warning_count: 4,
            ..Default::default()
        };
        assert_eq!(classify_risk(&core_with_warnings), RiskLevel::Critical);

        let core_few_warnings = RiskFactors {
            warning_count: 3,
            ..core_with_warnings
        };
        assert_eq!(classify_risk(&core_few_warnings), RiskLevel::High);

        let overlaps = RiskFactors {
            has_overlaps: true,
            ..Default::default()
        };
        assert_eq!(classify_risk(&overlaps), RiskLevel::Medium);
        assert_eq!(classify_risk(&RiskFactors::default()), RiskLevel::Low);
    }

    #[test]
    fn test_risk_is_monotonic_in_file_count() {
        for has_overlaps in [false, true] {
            for affects_core in [false, true] {
                for warning_count in [0, 4] {
                    let mut previous = RiskLevel::Low;
                    for affected_count in 0..30 {
                        let level = classify_risk(&RiskFactors {
                            affected_count,
                            has_overlaps,
                            affects_core,
                            warning_count,
                        });
                        assert!(level >= previous);
                        previous = level;
                    }
                }
            }
        }
    }

    #[test]
    fn test_policy_table() {
        assert!(RiskLevel::Low.policy().auto_proceed);
        assert!(!RiskLevel::Medium.policy().auto_proceed);
        assert!(RiskLevel::Medium.policy().requires_review);
        assert!(!RiskLevel::Medium.policy().requires_approval);
        assert!(RiskLevel::High.policy().requires_approval);
        assert!(!RiskLevel::High.policy().manual_review_required);
        assert!(RiskLevel::Critical.policy().manual_review_required);
        assert!(RiskLevel::Low < RiskLevel::Critical);
    }

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("ClaimApprovalService"),
            vec!["claim", "approval", "service"]
        );
        assert_eq!(split_words("load_user_profile"), vec!["load", "user", "profile"]);
        assert_eq!(split_words("HTTPServerError"), vec!["http", "server", "error"]);
        assert_eq!(split_words("parse2Json"), vec!["parse2", "json"]);
    }

    #[test]
    fn test_claim_approval_overlap() -> anyhow::Result<()> {
        let index = index_of(&[(
            "claims/workflow.py",
            "class ClaimApprovalService:\n    pass\n\nclass _Hidden:\n    pass\n\ndef ship_order():\n    pass\n",
        )]);
        let graph = build_graph(&index);

        let report = analyze("fix ClaimApproval logic", &index, &graph, None)?;
        assert_eq!(report.overlaps.len(), 1);
        assert_eq!(report.overlaps[0].feature_name, "ClaimApprovalService");
        assert_eq!(report.overlaps[0].overlap_type, "potential_conflict");
        assert!(
            report
                .warnings
                .contains(&"Change may conflict with existing feature: ClaimApprovalService".to_string())
        );
        assert_eq!(report.risk_level, RiskLevel::Medium);
        Ok(())
    }

    #[test]
    fn test_keyword_fallback_seeds_matching_files() -> anyhow::Result<()> {
        let index = index_of(&[
            ("billing/invoice.py", "x = 1\n"),
            ("shipping.py", "x = 1\n"),
        ]);
        let graph = build_graph(&index);

        let report = analyze("adjust invoice rounding", &index, &graph, None)?;
        assert!(report.affected_files.contains("billing/invoice.py"));
        assert!(!report.affected_files.contains("shipping.py"));
        assert!(report.should_proceed);
        Ok(())
    }

    #[test]
    fn test_short_keywords_do_not_seed() -> anyhow::Result<()> {
        let index = index_of(&[("api.py", "x = 1\n")]);
        let graph = build_graph(&index);
        let report = analyze("fix api", &index, &graph, None)?;
        assert!(report.affected_files.is_empty());
        Ok(())
    }

    #[test]
    fn test_single_hop_and_transitive_expansion() {
        let index = chain_index();
        let graph = build_graph(&index);
        let seed = BTreeSet::from(["handlers.py".to_string()]);

        let single = ImpactAnalyzer::new(&index, &graph).expand(&seed);
        assert_eq!(
            single,
            BTreeSet::from(["handlers.py".to_string(), "views.py".to_string()])
        );

        let settings = ImpactSettings {
            expansion: ExpansionMode::Transitive,
            ..Default::default()
        };
        let transitive = ImpactAnalyzer::with_settings(&index, &graph, settings).expand(&seed);
        assert_eq!(transitive.len(), 3);
        assert!(transitive.contains("helpers.py"));
    }

    #[test]
    fn test_opinion_seed_and_warnings() -> anyhow::Result<()> {
        let index = index_of(&[
            ("app/config.py", "from app.db import connect\n"),
            ("app/db.py", "def connect():\n    pass\n"),
        ]);
        let graph = build_graph(&index);
        let opinion = ExternalOpinion {
            affected_files: vec!["./app/config.py".into()],
            affected_features: vec!["Settings".into()],
            warnings: (1..=4).map(|i| format!("risk {i}")).collect(),
            recommendation: None,
        };

        let report = analyze("tweak", &index, &graph, Some(&opinion))?;
        assert_eq!(
            report.affected_files,
            BTreeSet::from(["app/config.py".to_string(), "app/db.py".to_string()])
        );
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(!report.should_proceed);
        assert!(report.requires_approval);
        assert_eq!(report.affected_features, vec!["Settings"]);
        assert_eq!(report.warnings.len(), 4);
        assert!(report.recommendation.contains("manual review"));
        Ok(())
    }

    #[test]
    fn test_empty_inputs_give_low_report() -> anyhow::Result<()> {
        let index = RepositoryIndex::empty(PathBuf::from("/repo"));
        let graph = DependencyGraph::new();
        let report = analyze("anything at all", &index, &graph, None)?;
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.affected_files.is_empty());
        assert!(report.warnings.is_empty());
        assert!(report.should_proceed);
        Ok(())
    }

    #[test]
    fn test_malformed_graph_is_an_error() {
        let index = chain_index();
        let mut graph = build_graph(&index);
        graph.add_edge("views.py".into(), "missing.py".into(), EdgeKind::Imports);

        let err = analyze("render views", &index, &graph, None).unwrap_err();
        assert!(matches!(err, TidemarkError::MalformedGraph(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_affected_modules() {
        let index = chain_index();
        let graph = build_graph(&index);
        let analyzer = ImpactAnalyzer::new(&index, &graph);

        let modules = analyzer.affected_modules("views.py");
        assert!(modules.iter().any(|m| m.file_path == "handlers.py"
            && m.direction == Direction::Incoming
            && m.relationship == EdgeKind::Imports));
        assert!(modules.iter().any(|m| m.file_path == "helpers.py"
            && m.direction == Direction::Outgoing));
        assert!(modules.iter().all(|m| m.dependency_strength == 1.0));

        let helpers = analyzer.affected_modules("helpers.py");
        assert!(helpers.iter().any(|m| m.file_path == "helpers.py::fmt"
            && m.relationship == EdgeKind::Contains
            && graph.node(&m.file_path).map(|n| n.kind) == Some(NodeKind::Function)));
    }

    #[test]
    fn test_report_display() -> anyhow::Result<()> {
        let index = chain_index();
        let graph = build_graph(&index);
        let report = analyze("refactor helpers formatting", &index, &graph, None)?;
        let text = report.to_string();
        assert!(text.contains("Risk level: LOW"));
        assert!(text.contains("-> helpers.py"));
        Ok(())
    }
}
