//! The comparison report document written by `compare`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::{write_atomic, BranchGraph};
use crate::matcher::{Comparison, MatchMode, MatchParams};

/// Provenance of one side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSummary {
    pub path: String,
    pub node_count: u32,
}

impl GraphSummary {
    fn of(graph: &BranchGraph) -> Self {
        Self {
            path: graph.binary().to_string(),
            node_count: graph.node_count() as u32,
        }
    }
}

/// The matching parameters echoed into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportParams {
    pub mode: MatchMode,
    pub min_size: u32,
    pub size_filter: Option<u32>,
    pub max_report: u32,
}

impl From<&MatchParams> for ReportParams {
    fn from(p: &MatchParams) -> Self {
        Self {
            mode: p.mode,
            min_size: p.min_size,
            size_filter: p.size_filter,
            max_report: p.max_report,
        }
    }
}

/// Full comparison report: both graphs, the parameters, and the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonReport {
    pub prior_graph: GraphSummary,
    pub new_graph: GraphSummary,
    pub params: ReportParams,
    pub comparison: Comparison,
}

impl ComparisonReport {
    pub fn new(
        prior: &BranchGraph,
        new: &BranchGraph,
        params: &MatchParams,
        comparison: Comparison,
    ) -> Self {
        Self {
            prior_graph: GraphSummary::of(prior),
            new_graph: GraphSummary::of(new),
            params: params.into(),
            comparison,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize comparison report")
    }

    /// Write the report atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, &json)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
