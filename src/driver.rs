//! Multi-package analysis driver.
//!
//! The engine assumes its dependencies' facts are already in the store; the
//! driver guarantees that by analyzing in reverse topological order. It also
//! folds raw diagnostics into the per-(category, root) summary printed at
//! the end of a run.

use std::collections::BTreeMap;

use vulnreach_core::diag::Diagnostic;
use vulnreach_core::facts::FactStore;
use vulnreach_core::graph::PackageGraph;

use crate::analyzer::{AnalysisError, Analyzer};
use crate::catalog::VulnIndex;

/// The outcome of analyzing a whole graph.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// (analyzed package, diagnostic) in analysis order.
    pub diagnostics: Vec<(String, Diagnostic)>,
    /// Every fact exported during the run.
    pub facts: FactStore,
}

impl AnalysisReport {
    pub fn summary(&self) -> Vec<SummaryRow> {
        summarize(&self.diagnostics)
    }
}

/// One aggregated finding: all diagnostics sharing a category and path root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub category: String,
    /// Last path element: the vulnerable symbol the paths lead to.
    pub root: String,
    pub count: usize,
    /// Shortest trace observed for this finding.
    pub trace: Vec<String>,
}

/// Analyzes every package reachable from the graph roots, dependencies
/// before dependents.
pub fn analyze_graph(
    graph: &PackageGraph,
    index: &VulnIndex,
) -> Result<AnalysisReport, AnalysisError> {
    let analyzer = Analyzer::new(graph, index);
    let mut facts = FactStore::new();
    let mut diagnostics = Vec::new();
    for pkg in graph.analysis_order() {
        tracing::debug!(target: "vulnreach", package = %pkg.path, "analyzing");
        let pkg_diags = analyzer.analyze_package(pkg, &mut facts)?;
        diagnostics.extend(pkg_diags.into_iter().map(|d| (pkg.path.clone(), d)));
    }
    Ok(AnalysisReport { diagnostics, facts })
}

/// Folds diagnostics into summary rows keyed by (category, root), counting
/// occurrences and keeping the shortest trace.
pub fn summarize(diagnostics: &[(String, Diagnostic)]) -> Vec<SummaryRow> {
    let mut rows: BTreeMap<(String, String), SummaryRow> = BTreeMap::new();
    for (_, diag) in diagnostics {
        let trace: Vec<String> = diag.path().iter().map(|s| s.to_string()).collect();
        let root = trace.last().cloned().unwrap_or_default();
        let key = (diag.category.clone(), root.clone());
        rows.entry(key)
            .and_modify(|row| {
                row.count += 1;
                if trace.len() < row.trace.len() {
                    row.trace = trace.clone();
                }
            })
            .or_insert_with(|| SummaryRow {
                category: diag.category.clone(),
                root,
                count: 1,
                trace,
            });
    }
    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnreach_core::graph::Position;

    fn diag(category: &str, path: &[&str]) -> (String, Diagnostic) {
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        (
            "p".to_string(),
            Diagnostic::new(Position::default(), category, &path),
        )
    }

    #[test]
    fn same_category_and_root_collapse() {
        let diags = vec![
            diag("GO-1:v.V", &["a.A f.go:1:1", "v.V v.go:9:9"]),
            diag("GO-1:v.V", &["b.B g.go:2:2", "x.X h.go:3:3", "v.V v.go:9:9"]),
        ];
        let rows = summarize(&diags);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].trace.len(), 2);
        assert_eq!(rows[0].root, "v.V v.go:9:9");
    }

    #[test]
    fn distinct_roots_stay_separate() {
        let diags = vec![
            diag("GO-1:v.V", &["a.A f.go:1:1", "v.V v.go:9:9"]),
            diag("GO-1:v.W", &["a.A f.go:1:1", "v.W v.go:8:8"]),
        ];
        assert_eq!(summarize(&diags).len(), 2);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(summarize(&[]).is_empty());
    }
}
