//! Reachability engine.
//!
//! For every top-level declaration of the package under analysis, finds a
//! reference path to a vulnerable symbol by memoized depth-first search over
//! the package's reference graph. Direct hits come from the vulnerability
//! index; hits through dependencies come from facts exported when those
//! packages were analyzed. Paths may be longer than optimal; the search
//! trades shortest-path reporting for linear work.
//!
//! Determinism: members, imports, and successors are all iterated in
//! qualified-name order, and the first successor to yield a path for a
//! vulnerability wins.

use std::collections::BTreeMap;

use thiserror::Error;

use vulnreach_core::diag::Diagnostic;
use vulnreach_core::facts::{FactError, FactStore, ObjectKey, VulnFact};
use vulnreach_core::graph::{Object, ObjectId, Package, PackageGraph};

use crate::catalog::VulnIndex;
use crate::refgraph::RefGraph;

/// Vulnerability key (`ID:symbol`) to reference path, root first.
pub type PathMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Fact(#[from] FactError),
}

/// Memoization state for one node: grey while on the DFS stack, done after.
enum Memo {
    Grey,
    Done(PathMap),
}

pub struct Analyzer<'a> {
    graph: &'a PackageGraph,
    index: &'a VulnIndex,
}

impl<'a> Analyzer<'a> {
    pub fn new(graph: &'a PackageGraph, index: &'a VulnIndex) -> Self {
        Analyzer { graph, index }
    }

    /// Analyzes one package: emits diagnostics for every reachable
    /// vulnerable symbol and exports object facts (for exported members)
    /// and at most one package fact into `store`.
    ///
    /// The driver must have analyzed all of the package's dependencies
    /// first; their facts are read from `store`.
    pub fn analyze_package(
        &self,
        pkg: &Package,
        store: &mut FactStore,
    ) -> Result<Vec<Diagnostic>, AnalysisError> {
        let refgraph = RefGraph::build(self.graph, pkg);
        let mut memo: BTreeMap<ObjectId, Memo> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut package_paths: PathMap = BTreeMap::new();

        // Imports carrying package facts from dependencies: report at the
        // import site, rebuilding each path behind the package name.
        let mut import_ids: Vec<ObjectId> = refgraph.imports().collect();
        import_ids.sort_by_key(|&id| self.graph.object(id).qualified_name());
        for id in import_ids {
            let member = self.graph.object(id);
            let Some(imported) = member.imported.as_deref() else {
                continue;
            };
            let Some(fact) = store.package_fact(imported) else {
                continue;
            };
            for (vuln, prev) in &fact.paths {
                let mut path = Vec::with_capacity(prev.len() + 1);
                path.push(format(member));
                path.extend(prev.iter().cloned());
                diagnostics.push(Diagnostic::new(member.pos.clone(), vuln.clone(), &path));
                let shorter = package_paths
                    .get(vuln)
                    .is_none_or(|existing| existing.len() > path.len());
                if shorter {
                    package_paths.insert(vuln.clone(), path);
                }
            }
        }

        let mut members: Vec<ObjectId> = refgraph.members().collect();
        members.sort_by_key(|&id| self.graph.object(id).qualified_name());
        for id in members {
            let path = self.find_path(pkg, &refgraph, store, &mut memo, id);
            if path.is_empty() {
                continue;
            }
            let member = self.graph.object(id);
            for (vuln, trace) in &path {
                if trace.is_empty() {
                    continue;
                }
                diagnostics.push(Diagnostic::new(member.pos.clone(), vuln.clone(), trace));
            }
            // Only exported facts cross the package boundary.
            if member.is_exported() {
                store.export_object_fact(
                    ObjectKey::new(&member.package, member.db_name()),
                    VulnFact::new(path.clone()),
                )?;
            }
            if member.receiver.is_none() && member.name == "init" {
                for (vuln, trace) in &path {
                    package_paths
                        .entry(vuln.clone())
                        .or_insert_with(|| trace.clone());
                }
            }
        }

        if !package_paths.is_empty() {
            store.export_package_fact(pkg.path.clone(), VulnFact::new(package_paths))?;
        }
        Ok(diagnostics)
    }

    /// Depth-first path query with memoization. A node is grey while its
    /// successors are being explored; revisiting a grey node yields the
    /// empty map, which breaks reference cycles.
    fn find_path(
        &self,
        pkg: &Package,
        refgraph: &RefGraph,
        store: &FactStore,
        memo: &mut BTreeMap<ObjectId, Memo>,
        id: ObjectId,
    ) -> PathMap {
        match memo.get(&id) {
            Some(Memo::Grey) => return PathMap::new(),
            Some(Memo::Done(path)) => return path.clone(),
            None => {}
        }
        memo.insert(id, Memo::Grey);

        let obj = self.graph.object(id);
        let mut path = PathMap::new();
        let direct = self.index.direct_vulns(obj);
        if !direct.is_empty() {
            // The object itself is vulnerable.
            let formatted = format(obj);
            let symbol = symbol_of(&formatted);
            for vuln in direct {
                path.insert(format!("{vuln}:{symbol}"), vec![formatted.clone()]);
            }
        } else if let Some(fact) = self.imported_fact(pkg, obj, store) {
            // Indirectly vulnerable by induction over packages.
            let formatted = format(obj);
            for (vuln, prev) in &fact.paths {
                path.insert(vuln.clone(), prepend(&formatted, prev));
            }
        } else {
            // Does the object reference a vulnerable function?
            let formatted = format(obj);
            for succ in refgraph.successors(self.graph, id) {
                let sub = self.find_path(pkg, refgraph, store, memo, succ);
                if sub.is_empty() {
                    continue;
                }
                for (vuln, prev) in &sub {
                    // A later successor does not overwrite an earlier hit.
                    if !path.contains_key(vuln) {
                        path.insert(vuln.clone(), prepend(&formatted, prev));
                    }
                }
            }
        }

        memo.insert(id, Memo::Done(path.clone()));
        path
    }

    /// The fact exported for `obj` by an already-analyzed package. Objects
    /// of the package under analysis resolve through the reference graph
    /// instead.
    fn imported_fact<'s>(
        &self,
        pkg: &Package,
        obj: &Object,
        store: &'s FactStore,
    ) -> Option<&'s VulnFact> {
        if obj.package == pkg.path {
            return None;
        }
        store.object_fact(&ObjectKey::new(&obj.package, obj.db_name()))
    }
}

/// Renders an object as a path element: qualified name, space, position.
fn format(obj: &Object) -> String {
    format!("{} {}", obj.qualified_name(), obj.pos)
}

/// The symbol part of a formatted path element.
fn symbol_of(formatted: &str) -> &str {
    formatted.split(' ').next().unwrap_or(formatted)
}

/// Prepends `head` unless the path already starts with it; re-visits of a
/// lifted fact must not stack the same element twice.
fn prepend(head: &str, prev: &[String]) -> Vec<String> {
    if prev.first().is_some_and(|first| first == head) {
        return prev.to_vec();
    }
    let mut path = Vec::with_capacity(prev.len() + 1);
    path.push(head.to_string());
    path.extend(prev.iter().cloned());
    path
}
