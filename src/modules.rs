//! Module extraction from the package graph.
//!
//! Collects the unique modules in the import closure, resolving replace
//! directives, and synthesizes the `stdlib` pseudo-module so standard-library
//! packages carry the toolchain version.

use std::collections::BTreeMap;
use std::process::Command;

use vulnreach_core::graph::{Module, PackageGraph};
use vulnreach_osv::path::STDLIB_MODULE;

/// Unique string identifier for a module: effective `path@version`.
/// A cyclic replace chain keeps the original path with an unknown version.
pub fn mod_key(module: &Module) -> String {
    match module.effective() {
        Some(m) => format!("{}@{}", m.path, m.version),
        None => format!("{}@", module.path),
    }
}

/// The synthetic module standard-library packages belong to.
pub fn stdlib_module(semver: &str) -> Module {
    Module::new(STDLIB_MODULE, semver)
}

/// Collects the modules of all packages in the import closure of the graph's
/// roots, deduplicated by [`mod_key`], plus the stdlib pseudo-module.
/// Return order is not part of the contract.
pub fn extract_modules(graph: &PackageGraph, stdlib_semver: &str) -> Vec<Module> {
    let mut by_key: BTreeMap<String, Module> = BTreeMap::new();
    let stdlib = stdlib_module(stdlib_semver);
    by_key.insert(mod_key(&stdlib), stdlib);

    graph.walk(|pkg| {
        if let Some(module) = &pkg.module {
            by_key.entry(mod_key(module)).or_insert_with(|| module.clone());
        }
    });

    by_key.into_values().collect()
}

/// The toolchain release tag: `GOVERSION` when set (a testing aid), else
/// `go env GOVERSION`. An empty result disables standard-library scanning.
pub fn toolchain_version() -> String {
    if let Ok(v) = std::env::var("GOVERSION") {
        if !v.is_empty() {
            return v;
        }
    }
    match Command::new("go").args(["env", "GOVERSION"]).output() {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => {
            tracing::warn!(
                target: "vulnreach",
                "failed to determine go version; skipping stdlib scanning"
            );
            String::new()
        }
    }
}
