//! Catalog filtering and the vulnerability index.
//!
//! The index maps package import paths to the OSV entries that apply to the
//! dependency graph under analysis: right ecosystem, right module, version
//! inside an affected range, platform constraints satisfied. It is built
//! once per invocation and read-only thereafter; the engine consults it for
//! direct hits only.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use vulnreach_core::graph::{Module, Object, ObjectKind, PackageGraph};
use vulnreach_osv::client::{CancelToken, Client, OsvError};
use vulnreach_osv::entry::{Affected, EcosystemSpecific, Entry, GO_ECOSYSTEM};
use vulnreach_osv::path::{check_module_path, is_std_package, STDLIB_MODULE};
use vulnreach_osv::platform::Platform;
use vulnreach_osv::version::{affects_semver, go_tag_to_semver};

use crate::modules::{extract_modules, mod_key, stdlib_module};

/// Errors loading or saving a pre-fetched index file.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The `--vulns-json` file could not be read. Running with no catalog
    /// would silently report clean, so this is fatal.
    #[error("vulnerability index {path} unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("vulnerability index {path} malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write vulnerability index: {0}")]
    Write(#[from] serde_json::Error),
}

/// Package import path to applicable entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VulnIndex {
    pkg_vulns: BTreeMap<String, Vec<Entry>>,
}

impl VulnIndex {
    pub fn new(pkg_vulns: BTreeMap<String, Vec<Entry>>) -> Self {
        VulnIndex { pkg_vulns }
    }

    /// Builds the index by querying the database for every module in the
    /// graph's import closure and projecting filtered entries onto packages.
    ///
    /// `toolchain_tag` versions the stdlib pseudo-module; an empty or
    /// unparseable tag leaves the standard library unscanned.
    pub fn fetch(
        token: &CancelToken,
        client: &dyn Client,
        graph: &PackageGraph,
        platform: &Platform,
        toolchain_tag: &str,
    ) -> Result<Self, OsvError> {
        let stdlib_semver = go_tag_to_semver(toolchain_tag);
        let modules = extract_modules(graph, &stdlib_semver);

        let mut mod_vulns: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        for module in &modules {
            let effective = match module.effective() {
                Some(m) => m,
                None => {
                    tracing::warn!(
                        target: "vulnreach",
                        module = %module.path,
                        "cyclic replace directive; treating version as unknown"
                    );
                    continue;
                }
            };
            if !check_module_path(&effective.path) {
                tracing::debug!(
                    target: "vulnreach",
                    module = %effective.path,
                    "skipping lookup for invalid module path"
                );
                continue;
            }
            let entries = client.by_module(token, &effective.path)?;
            let filtered = filter_entries(effective, entries, platform);
            if !filtered.is_empty() {
                mod_vulns.insert(mod_key(module), filtered);
            }
        }

        // Project module entries onto the packages they name.
        let stdlib = stdlib_module(&stdlib_semver);
        let mut pkg_vulns: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        graph.walk(|pkg| {
            let module = match &pkg.module {
                Some(m) => m,
                None if is_std_package(&pkg.path) => &stdlib,
                None => return,
            };
            let Some(entries) = mod_vulns.get(&mod_key(module)) else {
                return;
            };
            let hits: Vec<Entry> = entries
                .iter()
                .filter(|e| e.affected.iter().any(|a| a.package.name == pkg.path))
                .cloned()
                .collect();
            if !hits.is_empty() {
                pkg_vulns.insert(pkg.path.clone(), hits);
            }
        });

        Ok(VulnIndex { pkg_vulns })
    }

    /// Loads a pre-fetched index from a JSON file. Missing or malformed
    /// files are fatal.
    pub fn from_json_path(path: &Path) -> Result<Self, IndexError> {
        let data = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pkg_vulns =
            serde_json::from_slice(&data).map_err(|source| IndexError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(VulnIndex { pkg_vulns })
    }

    /// Writes the index as the same package-to-entries JSON `from_json_path`
    /// reads.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), IndexError> {
        serde_json::to_writer(writer, &self.pkg_vulns)?;
        Ok(())
    }

    pub fn entries_for(&self, pkg_path: &str) -> &[Entry] {
        self.pkg_vulns.get(pkg_path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.pkg_vulns.is_empty()
    }

    pub fn package_count(&self) -> usize {
        self.pkg_vulns.len()
    }

    /// Ids of entries that list `obj` itself as vulnerable: its package has
    /// entries whose symbol set contains the database name, or whose symbol
    /// set is empty (whole package). Only functions can be direct hits.
    pub fn direct_vulns(&self, obj: &Object) -> Vec<String> {
        if obj.kind != ObjectKind::Func {
            return Vec::new();
        }
        let Some(entries) = self.pkg_vulns.get(&obj.package) else {
            return Vec::new();
        };
        let name = obj.db_name();
        let mut ids = Vec::new();
        for entry in entries {
            let symbols = entry.affected_symbols(&obj.package);
            if symbols.is_empty() || symbols.iter().any(|s| *s == name) {
                ids.push(entry.id.clone());
            }
        }
        ids
    }
}

/// Applies the per-module selection rules to raw database entries.
///
/// An entry survives with only its surviving affected records; each affected
/// record survives only if it speaks of this module under the Go ecosystem,
/// the module's (post-replace) version is known and inside an affected
/// range, and at least one per-import constraint matches the platform (when
/// any were present).
pub fn filter_entries(module: &Module, entries: Vec<Entry>, platform: &Platform) -> Vec<Entry> {
    let mut filtered = Vec::new();
    for entry in entries {
        let mut kept: Vec<Affected> = Vec::new();
        for affected in entry.affected.iter().cloned() {
            if affected.package.ecosystem != GO_ECOSYSTEM {
                continue;
            }
            if module.path == STDLIB_MODULE && !is_std_package(&affected.package.name) {
                continue;
            }
            if module.path != STDLIB_MODULE && !affected.package.name.starts_with(&module.path) {
                continue;
            }
            // An unknown module version must not raise alarms.
            if module.version.is_empty() || !affects_semver(&affected.ranges, &module.version) {
                continue;
            }
            let had_imports = !affected.ecosystem_specific.imports.is_empty();
            let surviving: Vec<_> = affected
                .ecosystem_specific
                .imports
                .into_iter()
                .filter(|imp| platform.matches(imp))
                .collect();
            if had_imports && surviving.is_empty() {
                continue;
            }
            kept.push(Affected {
                ecosystem_specific: EcosystemSpecific { imports: surviving },
                ..affected
            });
        }
        if kept.is_empty() {
            continue;
        }
        let mut entry = Entry {
            affected: kept,
            ..entry
        };
        normalize_entry(&mut entry);
        filtered.push(entry);
    }
    filtered
}

/// Collapses the arbitrary line breaks catalog details arrive with.
fn normalize_entry(entry: &mut Entry) {
    entry.details = entry.details.replace('\n', " ").trim().to_string();
}

/// Filters a symbol list to names whose every dot-separated part is
/// exported.
pub fn exported_symbols(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .filter(|s| {
            s.split('.')
                .all(|part| part.chars().next().is_some_and(|c| c.is_uppercase()))
        })
        .cloned()
        .collect()
}
