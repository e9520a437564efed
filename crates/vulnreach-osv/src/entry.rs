//! OSV entry model with the Go ecosystem extension.
//!
//! These types mirror the Open Source Vulnerability schema as published by
//! the Go vulnerability database. Fields the analyzer never consumes are kept
//! only where they are needed to round-trip catalog files faithfully.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ecosystem tag for entries the analyzer accepts.
pub const GO_ECOSYSTEM: &str = "Go";

/// One record in the vulnerability database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Database-internal identifier (e.g. "GO-2022-0187").
    pub id: String,
    /// When the entry was first published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    /// When the entry was last modified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Alternative identifiers (CVE, GHSA).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Free-form description. May contain arbitrary line breaks as authored.
    #[serde(default)]
    pub details: String,
    /// Affected packages and version ranges.
    #[serde(default)]
    pub affected: Vec<Affected>,
    /// External references (advisories, fixes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Entry {
    /// Union of per-import symbols this entry marks vulnerable in `pkg_path`,
    /// across every affected record. Empty means the whole package.
    pub fn affected_symbols(&self, pkg_path: &str) -> Vec<String> {
        let mut syms = Vec::new();
        for a in &self.affected {
            for imp in &a.ecosystem_specific.imports {
                if imp.path == pkg_path {
                    syms.extend(imp.symbols.iter().cloned());
                }
            }
        }
        syms
    }
}

/// A package/version-range binding inside an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Affected {
    pub package: Package,
    #[serde(default)]
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub ecosystem_specific: EcosystemSpecific,
}

/// The package an affected record speaks of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub ecosystem: String,
}

/// A set of version events defining affected version windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(rename = "type")]
    pub kind: RangeKind,
    #[serde(default)]
    pub events: Vec<RangeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RangeKind {
    Semver,
    Ecosystem,
    Git,
}

/// One `introduced`/`fixed` event inside a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

/// Go ecosystem extension: per-import platform and symbol constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcosystemSpecific {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<PackageImport>,
}

/// Constraints scoped to one import path within an affected module.
///
/// Empty `goos` or `goarch` lists mean "any". An empty `symbols` list marks
/// the entire package as vulnerable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageImport {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goarch: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
}

/// External reference attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_imports(imports: Vec<PackageImport>) -> Entry {
        Entry {
            id: "GO-2024-0001".to_string(),
            affected: vec![Affected {
                package: Package {
                    name: "b.com/m".to_string(),
                    ecosystem: GO_ECOSYSTEM.to_string(),
                },
                ranges: vec![],
                ecosystem_specific: EcosystemSpecific { imports },
            }],
            ..Entry::default()
        }
    }

    mod affected_symbols {
        use super::*;

        #[test]
        fn unions_symbols_across_records() {
            let entry = entry_with_imports(vec![
                PackageImport {
                    path: "b.com/m/vuln".to_string(),
                    symbols: vec!["Vuln".to_string()],
                    ..PackageImport::default()
                },
                PackageImport {
                    path: "b.com/m/vuln".to_string(),
                    symbols: vec!["VulnToo".to_string()],
                    ..PackageImport::default()
                },
            ]);
            assert_eq!(entry.affected_symbols("b.com/m/vuln"), vec!["Vuln", "VulnToo"]);
        }

        #[test]
        fn ignores_other_paths() {
            let entry = entry_with_imports(vec![PackageImport {
                path: "b.com/m/other".to_string(),
                symbols: vec!["X".to_string()],
                ..PackageImport::default()
            }]);
            assert!(entry.affected_symbols("b.com/m/vuln").is_empty());
        }
    }

    mod serde_shape {
        use super::*;

        #[test]
        fn range_kind_uses_uppercase() {
            let range = Range {
                kind: RangeKind::Semver,
                events: vec![RangeEvent {
                    introduced: Some("0".to_string()),
                    fixed: Some("1.1.0".to_string()),
                }],
            };
            let json = serde_json::to_value(&range).unwrap();
            assert_eq!(json["type"], "SEMVER");
        }

        #[test]
        fn entry_roundtrip() {
            let entry = entry_with_imports(vec![PackageImport {
                path: "b.com/m/vuln".to_string(),
                goos: vec!["linux".to_string()],
                symbols: vec!["Vuln".to_string()],
                ..PackageImport::default()
            }]);
            let json = serde_json::to_string(&entry).unwrap();
            let back: Entry = serde_json::from_str(&json).unwrap();
            assert_eq!(back, entry);
        }

        #[test]
        fn missing_optional_fields_default() {
            let entry: Entry = serde_json::from_str(r#"{"id":"GO-2024-0002"}"#).unwrap();
            assert_eq!(entry.id, "GO-2024-0002");
            assert!(entry.affected.is_empty());
            assert!(entry.aliases.is_empty());
        }
    }
}
