//! Reachability facts propagated across package boundaries.
//!
//! A fact is the exported summary of one analysis unit: for each
//! vulnerability key (`ID:symbol`), the reference path from the carrying
//! object (or package) to the vulnerable symbol, root first. The driver owns
//! a [`FactStore`]; the engine writes facts for the package it is analyzing
//! and reads facts of packages analyzed before it. Each key is written at
//! most once.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary attached to an exported object or to a package: vulnerability
/// key to reference path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnFact {
    pub paths: BTreeMap<String, Vec<String>>,
}

impl VulnFact {
    pub fn new(paths: BTreeMap<String, Vec<String>>) -> Self {
        VulnFact { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl fmt::Display for VulnFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, path) in &self.paths {
            write!(f, "{key}:{};", path.join(" -> "))?;
        }
        Ok(())
    }
}

/// Identity of an exported object within the store: owning package import
/// path plus database name (`Name` or `Recv.Name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub package: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactError {
    /// A fact key may be written only once, on its owning package's analysis.
    #[error("object fact for {0} already written")]
    DuplicateObjectFact(ObjectKey),

    #[error("package fact for {0} already written")]
    DuplicatePackageFact(String),
}

/// Append-only store of analysis outputs, keyed by exported object and by
/// package. Iteration order is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactStore {
    objects: BTreeMap<ObjectKey, VulnFact>,
    packages: BTreeMap<String, VulnFact>,
}

impl FactStore {
    pub fn new() -> Self {
        FactStore::default()
    }

    pub fn export_object_fact(&mut self, key: ObjectKey, fact: VulnFact) -> Result<(), FactError> {
        if self.objects.contains_key(&key) {
            return Err(FactError::DuplicateObjectFact(key));
        }
        self.objects.insert(key, fact);
        Ok(())
    }

    pub fn object_fact(&self, key: &ObjectKey) -> Option<&VulnFact> {
        self.objects.get(key)
    }

    pub fn export_package_fact(
        &mut self,
        package: impl Into<String>,
        fact: VulnFact,
    ) -> Result<(), FactError> {
        let package = package.into();
        if self.packages.contains_key(&package) {
            return Err(FactError::DuplicatePackageFact(package));
        }
        self.packages.insert(package, fact);
        Ok(())
    }

    pub fn package_fact(&self, package: &str) -> Option<&VulnFact> {
        self.packages.get(package)
    }

    pub fn object_facts(&self) -> impl Iterator<Item = (&ObjectKey, &VulnFact)> {
        self.objects.iter()
    }

    pub fn package_facts(&self) -> impl Iterator<Item = (&String, &VulnFact)> {
        self.packages.iter()
    }

    pub fn object_fact_count(&self) -> usize {
        self.objects.len()
    }

    pub fn package_fact_count(&self) -> usize {
        self.packages.len()
    }
}
