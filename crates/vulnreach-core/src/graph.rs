//! Loader contract: the resolved package graph an external front end hands
//! to the analyzer.
//!
//! The front end owns parsing and type checking. What crosses the boundary
//! is already resolved: every identifier or selector use inside a top-level
//! declaration arrives as a reference to an interned [`Object`]. Objects are
//! keyed by stable [`ObjectId`]s so the graph is freely serializable and the
//! analysis deterministic; positions are carried only for reporting.
//!
//! Function-local objects never appear: declarations reference package-level
//! functions, variables, constants, type names, methods, and imported
//! package names only.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Identity
// ============================================================================

/// Stable identifier of an interned object within a package graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

/// Kind of package-level entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Func,
    Var,
    Const,
    TypeName,
    /// An imported-package name as it appears in the importing file.
    PkgName,
}

/// Source position in `file:line:col` form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Position {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// A package-level entity: function (with optional receiver), variable,
/// constant, type name, or imported-package name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    /// Import path of the package that declares this object. For a
    /// `PkgName` this is the importing package.
    pub package: String,
    pub kind: ObjectKind,
    pub name: String,
    /// Receiver type name for methods, undecorated: pointers and path
    /// qualifiers already stripped by the front end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// For `PkgName` objects, the import path of the package being imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported: Option<String>,
    #[serde(default)]
    pub pos: Position,
}

impl Object {
    /// Name under which the vulnerability database lists this object:
    /// `Name` for plain functions, `Recv.Name` for methods.
    pub fn db_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{recv}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Qualified name used for ordering and path rendering: the imported
    /// package path for package names, `package.db-name` otherwise.
    pub fn qualified_name(&self) -> String {
        match self.kind {
            ObjectKind::PkgName => self
                .imported
                .clone()
                .unwrap_or_else(|| self.name.clone()),
            _ => format!("{}.{}", self.package, self.db_name()),
        }
    }

    /// Go exportedness: the name starts with an uppercase letter.
    pub fn is_exported(&self) -> bool {
        self.name
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase())
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Module identity with an optional replace target. An empty version is the
/// sentinel for "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Box<Module>>,
}

impl Module {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Module {
            path: path.into(),
            version: version.into(),
            replace: None,
        }
    }

    pub fn with_replace(mut self, replace: Module) -> Self {
        self.replace = Some(Box::new(replace));
        self
    }

    /// Chases replace pointers to the effective module. A cyclic replace
    /// chain yields `None`; callers treat that as an unknown version.
    pub fn effective(&self) -> Option<&Module> {
        let mut seen = BTreeSet::new();
        let mut m = self;
        while let Some(next) = m.replace.as_deref() {
            if !seen.insert((m.path.as_str(), m.version.as_str())) {
                return None;
            }
            m = next;
        }
        if seen.contains(&(m.path.as_str(), m.version.as_str())) {
            return None;
        }
        Some(m)
    }
}

// ============================================================================
// Typed declarations
// ============================================================================

/// A top-level declaration with its resolved references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
    Import(ImportDecl),
}

/// Function, method, or package initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    /// The declared function object.
    pub object: ObjectId,
    /// Receiver type-name object, present for methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ObjectId>,
    /// Objects referenced anywhere in the declaration.
    #[serde(default)]
    pub refs: Vec<ObjectId>,
}

/// A grouped declaration (`var`, `const`, or `type` block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenDecl {
    pub specs: Vec<Spec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
}

/// One var/const spec; all names share the spec's references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub names: Vec<ObjectId>,
    #[serde(default)]
    pub refs: Vec<ObjectId>,
}

/// One type spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: ObjectId,
    #[serde(default)]
    pub refs: Vec<ObjectId>,
}

/// One import spec; the object is the `PkgName` introduced by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub object: ObjectId,
}

// ============================================================================
// Packages and the graph
// ============================================================================

/// A loaded package: identity, owning module, direct imports, and top-level
/// declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
    /// Import paths of directly imported packages.
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

/// Severity class of a loader-reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderErrorKind {
    Parse,
    Type,
    Other,
}

/// A problem the front end hit while loading. Parse and type errors are
/// non-fatal; everything else aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderError {
    pub kind: LoaderErrorKind,
    pub message: String,
}

/// The program-wide package graph plus the interned object table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageGraph {
    /// Interned objects; `ObjectId` indexes this table.
    pub objects: Vec<Object>,
    /// Packages keyed by import path.
    pub packages: BTreeMap<String, Package>,
    /// Import paths of the root packages under analysis.
    pub roots: Vec<String>,
    /// Problems reported by the front end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LoaderError>,
}

/// Errors reading or validating a package graph.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read package graph: {0}")]
    Io(#[from] io::Error),

    #[error("malformed package graph: {0}")]
    Json(#[from] serde_json::Error),

    #[error("package graph is inconsistent: {0}")]
    Inconsistent(String),

    /// The front end reported errors beyond parsing and typing.
    #[error("loader failed: {0}")]
    Loader(String),
}

impl PackageGraph {
    /// Reads and validates a graph from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read(path)?;
        let graph: PackageGraph = serde_json::from_slice(&data)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.get(path)
    }

    /// Non-parse, non-type loader errors; a non-empty result is fatal.
    pub fn fatal_errors(&self) -> Vec<&LoaderError> {
        self.errors
            .iter()
            .filter(|e| e.kind == LoaderErrorKind::Other)
            .collect()
    }

    /// Packages in reverse topological order: every package appears after
    /// all packages it imports. Post-order walk from the roots; imports that
    /// resolve to unknown packages are skipped.
    pub fn analysis_order(&self) -> Vec<&Package> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for root in &self.roots {
            self.visit_post_order(root, &mut seen, &mut order);
        }
        order
    }

    fn visit_post_order<'a>(
        &'a self,
        path: &str,
        seen: &mut BTreeSet<String>,
        order: &mut Vec<&'a Package>,
    ) {
        if !seen.insert(path.to_string()) {
            return;
        }
        let Some(pkg) = self.packages.get(path) else {
            return;
        };
        for imp in &pkg.imports {
            self.visit_post_order(imp, seen, order);
        }
        order.push(pkg);
    }

    /// Pre-order walk of the import closure from the roots.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Package)) {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();
        while let Some(path) = stack.pop() {
            if !seen.insert(path.to_string()) {
                continue;
            }
            let Some(pkg) = self.packages.get(path) else {
                continue;
            };
            visit(pkg);
            for imp in pkg.imports.iter().rev() {
                stack.push(imp);
            }
        }
    }

    fn validate(&self) -> Result<(), LoadError> {
        for (i, obj) in self.objects.iter().enumerate() {
            if obj.id.index() != i {
                return Err(LoadError::Inconsistent(format!(
                    "object table out of order at index {i}: found {}",
                    obj.id
                )));
            }
        }
        let check = |id: ObjectId| -> Result<(), LoadError> {
            if id.index() >= self.objects.len() {
                return Err(LoadError::Inconsistent(format!(
                    "declaration references unknown {id}"
                )));
            }
            Ok(())
        };
        for pkg in self.packages.values() {
            for decl in &pkg.decls {
                match decl {
                    Decl::Func(f) => {
                        check(f.object)?;
                        if let Some(recv) = f.receiver {
                            check(recv)?;
                        }
                        for &r in &f.refs {
                            check(r)?;
                        }
                    }
                    Decl::Gen(g) => {
                        for spec in &g.specs {
                            match spec {
                                Spec::Value(v) => {
                                    for &n in &v.names {
                                        check(n)?;
                                    }
                                    for &r in &v.refs {
                                        check(r)?;
                                    }
                                }
                                Spec::Type(t) => {
                                    check(t.name)?;
                                    for &r in &t.refs {
                                        check(r)?;
                                    }
                                }
                            }
                        }
                    }
                    Decl::Import(i) => check(i.object)?,
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Construction surface for front ends (and tests) assembling a graph.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    objects: Vec<Object>,
    packages: BTreeMap<String, Package>,
    roots: Vec<String>,
    errors: Vec<LoaderError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder::default()
    }

    fn intern(
        &mut self,
        package: &str,
        kind: ObjectKind,
        name: &str,
        receiver: Option<&str>,
        imported: Option<&str>,
        pos: Position,
    ) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        self.objects.push(Object {
            id,
            package: package.to_string(),
            kind,
            name: name.to_string(),
            receiver: receiver.map(str::to_string),
            imported: imported.map(str::to_string),
            pos,
        });
        id
    }

    /// Interns a package-level function.
    pub fn func(&mut self, package: &str, name: &str, pos: Position) -> ObjectId {
        self.intern(package, ObjectKind::Func, name, None, None, pos)
    }

    /// Interns a method on `receiver` (undecorated type name).
    pub fn method(&mut self, package: &str, receiver: &str, name: &str, pos: Position) -> ObjectId {
        self.intern(package, ObjectKind::Func, name, Some(receiver), None, pos)
    }

    pub fn var(&mut self, package: &str, name: &str, pos: Position) -> ObjectId {
        self.intern(package, ObjectKind::Var, name, None, None, pos)
    }

    pub fn constant(&mut self, package: &str, name: &str, pos: Position) -> ObjectId {
        self.intern(package, ObjectKind::Const, name, None, None, pos)
    }

    pub fn type_name(&mut self, package: &str, name: &str, pos: Position) -> ObjectId {
        self.intern(package, ObjectKind::TypeName, name, None, None, pos)
    }

    /// Interns the package name an import spec introduces into `package`.
    pub fn pkg_name(
        &mut self,
        package: &str,
        alias: &str,
        imported: &str,
        pos: Position,
    ) -> ObjectId {
        self.intern(package, ObjectKind::PkgName, alias, None, Some(imported), pos)
    }

    /// Adds a package; call after interning its objects.
    pub fn package(&mut self, pkg: Package) -> &mut Self {
        self.packages.insert(pkg.path.clone(), pkg);
        self
    }

    pub fn root(&mut self, path: &str) -> &mut Self {
        self.roots.push(path.to_string());
        self
    }

    pub fn loader_error(&mut self, kind: LoaderErrorKind, message: &str) -> &mut Self {
        self.errors.push(LoaderError {
            kind,
            message: message.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<PackageGraph, LoadError> {
        let graph = PackageGraph {
            objects: self.objects,
            packages: self.packages,
            roots: self.roots,
            errors: self.errors,
        };
        graph.validate()?;
        Ok(graph)
    }
}
