//! Core infrastructure for vulnerability reachability analysis.
//!
//! This crate is language-front-end agnostic:
//! - `graph`: the loader contract — packages, modules, interned objects,
//!   and typed top-level declarations as produced by an external front end
//! - `facts`: serializable reachability summaries propagated across packages
//! - `diag`: the diagnostic wire format

pub mod diag;
pub mod facts;
pub mod graph;

pub use diag::Diagnostic;
pub use facts::{FactError, FactStore, ObjectKey, VulnFact};
pub use graph::{
    Decl, FuncDecl, GenDecl, GraphBuilder, ImportDecl, LoadError, LoaderError, LoaderErrorKind,
    Module, Object, ObjectId, ObjectKind, Package, PackageGraph, Position, Spec, TypeSpec,
    ValueSpec,
};
