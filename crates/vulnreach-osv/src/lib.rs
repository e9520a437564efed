//! OSV vulnerability data for the Go ecosystem.
//!
//! This crate provides the catalog side of vulnerability reachability analysis:
//! - `entry`: OSV entry model with the Go ecosystem extension
//! - `version`: toolchain tag normalization and semver range membership
//! - `path`: module path validation and catalog escaping
//! - `platform`: GOOS/GOARCH detection and per-import constraint matching
//! - `client`: read-only database client trait with directory-backed and
//!   in-memory implementations

pub mod client;
pub mod entry;
pub mod path;
pub mod platform;
pub mod version;

pub use client::{CancelToken, Client, DirClient, MemClient, OsvError};
pub use entry::{
    Affected, EcosystemSpecific, Entry, Package, PackageImport, Range, RangeEvent, RangeKind,
    GO_ECOSYSTEM,
};
pub use platform::Platform;
