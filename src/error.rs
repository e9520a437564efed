//! Unified error type for the driver and binary.
//!
//! Subsystem errors (catalog, loader, engine) are bridged here before they
//! reach the process boundary. Setup failures exit non-zero; diagnostics,
//! however many, are a successful run.

use thiserror::Error;

use vulnreach_core::facts::FactError;
use vulnreach_core::graph::LoadError;
use vulnreach_osv::client::OsvError;

use crate::analyzer::AnalysisError;
use crate::catalog::IndexError;

#[derive(Debug, Error)]
pub enum VulnreachError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Database unreachable or a lookup failed mid-fetch. The engine never
    /// proceeds with a partial catalog.
    #[error("catalog fetch failed: {0}")]
    Catalog(#[from] OsvError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl From<FactError> for VulnreachError {
    fn from(err: FactError) -> Self {
        VulnreachError::Analysis(AnalysisError::Fact(err))
    }
}

impl VulnreachError {
    /// Process exit code: 2 for argument errors, 1 for every other setup
    /// failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            VulnreachError::InvalidArguments(_) => 2,
            _ => 1,
        }
    }
}
