//! Diagnostic wire format.
//!
//! One diagnostic per (vulnerability id, symbol) pair reachable from a
//! top-level declaration. The category is `<id>:<symbol>`; the message is
//! `<id>|` followed by the reference path joined with tabs, root first.

use serde::{Deserialize, Serialize};

use crate::graph::Position;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Position of the referring top-level declaration.
    pub pos: Position,
    /// `<vulnerability-id>:<symbol>`.
    pub category: String,
    /// `<vulnerability-id>|<path element 0>\t<path element 1>\t...`.
    pub message: String,
}

impl Diagnostic {
    /// Builds a diagnostic for vulnerability key `category` (`ID:symbol`)
    /// with the given reference path.
    pub fn new(pos: Position, category: impl Into<String>, path: &[String]) -> Self {
        let category = category.into();
        let id = category.split(':').next().unwrap_or(&category).to_string();
        Diagnostic {
            pos,
            message: format!("{id}|{}", path.join("\t")),
            category,
        }
    }

    /// The vulnerability id encoded in the category.
    pub fn vuln_id(&self) -> &str {
        self.category.split(':').next().unwrap_or(&self.category)
    }

    /// The reference path encoded in the message, root first.
    pub fn path(&self) -> Vec<&str> {
        match self.message.split_once('|') {
            Some((_, path)) => path.split('\t').collect(),
            None => Vec::new(),
        }
    }
}
