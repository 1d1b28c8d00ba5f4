// ==============================================================================
// models.rs - Variant Stream Data Models
// ==============================================================================
// Description: Records, contigs and identities shared by the comparison core
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One genomic site with the calls of the samples taking part in a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    /// Contig identifier (e.g., "chr1", "Gm01")
    pub contig: String,

    /// 1-based position on the contig
    pub position: u64,

    /// Raw GT strings keyed by sample identifier (e.g., "0/1", "1|1", "./.")
    pub calls: HashMap<String, String>,
}

impl VariantRecord {
    pub fn new(contig: impl Into<String>, position: u64) -> Self {
        Self {
            contig: contig.into(),
            position,
            calls: HashMap::new(),
        }
    }

    /// Builder-style helper, mostly for tests and adapters
    pub fn with_call(mut self, sample: impl Into<String>, call: impl Into<String>) -> Self {
        self.calls.insert(sample.into(), call.into());
        self
    }

    /// Call of one sample, `None` when the record carries nothing for it
    pub fn call(&self, sample: &str) -> Option<&str> {
        self.calls.get(sample).map(String::as_str)
    }
}

/// Contig identifier to length, read once from stream metadata
///
/// A length of zero is stored as unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContigTable {
    lengths: HashMap<String, u64>,
}

impl ContigTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contig: impl Into<String>, length: Option<u64>) {
        let contig = contig.into();
        match length.filter(|&l| l > 0) {
            Some(l) => {
                self.lengths.insert(contig, l);
            }
            None => {
                self.lengths.remove(&contig);
            }
        }
    }

    /// Known length of a contig
    pub fn length(&self, contig: &str) -> Option<u64> {
        self.lengths.get(contig).copied()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<u64>)> for ContigTable {
    fn from_iter<I: IntoIterator<Item = (S, Option<u64>)>>(iter: I) -> Self {
        let mut table = ContigTable::new();
        for (contig, length) in iter {
            table.insert(contig, length);
        }
        table
    }
}

/// Already-authenticated caller, as handed over by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
