// ==============================================================================
// accumulator.rs - Per-Window Comparison Counters
// ==============================================================================
// Description: Counts same/different/undefined calls inside one genomic window
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::genotype::CallClass;
use crate::output::{SampleWindow, WindowRecord};

/// Per-sample counters of one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTally {
    /// Calls identical to the reference call
    pub same: u64,
    /// Defined calls differing from the reference call
    pub different: u64,
    /// same + different
    pub total: u64,
}

/// Mutable counters for the window currently being filled
///
/// Sample identifiers are fixed at construction; `reset` zeroes counters but
/// keeps the identifiers. Memory use depends only on the number of samples.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    reference: String,
    samples: Vec<String>,
    tallies: Vec<SampleTally>,
    /// Sites with a defined reference call
    value: u64,
    /// Defined reference calls (always equal to `value`, reported separately)
    reference_count: u64,
    /// Same calls summed over all comparison samples
    same: u64,
    /// Different calls summed over all comparison samples
    different: u64,
    /// Undefined comparison calls, shared by all samples
    undefined: u64,
}

impl WindowAccumulator {
    /// Create counters for `reference` and `samples`
    ///
    /// Duplicate sample identifiers collapse onto their first occurrence.
    pub fn new<I, S>(reference: impl Into<String>, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for sample in samples {
            let sample = sample.into();
            if !unique.contains(&sample) {
                unique.push(sample);
            }
        }

        Self {
            reference: reference.into(),
            tallies: vec![SampleTally::default(); unique.len()],
            samples: unique,
            value: 0,
            reference_count: 0,
            same: 0,
            different: 0,
            undefined: 0,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Comparison samples in counter order
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Fold one site into the window
    ///
    /// `classes` holds one entry per comparison sample, in `samples()` order.
    /// Nothing is counted when the reference call is undefined.
    pub fn accumulate(&mut self, reference_defined: bool, classes: &[CallClass]) {
        if !reference_defined {
            return;
        }
        debug_assert_eq!(classes.len(), self.tallies.len());

        self.value += 1;
        self.reference_count += 1;

        for (tally, class) in self.tallies.iter_mut().zip(classes) {
            match class {
                CallClass::Same => {
                    tally.same += 1;
                    tally.total += 1;
                    self.same += 1;
                }
                CallClass::Different => {
                    tally.different += 1;
                    tally.total += 1;
                    self.different += 1;
                }
                CallClass::Undefined => self.undefined += 1,
            }
        }
    }

    /// Zero every counter, keeping the tracked identifiers
    pub fn reset(&mut self) {
        self.tallies.iter_mut().for_each(|t| *t = SampleTally::default());
        self.value = 0;
        self.reference_count = 0;
        self.same = 0;
        self.different = 0;
        self.undefined = 0;
    }

    /// Snapshot the counters as an output record for `[start, end]`
    pub fn emit(&self, contig: &str, start: u64, end: u64) -> WindowRecord {
        WindowRecord {
            contig: contig.to_string(),
            start,
            end,
            value: self.value,
            same: self.same,
            different: self.different,
            reference: self.reference.clone(),
            reference_count: self.reference_count,
            samples: self
                .samples
                .iter()
                .zip(&self.tallies)
                .map(|(sample, tally)| SampleWindow {
                    sample: sample.clone(),
                    tally: *tally,
                })
                .collect(),
            undefined: self.undefined,
        }
    }
}
