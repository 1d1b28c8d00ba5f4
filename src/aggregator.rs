// ==============================================================================
// aggregator.rs - Streaming Window Aggregation
// ==============================================================================
// Description: Folds a position-sorted variant stream into per-window counts
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Stream contract:
//   - records grouped by contig, non-decreasing position within a contig
//   - a window is flushed when the next record leaves it (new contig or a
//     position past its end); windows without records are never emitted
//   - the last window is flushed by `finish`, never implicitly
//   - a read error stops the fold; the in-progress window is dropped
// Out-of-order input is not rejected: a lower position lands in the current
// window, a contig seen before starts over at its own windows.
// ==============================================================================

use std::collections::HashSet;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accumulator::WindowAccumulator;
use crate::genotype::{classify, is_defined, CallClass};
use crate::models::{ContigTable, VariantRecord};
use crate::output::WindowSink;
use crate::window::WindowLayout;

/// Aggregation errors
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Variant stream failed after {windows_emitted} window(s): {source}")]
    Stream {
        windows_emitted: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write window: {0}")]
    Sink(#[from] io::Error),
}

/// Totals of one aggregation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Records consumed from the stream
    pub records: u64,
    /// Records with a defined reference call
    pub sites: u64,
    /// Windows written to the sink
    pub windows: usize,
    /// Contig runs seen (a contig reappearing counts again)
    pub contigs: usize,
}

/// Window currently being filled
#[derive(Debug, Clone)]
struct ActiveWindow {
    contig: String,
    layout: WindowLayout,
    index: u64,
}

/// Single-pass window aggregator
///
/// One instance serves one comparison; it is driven either record by record
/// with [`push`](Self::push) + [`finish`](Self::finish) or over a whole stream
/// with [`run`](Self::run).
pub struct WindowAggregator<'a> {
    contigs: &'a ContigTable,
    bin_size: u64,
    accumulator: WindowAccumulator,
    classes: Vec<CallClass>,
    current: Option<ActiveWindow>,
    seen: HashSet<String>,
    summary: AggregateSummary,
}

impl<'a> WindowAggregator<'a> {
    pub fn new<I, S>(contigs: &'a ContigTable, bin_size: u64, reference: &str, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accumulator = WindowAccumulator::new(reference, samples);
        Self {
            contigs,
            bin_size: bin_size.max(1),
            classes: Vec::with_capacity(accumulator.samples().len()),
            accumulator,
            current: None,
            seen: HashSet::new(),
            summary: AggregateSummary::default(),
        }
    }

    /// Consume `records` to the end and flush the last window
    ///
    /// The first `Err` item stops the fold: windows already written stay in
    /// the sink, the window in progress is discarded.
    pub fn run<I, E, S>(mut self, records: I, sink: &mut S) -> Result<AggregateSummary, AggregateError>
    where
        I: IntoIterator<Item = Result<VariantRecord, E>>,
        E: std::error::Error + Send + Sync + 'static,
        S: WindowSink + ?Sized,
    {
        for record in records {
            match record {
                Ok(record) => self.push(&record, sink)?,
                Err(e) => {
                    warn!(
                        "Variant stream failed after {} record(s), {} window(s) flushed: {}",
                        self.summary.records, self.summary.windows, e
                    );
                    return Err(AggregateError::Stream {
                        windows_emitted: self.summary.windows,
                        source: Box::new(e),
                    });
                }
            }
        }

        self.finish(sink)
    }

    /// Fold one record, flushing the previous window first if it was left
    pub fn push<S>(&mut self, record: &VariantRecord, sink: &mut S) -> Result<(), AggregateError>
    where
        S: WindowSink + ?Sized,
    {
        self.summary.records += 1;

        let crossed = match &self.current {
            Some(active) if active.contig == record.contig => {
                record.position > active.layout.end(active.index)
            }
            _ => true,
        };
        if crossed {
            self.advance(record, sink)?;
        }

        match record.call(self.accumulator.reference()).filter(|gt| is_defined(Some(*gt))) {
            Some(reference_gt) => {
                self.classes.clear();
                self.classes.extend(
                    self.accumulator
                        .samples()
                        .iter()
                        .map(|sample| classify(reference_gt, record.call(sample))),
                );
                self.accumulator.accumulate(true, &self.classes);
                self.summary.sites += 1;
            }
            None => {
                self.accumulator.accumulate(false, &[]);
            }
        }

        Ok(())
    }

    /// Flush the last window (if any record was seen) and close the sink
    pub fn finish<S>(mut self, sink: &mut S) -> Result<AggregateSummary, AggregateError>
    where
        S: WindowSink + ?Sized,
    {
        self.flush(sink)?;
        sink.finish()?;

        info!(
            "Aggregated {} record(s) ({} comparable) into {} window(s) over {} contig(s)",
            self.summary.records, self.summary.sites, self.summary.windows, self.summary.contigs
        );
        Ok(self.summary)
    }

    /// Move to the window holding `record`, flushing the one being left
    fn advance<S>(&mut self, record: &VariantRecord, sink: &mut S) -> Result<(), AggregateError>
    where
        S: WindowSink + ?Sized,
    {
        self.flush(sink)?;

        if let Some(active) = self.current.as_mut().filter(|a| a.contig == record.contig) {
            active.index = active.layout.index_of(record.position);
            return Ok(());
        }

        if !self.seen.insert(record.contig.clone()) {
            warn!(
                "Contig {} reappeared at position {}; input is not grouped by contig",
                record.contig, record.position
            );
        }

        let length = self.contigs.length(&record.contig);
        let layout = WindowLayout::new(length, self.bin_size);
        debug!(
            "Contig {} (length {:?}): window span {}",
            record.contig,
            length,
            layout.span()
        );

        self.current = Some(ActiveWindow {
            contig: record.contig.clone(),
            layout,
            index: layout.index_of(record.position),
        });
        self.summary.contigs += 1;
        Ok(())
    }

    fn flush<S>(&mut self, sink: &mut S) -> Result<(), AggregateError>
    where
        S: WindowSink + ?Sized,
    {
        let Some(active) = &self.current else {
            return Ok(());
        };

        let start = active.layout.start(active.index);
        let end = active.layout.end(active.index);
        let window = self.accumulator.emit(&active.contig, start, end);
        debug!("Flush {}:{}-{} ({} sites)", window.contig, start, end, window.value);

        sink.write_window(&window)?;
        self.accumulator.reset();
        self.summary.windows += 1;
        Ok(())
    }
}
