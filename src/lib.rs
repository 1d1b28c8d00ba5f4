// ==============================================================================
// lib.rs - Genotype Windows Library
// ==============================================================================
// Description: Windowed genotype comparison over VCF datasets
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================

pub mod accumulator;
pub mod aggregator;
pub mod config;
pub mod genotype;
pub mod models;
pub mod output;
pub mod parsers;
pub mod registry;
pub mod request;
pub mod service;
pub mod window;

pub use aggregator::{AggregateError, AggregateSummary, WindowAggregator};
pub use config::{PartialPolicy, Settings};
pub use models::{ContigTable, Identity, VariantRecord};
pub use output::{OutputFormat, WindowRecord, WindowSink};
pub use registry::{Dataset, DatasetRegistry, RegistryError};
pub use request::{ComparisonRequest, RawRequest, RequestError, SampleRef};
pub use service::{CompareError, ComparisonService};
