// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers turning variant files into the comparison record stream
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================

pub mod vcf;

pub use vcf::{read_sample_names, VCFParseError, VCFSource};
