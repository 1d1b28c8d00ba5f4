// ==============================================================================
// config.rs - Runtime Settings
// ==============================================================================
// Description: Comparison defaults shared by the CLI and the library service
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Every flag can also be set through its GTW_* environment variable; the
// binary loads a .env file (dotenvy) before parsing.
// ==============================================================================

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::output::OutputFormat;
use crate::window::DEFAULT_BIN_SIZE;

/// Default GFF3 source column
pub const DEFAULT_SOURCE: &str = "genotype-windows";

/// What happens to flushed windows when the variant stream fails midway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Stream windows as they are flushed; earlier windows survive a failure
    #[default]
    Keep,
    /// Hold windows until the stream ends; a failure writes nothing
    Discard,
}

/// Comparison settings
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct Settings {
    /// Dataset manifest (JSON)
    #[arg(long, env = "GTW_MANIFEST", default_value = "datasets.json", global = true)]
    pub manifest: PathBuf,

    /// Window size used when a request carries no positive bin
    #[arg(long, env = "GTW_DEFAULT_BIN", default_value_t = DEFAULT_BIN_SIZE, global = true)]
    pub default_bin: u64,

    /// GFF3 source column
    #[arg(long, env = "GTW_SOURCE", default_value = DEFAULT_SOURCE, global = true)]
    pub source: String,

    /// Output format
    #[arg(long, env = "GTW_FORMAT", value_enum, default_value_t = OutputFormat::Gff3, global = true)]
    pub format: OutputFormat,

    /// Partial-result policy on stream failure
    #[arg(long, env = "GTW_PARTIAL", value_enum, default_value_t = PartialPolicy::Keep, global = true)]
    pub partial: PartialPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("datasets.json"),
            default_bin: DEFAULT_BIN_SIZE,
            source: DEFAULT_SOURCE.to_string(),
            format: OutputFormat::Gff3,
            partial: PartialPolicy::Keep,
        }
    }
}
