// ==============================================================================
// parsers/vcf.rs - VCF variant stream
// ==============================================================================
// Description: Streams VCF records as per-sample GT calls using noodles-vcf
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// References:
// - VCF 4.3 Spec: https://samtools.github.io/hts-specs/VCFv4.3.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/0.81.0/noodles_vcf/
// ==============================================================================

use flate2::read::MultiGzDecoder;
use noodles_vcf as vcf;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::models::{ContigTable, VariantRecord};

/// FORMAT key holding the genotype
const GT_KEY: &str = "GT";

/// VCF parsing errors
#[derive(Error, Debug)]
pub enum VCFParseError {
    #[error("Failed to open VCF file: {0}")]
    FileOpenError(String),

    #[error("Failed to read VCF header: {0}")]
    HeaderError(String),

    #[error("Failed to parse VCF record {record}: {details}")]
    RecordError { record: u64, details: String },

    #[error("Sample not present in VCF header: {0}")]
    UnknownSample(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

type BoxedRead = Box<dyn BufRead + Send>;

/// Streaming VCF reader yielding [`VariantRecord`]s
///
/// Only the GT subfield of the selected samples is kept; every other column
/// is skipped. Iteration stops after the first error.
///
/// # Example
/// ```no_run
/// use genotype_windows::parsers::VCFSource;
///
/// let mut source = VCFSource::open("soy50k.vcf.gz", true)?;
/// source.select_samples(["PI_88788", "Williams82"])?;
/// for record in source {
///     let record = record?;
///     println!("{}:{} {:?}", record.contig, record.position, record.call("PI_88788"));
/// }
/// # Ok::<(), genotype_windows::parsers::VCFParseError>(())
/// ```
pub struct VCFSource {
    reader: vcf::io::Reader<BoxedRead>,
    header: vcf::Header,
    record: vcf::Record,
    /// Sample id per sample column, `None` for columns not selected
    selected: Vec<Option<String>>,
    records_read: u64,
    done: bool,
}

impl VCFSource {
    /// Open a VCF file, decompressing gzip/BGZF when `gzip` is set
    pub fn open(path: impl AsRef<Path>, gzip: bool) -> Result<Self, VCFParseError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| VCFParseError::FileOpenError(format!("{}: {}", path.display(), e)))?;

        // BGZF is multi-member gzip, so one decoder covers both
        let inner: BoxedRead = if gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        debug!("Opened VCF {:?} (gzip: {})", path, gzip);
        Self::from_reader(inner)
    }

    /// Wrap an already-decompressed VCF stream and read its header
    pub fn from_reader<R: BufRead + Send + 'static>(inner: R) -> Result<Self, VCFParseError> {
        let mut reader = vcf::io::Reader::new(Box::new(inner) as BoxedRead);
        let header = reader
            .read_header()
            .map_err(|e| VCFParseError::HeaderError(e.to_string()))?;

        // All samples selected until told otherwise
        let selected = header.sample_names().iter().cloned().map(Some).collect();

        Ok(Self {
            reader,
            header,
            record: vcf::Record::default(),
            selected,
            records_read: 0,
            done: false,
        })
    }

    /// Contig lengths declared by `##contig` header lines
    pub fn contig_table(&self) -> ContigTable {
        self.header
            .contigs()
            .iter()
            .map(|(name, contig)| (name.clone(), contig.length().map(|l| l as u64)))
            .collect()
    }

    /// Sample column names, in file order
    pub fn sample_names(&self) -> Vec<String> {
        self.header.sample_names().iter().cloned().collect()
    }

    /// Restrict the calls carried by each record to `samples`
    pub fn select_samples<I, S>(&mut self, samples: I) -> Result<(), VCFParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = self.header.sample_names();
        let mut selected = vec![None; names.len()];

        for sample in samples {
            let sample = sample.as_ref();
            let index = names
                .get_index_of(sample)
                .ok_or_else(|| VCFParseError::UnknownSample(sample.to_string()))?;
            selected[index] = Some(sample.to_string());
        }

        self.selected = selected;
        Ok(())
    }

    /// Convert the record buffer into a [`VariantRecord`]
    fn convert(&self) -> Result<VariantRecord, VCFParseError> {
        let position = match self.record.variant_start() {
            Some(Ok(pos)) => usize::from(pos) as u64,
            Some(Err(e)) => return Err(self.record_error(format!("invalid position: {}", e))),
            None => return Err(self.record_error("missing position".to_string())),
        };

        let mut variant = VariantRecord::new(self.record.reference_sequence_name(), position);

        // Raw sample block: FORMAT\tsample1\tsample2...
        let samples = self.record.samples();
        let mut columns = samples.as_ref().split('\t');
        let gt_index = columns
            .next()
            .and_then(|format| format.split(':').position(|key| key == GT_KEY));

        // No GT in FORMAT: every call stays absent (undefined)
        if let Some(gt_index) = gt_index {
            for (column, value) in columns.enumerate() {
                let Some(Some(sample)) = self.selected.get(column) else {
                    continue;
                };
                if let Some(gt) = value.split(':').nth(gt_index) {
                    variant.calls.insert(sample.clone(), gt.to_string());
                }
            }
        }

        Ok(variant)
    }

    fn record_error(&self, details: String) -> VCFParseError {
        VCFParseError::RecordError {
            record: self.records_read,
            details,
        }
    }
}

impl Iterator for VCFSource {
    type Item = Result<VariantRecord, VCFParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.reader.read_record(&mut self.record) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(_) => {
                self.records_read += 1;
                self.convert()
            }
            Err(e) => Err(VCFParseError::IoError(e)),
        };

        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Read only the header of a VCF file and return its sample names
pub fn read_sample_names(path: impl AsRef<Path>, gzip: bool) -> Result<Vec<String>, VCFParseError> {
    VCFSource::open(path, gzip).map(|source| source.sample_names())
}
