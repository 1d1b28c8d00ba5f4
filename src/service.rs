// ==============================================================================
// service.rs - Comparison Service
// ==============================================================================
// Description: Resolves comparison requests against the registry and runs them
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Pipeline per request:
//   1. Resolve the reference dataset for the caller's identity
//   2. Keep variant samples the dataset actually carries
//   3. Open the VCF, restrict it to the selected samples
//   4. Fold the record stream into windows under the partial-result policy
// ==============================================================================

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::aggregator::{AggregateError, AggregateSummary, WindowAggregator};
use crate::config::{PartialPolicy, Settings};
use crate::models::Identity;
use crate::output::{sink_for, WindowRecord, WindowSink};
use crate::parsers::VCFParseError;
use crate::registry::{Dataset, DatasetRegistry};
use crate::request::{ComparisonRequest, RequestError};

/// Comparison errors
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Malformed request: {0}")]
    Malformed(#[from] RequestError),

    #[error("Dataset not available: {0}")]
    DatasetUnavailable(String),

    #[error("Sample '{sample}' not found in dataset '{dataset}'")]
    UnknownSample { dataset: String, sample: String },

    #[error("Failed to open dataset '{dataset}': {source}")]
    Open {
        dataset: String,
        #[source]
        source: VCFParseError,
    },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Failed to create output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Comparison task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A request resolved against one dataset
#[derive(Debug, Clone)]
pub struct ComparisonPlan {
    pub dataset: Arc<Dataset>,
    pub reference: String,
    /// Comparison samples, request order
    pub samples: Vec<String>,
    pub bin_size: u64,
}

/// Runs comparisons against a shared registry
#[derive(Debug, Clone)]
pub struct ComparisonService {
    registry: Arc<DatasetRegistry>,
    settings: Settings,
}

impl ComparisonService {
    pub fn new(registry: Arc<DatasetRegistry>, settings: Settings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve datasets and samples for `request`
    pub fn plan(&self, request: &ComparisonRequest, identity: Option<&Identity>) -> Result<ComparisonPlan, CompareError> {
        let reference = &request.reference;
        let dataset = self
            .registry
            .lookup(&reference.dataset, identity)
            .ok_or_else(|| CompareError::DatasetUnavailable(reference.dataset.clone()))?;

        if !dataset.has_sample(&reference.sample) {
            return Err(CompareError::UnknownSample {
                dataset: dataset.key.clone(),
                sample: reference.sample.clone(),
            });
        }

        let mut samples = Vec::with_capacity(request.variants.len());
        for variant in &request.variants {
            if variant.dataset != dataset.key {
                warn!(
                    "Dropping {}: only samples of dataset '{}' can be compared",
                    variant, dataset.key
                );
            } else if !dataset.has_sample(&variant.sample) {
                warn!("Dropping {}: sample not in dataset", variant);
            } else {
                samples.push(variant.sample.clone());
            }
        }

        Ok(ComparisonPlan {
            reference: reference.sample.clone(),
            samples,
            bin_size: request.bin_size(self.settings.default_bin),
            dataset,
        })
    }

    /// Run one comparison, writing windows into `sink`
    pub fn compare<S>(
        &self,
        request: &ComparisonRequest,
        identity: Option<&Identity>,
        sink: &mut S,
    ) -> Result<AggregateSummary, CompareError>
    where
        S: WindowSink + ?Sized,
    {
        let span = info_span!("compare", request_id = %Uuid::new_v4(), reference = %request.reference);
        let _guard = span.enter();

        let plan = self.plan(request, identity)?;
        info!(
            "Comparing {} against {} sample(s) of '{}' (bin {})",
            plan.reference,
            plan.samples.len(),
            plan.dataset.key,
            plan.bin_size
        );

        let open_error = |source| CompareError::Open {
            dataset: plan.dataset.key.clone(),
            source,
        };
        let mut source = plan.dataset.open().map_err(open_error)?;
        source
            .select_samples(std::iter::once(&plan.reference).chain(&plan.samples))
            .map_err(open_error)?;

        let contigs = source.contig_table();
        let aggregator = WindowAggregator::new(&contigs, plan.bin_size, &plan.reference, plan.samples.iter().cloned());

        match self.settings.partial {
            PartialPolicy::Keep => match aggregator.run(source, sink) {
                Ok(summary) => Ok(summary),
                Err(e) => {
                    // flushed windows stay readable
                    if let Err(flush) = sink.finish() {
                        warn!("Failed to flush partial output: {}", flush);
                    }
                    Err(e.into())
                }
            },
            PartialPolicy::Discard => {
                let mut held: Vec<WindowRecord> = Vec::new();
                let summary = aggregator.run(source, &mut held).map_err(|e| match e {
                    AggregateError::Stream { source, .. } => AggregateError::Stream {
                        windows_emitted: 0,
                        source,
                    },
                    other => other,
                })?;

                for window in &held {
                    sink.write_window(window).map_err(AggregateError::from)?;
                }
                sink.finish().map_err(AggregateError::from)?;
                Ok(summary)
            }
        }
    }

    /// Run one comparison on the blocking pool, writing `path` in the configured format
    ///
    /// Under [`PartialPolicy::Discard`] a failed comparison leaves no file behind.
    pub async fn compare_to_file(
        self: Arc<Self>,
        request: ComparisonRequest,
        identity: Option<Identity>,
        path: PathBuf,
    ) -> Result<AggregateSummary, CompareError> {
        tokio::task::spawn_blocking(move || self.compare_to_path(&request, identity.as_ref(), &path)).await?
    }

    fn compare_to_path(
        &self,
        request: &ComparisonRequest,
        identity: Option<&Identity>,
        path: &Path,
    ) -> Result<AggregateSummary, CompareError> {
        let output_error = |source| CompareError::Output {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(output_error)?;
        let mut sink = sink_for(self.settings.format, BufWriter::new(file), &self.settings.source)
            .map_err(output_error)?;

        let result = self.compare(request, identity, &mut sink);
        drop(sink);

        if result.is_err() && self.settings.partial == PartialPolicy::Discard {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove discarded output {:?}: {}", path, e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{GffWriter, OutputFormat};
    use std::fs;
    use tempfile::TempDir;

    const VCF_TEXT: &str = "##fileformat=VCFv4.3
##contig=<ID=chr1,length=1000>
##contig=<ID=chr2,length=500>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tref\tA\tB
chr1\t10\t.\tA\tG\t.\t.\t.\tGT\t0/0\t0/0\t0/1
chr1\t50\t.\tC\tT\t.\t.\t.\tGT\t0/0\t1/1\t./.
chr1\t700\t.\tC\tT\t.\t.\t.\tGT\t./.\t1/1\t1/1
chr2\t20\t.\tG\tA\t.\t.\t.\tGT\t1|1\t1|1\t0|1
";

    fn fixture(vcf: &str) -> (TempDir, Arc<DatasetRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("panel.vcf"), vcf).unwrap();
        fs::write(dir.path().join("other.vcf"), vcf).unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"datasets": [
                {"key": "panel", "location": "panel.vcf"},
                {"key": "other", "location": "other.vcf"},
                {"key": "private", "location": "panel.vcf", "users": ["alice"]}
            ]}"#,
        )
        .unwrap();
        let registry = DatasetRegistry::from_manifest(dir.path().join("manifest.json")).unwrap();
        (dir, Arc::new(registry))
    }

    fn service(registry: Arc<DatasetRegistry>, partial: PartialPolicy) -> ComparisonService {
        let settings = Settings {
            default_bin: 400,
            source: "test".to_string(),
            partial,
            ..Settings::default()
        };
        ComparisonService::new(registry, settings)
    }

    fn request(variants: &[&str]) -> ComparisonRequest {
        ComparisonRequest::parse("panel:ref", variants.iter().copied(), None).unwrap()
    }

    #[test]
    fn test_compare_end_to_end_gff() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Keep);

        let mut writer = GffWriter::new(Vec::new(), "test").unwrap();
        let summary = service
            .compare(&request(&["panel:A", "panel:B"]), None, &mut writer)
            .unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(summary.windows, 3);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.sites, 3);
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[1],
            "chr1\ttest\twindow\t1\t333\t.\t.\t.\t\
             value=2;same=1;diff=2;ref_ref=2;same_A=1;diff_A=1;total_A=2;same_B=0;diff_B=1;total_B=1;undefined=1"
        );
        // reference missing: the window is still emitted, all zero
        assert!(lines[2].starts_with("chr1\ttest\twindow\t667\t1000\t"));
        assert!(lines[2].ends_with("value=0;same=0;diff=0;ref_ref=0;same_A=0;diff_A=0;total_A=0;same_B=0;diff_B=0;total_B=0;undefined=0"));
        assert!(lines[3].starts_with("chr2\ttest\twindow\t1\t250\t"));
    }

    #[test]
    fn test_bin_override_used() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Keep);
        let request = ComparisonRequest::parse("panel:ref", ["panel:A"], Some(2000)).unwrap();

        let mut windows: Vec<WindowRecord> = Vec::new();
        service.compare(&request, None, &mut windows).unwrap();

        // bin larger than both contigs: one window each, clipped to the contig
        assert_eq!(windows.len(), 2);
        assert_eq!((windows[0].start, windows[0].end), (1, 1000));
        assert_eq!((windows[1].start, windows[1].end), (1, 500));
    }

    #[test]
    fn test_foreign_and_unknown_variants_dropped() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Keep);

        let plan = service
            .plan(&request(&["other:A", "panel:Z", "panel:B"]), None)
            .unwrap();
        assert_eq!(plan.samples, vec!["B"]);
        assert_eq!(plan.bin_size, 400);
    }

    #[test]
    fn test_unknown_reference_sample() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Keep);
        let request = ComparisonRequest::parse("panel:nobody", ["panel:A"], None).unwrap();

        let result = service.compare(&request, None, &mut Vec::new());
        assert!(matches!(result, Err(CompareError::UnknownSample { sample, .. }) if sample == "nobody"));
    }

    #[test]
    fn test_dataset_visibility() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Keep);
        let request = ComparisonRequest::parse("private:ref", ["private:A"], None).unwrap();

        let result = service.compare(&request, None, &mut Vec::new());
        assert!(matches!(result, Err(CompareError::DatasetUnavailable(key)) if key == "private"));

        let alice = Identity("alice".to_string());
        let mut windows: Vec<WindowRecord> = Vec::new();
        service.compare(&request, Some(&alice), &mut windows).unwrap();
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn test_keep_policy_on_stream_failure() {
        let broken = VCF_TEXT.replace("chr2\t20\t", "chr2\ttwenty\t");
        let (_dir, registry) = fixture(&broken);
        let service = service(registry, PartialPolicy::Keep);

        let mut windows: Vec<WindowRecord> = Vec::new();
        let result = service.compare(&request(&["panel:A"]), None, &mut windows);

        assert!(matches!(
            result,
            Err(CompareError::Aggregate(AggregateError::Stream { windows_emitted: 1, .. }))
        ));
        // chr1 [1,333] flushed; [667,1000] was in progress and is lost
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, 333);
    }

    #[test]
    fn test_discard_policy_on_stream_failure() {
        let broken = VCF_TEXT.replace("chr2\t20\t", "chr2\ttwenty\t");
        let (_dir, registry) = fixture(&broken);
        let service = service(registry, PartialPolicy::Discard);

        let mut windows: Vec<WindowRecord> = Vec::new();
        let result = service.compare(&request(&["panel:A"]), None, &mut windows);

        assert!(matches!(
            result,
            Err(CompareError::Aggregate(AggregateError::Stream { windows_emitted: 0, .. }))
        ));
        assert!(windows.is_empty());
    }

    #[test]
    fn test_discard_policy_success_forwards_all() {
        let (_dir, registry) = fixture(VCF_TEXT);
        let service = service(registry, PartialPolicy::Discard);

        let mut windows: Vec<WindowRecord> = Vec::new();
        let summary = service.compare(&request(&["panel:A"]), None, &mut windows).unwrap();
        assert_eq!(windows.len(), summary.windows);
        assert_eq!(windows.len(), 3);
    }

    #[tokio::test]
    async fn test_compare_to_file_json_lines() {
        let (dir, registry) = fixture(VCF_TEXT);
        let mut service = service(registry, PartialPolicy::Keep);
        service.settings.format = OutputFormat::JsonLines;
        let path = dir.path().join("out.jsonl");

        let summary = Arc::new(service)
            .compare_to_file(request(&["panel:A"]), None, path.clone())
            .await
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), summary.windows);
        let first: WindowRecord = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first.value, 2);
        assert_eq!(first.samples[0].sample, "A");
    }

    #[tokio::test]
    async fn test_compare_to_file_discard_removes_output() {
        let broken = VCF_TEXT.replace("chr2\t20\t", "chr2\ttwenty\t");
        let (dir, registry) = fixture(&broken);
        let service = Arc::new(service(registry, PartialPolicy::Discard));
        let path = dir.path().join("out.gff3");

        let result = service.compare_to_file(request(&["panel:A"]), None, path.clone()).await;
        assert!(result.is_err());
        assert!(!path.exists());
    }

    struct ClosedSink;

    impl WindowSink for ClosedSink {
        fn write_window(&mut self, _record: &WindowRecord) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_sink_failure_under_both_policies() {
        let (_dir, registry) = fixture(VCF_TEXT);

        for partial in [PartialPolicy::Keep, PartialPolicy::Discard] {
            let service = service(Arc::clone(&registry), partial);
            let result = service.compare(&request(&["panel:A"]), None, &mut ClosedSink);

            assert!(
                matches!(result, Err(CompareError::Aggregate(AggregateError::Sink(_)))),
                "{:?}: {:?}",
                partial,
                result
            );
        }
    }
}
