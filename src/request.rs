// ==============================================================================
// request.rs - Comparison Request Parsing
// ==============================================================================
// Description: Validates "<dataset>:<sample>" selections and bin overrides
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Rules:
//   - reference must be "<dataset>:<sample>" with a non-empty sample,
//     otherwise the whole request is rejected
//   - malformed or repeated variant entries are dropped
//   - bin <= 0 or absent falls back to the configured default
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("No reference genotype selected")]
    MissingReference,

    #[error("Invalid sample selection: '{0}' (expected '<dataset>:<sample>')")]
    Malformed(String),
}

/// One sample of one dataset, written `<dataset>:<sample>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleRef {
    pub dataset: String,
    pub sample: String,
}

impl FromStr for SampleRef {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(dataset), Some(sample), None) if !sample.is_empty() => Ok(Self {
                dataset: dataset.to_string(),
                sample: sample.to_string(),
            }),
            _ => Err(RequestError::Malformed(s.to_string())),
        }
    }
}

impl fmt::Display for SampleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset, self.sample)
    }
}

/// A validated comparison request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub reference: SampleRef,
    /// Distinct, well-formed variant selections in request order
    pub variants: Vec<SampleRef>,
    /// Positive bin override
    pub bin: Option<u64>,
}

impl ComparisonRequest {
    /// Validate raw request fields
    ///
    /// # Examples
    /// ```
    /// use genotype_windows::request::ComparisonRequest;
    ///
    /// let request = ComparisonRequest::parse(
    ///     "soy50k:Williams82",
    ///     ["soy50k:PI_88788", "bogus", "soy50k:PI_88788"],
    ///     Some(-5),
    /// ).unwrap();
    ///
    /// assert_eq!(request.variants.len(), 1);
    /// assert_eq!(request.bin, None);
    /// ```
    pub fn parse<I, S>(reference: &str, variants: I, bin: Option<i64>) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if reference.trim().is_empty() {
            return Err(RequestError::MissingReference);
        }
        let reference: SampleRef = reference.parse()?;

        let mut parsed: Vec<SampleRef> = Vec::new();
        for entry in variants {
            let entry = entry.as_ref();
            match entry.parse::<SampleRef>() {
                Ok(sample) if !parsed.contains(&sample) => parsed.push(sample),
                Ok(sample) => warn!("Dropping repeated variant selection {}", sample),
                Err(_) => warn!("Dropping malformed variant selection '{}'", entry),
            }
        }

        Ok(Self {
            reference,
            variants: parsed,
            bin: bin.filter(|&b| b > 0).map(|b| b as u64),
        })
    }

    /// Bin size to use, given the configured default
    pub fn bin_size(&self, default: u64) -> u64 {
        self.bin.unwrap_or(default)
    }
}

/// Wire form of a request, as found in batch files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    /// Output name (batch mode), defaults to the request position
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub bin: Option<i64>,
    /// Authenticated user the request runs as
    #[serde(default)]
    pub user: Option<String>,
}

impl TryFrom<&RawRequest> for ComparisonRequest {
    type Error = RequestError;

    fn try_from(raw: &RawRequest) -> Result<Self, Self::Error> {
        ComparisonRequest::parse(&raw.reference, &raw.variants, raw.bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_ref_parsing() {
        let sample: SampleRef = "soy50k:Williams82".parse().unwrap();
        assert_eq!(sample.dataset, "soy50k");
        assert_eq!(sample.sample, "Williams82");
        assert_eq!(sample.to_string(), "soy50k:Williams82");

        assert!("soy50k".parse::<SampleRef>().is_err());
        assert!("soy50k:".parse::<SampleRef>().is_err());
        assert!("a:b:c".parse::<SampleRef>().is_err());
    }

    #[test]
    fn test_missing_reference() {
        let result = ComparisonRequest::parse("", ["d:a"], None);
        assert_eq!(result, Err(RequestError::MissingReference));
    }

    #[test]
    fn test_malformed_reference_fails_request() {
        let result = ComparisonRequest::parse("dataset-only", ["d:a"], None);
        assert_eq!(result, Err(RequestError::Malformed("dataset-only".to_string())));
    }

    #[test]
    fn test_variants_filtered_and_deduplicated() {
        let request = ComparisonRequest::parse("d:ref", ["d:a", "d:", "d:b", "d:a", "x:a"], None).unwrap();

        let names: Vec<String> = request.variants.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["d:a", "d:b", "x:a"]);
    }

    #[test]
    fn test_bin_override() {
        let request = ComparisonRequest::parse("d:ref", Vec::<String>::new(), Some(250_000)).unwrap();
        assert_eq!(request.bin_size(500_000), 250_000);

        let request = ComparisonRequest::parse("d:ref", Vec::<String>::new(), Some(0)).unwrap();
        assert_eq!(request.bin_size(500_000), 500_000);
    }

    #[test]
    fn test_raw_request_from_json() {
        let raw: RawRequest = serde_json::from_str(
            r#"{"reference": "d:ref", "variants": ["d:a", "oops"], "bin": 1000, "user": "alice"}"#,
        )
        .unwrap();
        let request = ComparisonRequest::try_from(&raw).unwrap();

        assert_eq!(request.variants.len(), 1);
        assert_eq!(request.bin, Some(1000));
        assert_eq!(raw.user.as_deref(), Some("alice"));
        assert_eq!(raw.name, None);
    }
}
