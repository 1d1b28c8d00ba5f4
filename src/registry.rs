// ==============================================================================
// registry.rs - Dataset Registry
// ==============================================================================
// Description: Manifest-backed catalogue of genotype datasets with per-user visibility
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Manifest format (JSON):
//   {
//     "datasets": [
//       { "key": "soy50k", "name": "SoySNP50K", "location": "data/soy50k.vcf.gz" },
//       { "key": "lab", "location": "/srv/lab.vcf", "gzip": false, "users": ["alice"] }
//     ]
//   }
// Datasets without `users` are public. Relative locations resolve against the
// manifest's directory; `gzip` defaults to the location ending in ".gz".
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Identity;
use crate::parsers::{read_sample_names, VCFParseError, VCFSource};

/// Registry population errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read dataset manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid dataset manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dataset key '{0}' is declared more than once")]
    DuplicateKey(String),

    #[error("Failed to read samples of dataset '{key}': {source}")]
    Samples {
        key: String,
        #[source]
        source: VCFParseError,
    },

    #[error("Registry was not loaded from a manifest")]
    NoManifest,
}

/// One dataset entry of the manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    pub location: PathBuf,
    #[serde(default)]
    pub gzip: Option<bool>,
    /// Users allowed to see the dataset; absent or empty means public
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    datasets: Vec<ManifestEntry>,
}

/// A registered genotype dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub key: String,
    pub name: String,
    pub location: PathBuf,
    pub gzip: bool,
    /// Sample identifiers, in VCF column order
    pub samples: Vec<String>,
    #[serde(skip)]
    pub users: Vec<String>,
}

impl Dataset {
    /// Resolve a manifest entry and read its sample names from the VCF header
    pub fn from_entry(entry: ManifestEntry, base: &Path) -> Result<Self, RegistryError> {
        let location = if entry.location.is_absolute() {
            entry.location
        } else {
            base.join(entry.location)
        };
        let gzip = entry
            .gzip
            .unwrap_or_else(|| location.extension().is_some_and(|ext| ext == "gz"));

        let samples = read_sample_names(&location, gzip).map_err(|source| RegistryError::Samples {
            key: entry.key.clone(),
            source,
        })?;
        debug!("Dataset {} ({:?}): {} samples", entry.key, location, samples.len());

        Ok(Self {
            name: entry.name.unwrap_or_else(|| entry.key.clone()),
            key: entry.key,
            location,
            gzip,
            samples,
            users: entry.users,
        })
    }

    /// Whether the dataset is visible to everyone
    pub fn is_public(&self) -> bool {
        self.users.is_empty()
    }

    pub fn has_sample(&self, sample: &str) -> bool {
        self.samples.iter().any(|s| s == sample)
    }

    /// Open the dataset's record stream
    pub fn open(&self) -> Result<VCFSource, VCFParseError> {
        VCFSource::open(&self.location, self.gzip)
    }
}

/// Immutable registry contents
#[derive(Debug, Default)]
struct Snapshot {
    public: HashMap<String, Arc<Dataset>>,
    /// user -> key -> dataset
    restricted: HashMap<String, HashMap<String, Arc<Dataset>>>,
}

impl Snapshot {
    fn build(datasets: Vec<Dataset>) -> Result<Self, RegistryError> {
        let mut snapshot = Snapshot::default();
        let mut keys = HashSet::new();

        for dataset in datasets {
            if !keys.insert(dataset.key.clone()) {
                return Err(RegistryError::DuplicateKey(dataset.key));
            }

            let dataset = Arc::new(dataset);
            if dataset.is_public() {
                snapshot.public.insert(dataset.key.clone(), dataset);
            } else {
                for user in &dataset.users {
                    snapshot
                        .restricted
                        .entry(user.clone())
                        .or_default()
                        .insert(dataset.key.clone(), Arc::clone(&dataset));
                }
            }
        }

        Ok(snapshot)
    }

    fn restricted_for(&self, identity: Option<&Identity>) -> Option<&HashMap<String, Arc<Dataset>>> {
        identity.and_then(|id| self.restricted.get(id.as_str()))
    }
}

/// Thread-safe dataset catalogue
///
/// Readers clone the current snapshot `Arc` and release the lock before
/// touching any data; [`reload`](Self::reload) swaps in a new snapshot.
#[derive(Debug)]
pub struct DatasetRegistry {
    manifest: Option<PathBuf>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl DatasetRegistry {
    /// Build a registry from already-resolved datasets
    pub fn from_datasets(datasets: Vec<Dataset>) -> Result<Self, RegistryError> {
        Ok(Self {
            manifest: None,
            snapshot: RwLock::new(Arc::new(Snapshot::build(datasets)?)),
        })
    }

    /// Load a registry from a JSON manifest
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = Snapshot::build(load_manifest(&path)?)?;
        info!(
            "Loaded {} public and {} restricted-user dataset group(s) from {:?}",
            snapshot.public.len(),
            snapshot.restricted.len(),
            path
        );

        Ok(Self {
            manifest: Some(path),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read the manifest; on error the current contents stay in place
    pub fn reload(&self) -> Result<(), RegistryError> {
        let path = self.manifest.as_ref().ok_or(RegistryError::NoManifest)?;
        let snapshot = Arc::new(Snapshot::build(load_manifest(path)?)?);

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        info!("Reloaded dataset manifest {:?}", path);
        Ok(())
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Find a dataset visible to `identity` (public datasets take precedence)
    pub fn lookup(&self, key: &str, identity: Option<&Identity>) -> Option<Arc<Dataset>> {
        let snapshot = self.current();
        snapshot
            .public
            .get(key)
            .or_else(|| snapshot.restricted_for(identity).and_then(|sets| sets.get(key)))
            .cloned()
    }

    /// All datasets visible to `identity`, sorted by key
    pub fn list(&self, identity: Option<&Identity>) -> Vec<Arc<Dataset>> {
        let snapshot = self.current();
        let mut datasets: Vec<Arc<Dataset>> = snapshot
            .public
            .values()
            .chain(snapshot.restricted_for(identity).into_iter().flat_map(|sets| sets.values()))
            .cloned()
            .collect();

        datasets.sort_by(|a, b| a.key.cmp(&b.key));
        datasets
    }
}

/// Parse a manifest file and resolve every entry
pub fn load_manifest(path: &Path) -> Result<Vec<Dataset>, RegistryError> {
    let text = std::fs::read_to_string(path).map_err(|source| RegistryError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: Manifest = serde_json::from_str(&text).map_err(|source| RegistryError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest
        .datasets
        .into_iter()
        .map(|entry| Dataset::from_entry(entry, base))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "##fileformat=VCFv4.3\n\
        ##contig=<ID=chr1,length=1000>\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tref\tA\tB\n";

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("open.vcf"), HEADER).unwrap();

        let mut encoder = GzEncoder::new(
            fs::File::create(dir.path().join("lab.vcf.gz")).unwrap(),
            Compression::default(),
        );
        encoder.write_all(HEADER.as_bytes()).unwrap();
        encoder.finish().unwrap();

        fs::write(
            dir.path().join("manifest.json"),
            r#"{"datasets": [
                {"key": "open", "name": "Open panel", "location": "open.vcf"},
                {"key": "lab", "location": "lab.vcf.gz", "users": ["alice"]}
            ]}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_manifest_load() {
        let dir = fixture();
        let registry = DatasetRegistry::from_manifest(dir.path().join("manifest.json")).unwrap();

        let open = registry.lookup("open", None).unwrap();
        assert_eq!(open.name, "Open panel");
        assert!(!open.gzip);
        assert_eq!(open.samples, vec!["ref", "A", "B"]);
        assert_eq!(open.location, dir.path().join("open.vcf"));
    }

    #[test]
    fn test_restricted_visibility() {
        let dir = fixture();
        let registry = DatasetRegistry::from_manifest(dir.path().join("manifest.json")).unwrap();
        let alice = Identity("alice".to_string());
        let bob = Identity("bob".to_string());

        assert!(registry.lookup("lab", None).is_none());
        assert!(registry.lookup("lab", Some(&bob)).is_none());

        let lab = registry.lookup("lab", Some(&alice)).unwrap();
        assert!(lab.gzip);
        assert!(lab.has_sample("A"));

        let keys: Vec<String> = registry.list(Some(&alice)).iter().map(|d| d.key.clone()).collect();
        assert_eq!(keys, vec!["lab", "open"]);
        assert_eq!(registry.list(None).len(), 1);
    }

    #[test]
    fn test_unknown_key() {
        let dir = fixture();
        let registry = DatasetRegistry::from_manifest(dir.path().join("manifest.json")).unwrap();
        assert!(registry.lookup("missing", None).is_none());
    }

    #[test]
    fn test_missing_vcf_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, r#"{"datasets": [{"key": "gone", "location": "gone.vcf"}]}"#).unwrap();

        let result = DatasetRegistry::from_manifest(&path);
        assert!(matches!(result, Err(RegistryError::Samples { key, .. }) if key == "gone"));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let dir = fixture();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"datasets": [
                {"key": "open", "location": "open.vcf"},
                {"key": "open", "location": "lab.vcf.gz"}
            ]}"#,
        )
        .unwrap();

        let result = DatasetRegistry::from_manifest(&path);
        assert!(matches!(result, Err(RegistryError::DuplicateKey(key)) if key == "open"));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let dir = fixture();
        let path = dir.path().join("manifest.json");
        let registry = DatasetRegistry::from_manifest(&path).unwrap();
        let before = registry.lookup("open", None).unwrap();

        fs::write(&path, r#"{"datasets": [{"key": "renamed", "location": "open.vcf"}]}"#).unwrap();
        registry.reload().unwrap();

        assert!(registry.lookup("open", None).is_none());
        assert!(registry.lookup("renamed", None).is_some());
        // handles taken before the reload stay valid
        assert_eq!(before.key, "open");

        // a broken manifest leaves the current contents alone
        fs::write(&path, "not json").unwrap();
        assert!(matches!(registry.reload(), Err(RegistryError::ManifestParse { .. })));
        assert!(registry.lookup("renamed", None).is_some());
    }

    #[test]
    fn test_reload_without_manifest() {
        let registry = DatasetRegistry::from_datasets(Vec::new()).unwrap();
        assert!(matches!(registry.reload(), Err(RegistryError::NoManifest)));
    }
}
