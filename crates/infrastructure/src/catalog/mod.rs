//! Manifest catalog
//!
//! Holds the model manifests the agent can serve, read from a directory of
//! YAML files or from the built-in set.

mod builtin;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use domain::{DomainError, ModelManifest};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised while reading manifests
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Directory or file could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest file is invalid
    #[error("Invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: DomainError,
    },
}

/// Visible manifests keyed by canonical `name:version`
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    manifests: BTreeMap<String, ModelManifest>,
}

impl ManifestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifests shipped with the agent
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for (name, yaml) in builtin::BUILTIN_MANIFESTS {
            let manifest =
                ModelManifest::from_yaml(yaml).map_err(|source| CatalogError::Manifest {
                    path: PathBuf::from(name),
                    source,
                })?;
            catalog.insert(manifest);
        }
        Ok(catalog)
    }

    /// Read every `*.yml` / `*.yaml` file in `dir`
    #[instrument(skip(dir), fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let io_error = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_manifest_file(path))
            .collect();
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let file = fs::File::open(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let manifest = ModelManifest::from_yaml_reader(std::io::BufReader::new(file))
                .map_err(|source| CatalogError::Manifest {
                    path: path.clone(),
                    source,
                })?;
            debug!(path = %path.display(), model = %manifest.canonical_name(), "Read manifest");
            catalog.insert(manifest);
        }
        info!(models = catalog.len(), "Manifest catalog loaded");
        Ok(catalog)
    }

    /// Add a manifest; hidden manifests are ignored
    ///
    /// Returns whether the manifest was added.
    pub fn insert(&mut self, manifest: ModelManifest) -> bool {
        if manifest.hidden {
            debug!(model = %manifest.canonical_name(), "Skipping hidden manifest");
            return false;
        }
        let key = manifest.canonical_name();
        if self.manifests.insert(key.clone(), manifest).is_some() {
            warn!(model = %key, "Duplicate manifest replaced");
        }
        true
    }

    /// Find a manifest by `name:version`, or by `name` alone
    ///
    /// Matching is case-insensitive. A bare name resolves to the highest
    /// version when several are present.
    pub fn get(&self, name: &str) -> Option<&ModelManifest> {
        let wanted = name.trim().to_lowercase();
        if let Some(manifest) = self.manifests.get(&wanted) {
            return Some(manifest);
        }
        self.manifests
            .values()
            .filter(|m| m.name.trim().eq_ignore_ascii_case(&wanted))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
    }

    /// All manifests ordered by canonical name
    pub fn list(&self) -> Vec<&ModelManifest> {
        self.manifests.values().collect()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
}

/// Dotted numeric comparison, falling back to text for non-numeric parts
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |v: &str| -> Vec<String> { v.trim().split('.').map(str::to_string).collect() };
    let (a, b) = (parts(a), parts(b));
    for (x, y) in a.iter().zip(&b) {
        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ordering.is_ne() {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}
