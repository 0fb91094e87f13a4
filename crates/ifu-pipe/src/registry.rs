use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_io::write_atomic;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::serde::{from_json_slice, to_canonical_json_bytes};

/// Key under which the raw input cube is registered.
pub const RAW_CUBE_KEY: &str = "raw_cube";

/// Symbolic artifact names mapped to the files that hold them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRegistry {
    entries: BTreeMap<String, PathBuf>,
}

impl ArtifactRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path registered under `key`.
    pub fn get(&self, key: &str) -> Result<&Path, IfuError> {
        self.entries.get(key).map(PathBuf::as_path).ok_or_else(|| {
            IfuError::MissingArtifact(
                ErrorInfo::new("artifact-missing", format!("no artifact named {key}"))
                    .with_context("key", key)
                    .with_hint("run the step producing it first"),
            )
        })
    }

    /// True when `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registers `path` under `key`, superseding a previous entry.
    pub fn put(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(key.into(), path.into());
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for ArtifactRegistry {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// On-disk home of a target's registry: `{prod_loc}/{target}_artifacts.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Store of `target` under `prod_loc`.
    pub fn for_target(prod_loc: &Path, target: &str) -> Self {
        Self {
            path: prod_loc.join(format!("{target}_artifacts.json")),
        }
    }

    /// Persistence file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once a registry has been saved.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the persisted registry.
    pub fn load(&self) -> Result<ArtifactRegistry, IfuError> {
        let bytes =
            fs::read(&self.path).map_err(|err| IfuError::io("registry-read", &self.path, err))?;
        from_json_slice(&bytes).map_err(|err| match err {
            IfuError::Serde(info) => {
                IfuError::Serde(info.with_context("path", self.path.display().to_string()))
            }
            other => other,
        })
    }

    /// Replaces the persisted registry.
    pub fn save(&self, registry: &ArtifactRegistry) -> Result<(), IfuError> {
        write_atomic(&self.path, &to_canonical_json_bytes(registry)?)
    }

    /// Creates and persists the registry of a fresh target, holding only the raw cube.
    pub fn seed(&self, raw_cube: &Path) -> Result<ArtifactRegistry, IfuError> {
        if !raw_cube.is_file() {
            return Err(IfuError::MissingInputFile(
                ErrorInfo::new("raw-cube-missing", "raw input cube not found")
                    .with_context("path", raw_cube.display().to_string())
                    .with_hint("check data_loc and data_fn in the parameter file"),
            ));
        }
        let mut registry = ArtifactRegistry::new();
        registry.put(RAW_CUBE_KEY, raw_cube);
        self.save(&registry)?;
        info!(path = %self.path.display(), "fresh run: artifact registry created");
        Ok(registry)
    }

    /// Loads the registry, seeding it first when the target has none.
    pub fn load_or_seed(&self, raw_cube: &Path) -> Result<ArtifactRegistry, IfuError> {
        if self.exists() {
            self.load()
        } else {
            self.seed(raw_cube)
        }
    }
}
