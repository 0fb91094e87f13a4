use std::fs;
use std::path::{Path, PathBuf};

use ifu_core::errors::{ErrorInfo, IfuError};
use serde::{Deserialize, Serialize};

use crate::worker::ContinuumMethod;

/// Version of the row checkpoint record layout.
pub const CHECKPOINT_VERSION: u32 = 1;

const EXTENSION: &str = "ckpt";

/// Fitted continua of every column in one fit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCheckpoint {
    /// Record layout version.
    pub version: u32,
    /// Fit row the payload belongs to.
    pub row: usize,
    /// Number of columns (spectra) in the payload.
    pub columns: usize,
    /// Number of wavelength samples per column.
    pub spectral_len: usize,
    /// Hash of the fit configuration that produced the payload.
    pub config_hash: String,
    /// One fitted spectrum per column, in column order.
    pub payload: Vec<Vec<f64>>,
}

impl RowCheckpoint {
    /// Builds a record, rejecting ragged payloads.
    pub fn new(row: usize, config_hash: String, payload: Vec<Vec<f64>>) -> Result<Self, IfuError> {
        let spectral_len = payload.first().map(Vec::len).unwrap_or(0);
        if let Some((column, ragged)) = payload
            .iter()
            .enumerate()
            .find(|(_, spectrum)| spectrum.len() != spectral_len)
        {
            return Err(IfuError::Shape(
                ErrorInfo::new("checkpoint-ragged", "columns differ in spectral length")
                    .with_context("row", row.to_string())
                    .with_context("column", column.to_string())
                    .with_context("expected", spectral_len.to_string())
                    .with_context("actual", ragged.len().to_string()),
            ));
        }
        Ok(Self {
            version: CHECKPOINT_VERSION,
            row,
            columns: payload.len(),
            spectral_len,
            config_hash,
            payload,
        })
    }

    /// Restores a record from disk.
    pub fn load(path: &Path) -> Result<Self, IfuError> {
        let bytes = fs::read(path).map_err(|err| IfuError::io("checkpoint-read", path, err))?;
        bincode::deserialize(&bytes).map_err(|err| {
            IfuError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Writes the record through a staging file so a torn write never looks complete.
    pub fn store(&self, path: &Path) -> Result<(), IfuError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| IfuError::io("checkpoint-mkdir", parent, err))?;
        }
        let bytes = bincode::serialize(self).map_err(|err| {
            IfuError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let staging = path.with_extension(format!("{EXTENSION}.partial"));
        fs::write(&staging, bytes).map_err(|err| IfuError::io("checkpoint-write", &staging, err))?;
        fs::rename(&staging, path).map_err(|err| IfuError::io("checkpoint-rename", path, err))
    }

    /// Checks the record against the shape the caller is about to merge it into.
    pub fn validate(&self, row: usize, columns: usize, spectral_len: usize) -> Result<(), IfuError> {
        let mismatch = |field: &str, expected: usize, actual: usize| {
            IfuError::Shape(
                ErrorInfo::new("checkpoint-shape", format!("checkpoint {field} mismatch"))
                    .with_context("row", row.to_string())
                    .with_context("expected", expected.to_string())
                    .with_context("actual", actual.to_string()),
            )
        };
        if self.version != CHECKPOINT_VERSION {
            return Err(IfuError::Serde(
                ErrorInfo::new("checkpoint-version", "unsupported checkpoint version")
                    .with_context("row", row.to_string())
                    .with_context("version", self.version.to_string()),
            ));
        }
        if self.row != row {
            return Err(mismatch("row", row, self.row));
        }
        if self.columns != columns || self.payload.len() != columns {
            return Err(mismatch("columns", columns, self.payload.len()));
        }
        if let Some(spectrum) = self.payload.iter().find(|s| s.len() != spectral_len) {
            return Err(mismatch("spectral length", spectral_len, spectrum.len()));
        }
        Ok(())
    }
}

/// Resolves the checkpoint file of every row of one fitting run.
///
/// Files are named `{tag}_{target}_{method}_row_{row:04}.ckpt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLocator {
    dir: PathBuf,
    prefix: String,
}

impl CheckpointLocator {
    /// Locator for `method` checkpoints of `target` written by the step tagged `tag`.
    pub fn new(dir: impl Into<PathBuf>, tag: &str, target: &str, method: ContinuumMethod) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{tag}_{target}_{}_row_", method.tag()),
        }
    }

    /// Rebuilds a locator from the prefix path recorded by [`CheckpointLocator::prefix_path`].
    pub fn from_prefix_path(path: &Path) -> Result<Self, IfuError> {
        let prefix = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IfuError::Config(
                    ErrorInfo::new("checkpoint-prefix", "checkpoint prefix has no file name")
                        .with_context("path", path.display().to_string()),
                )
            })?;
        Ok(Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            prefix: prefix.to_string(),
        })
    }

    /// Directory plus file name prefix shared by every row of the run.
    pub fn prefix_path(&self) -> PathBuf {
        self.dir.join(&self.prefix)
    }

    /// Path of the checkpoint for `row`.
    pub fn path(&self, row: usize) -> PathBuf {
        self.dir.join(format!("{}{row:04}.{EXTENSION}", self.prefix))
    }

    /// True when a complete checkpoint exists for `row`.
    pub fn exists(&self, row: usize) -> bool {
        self.path(row).is_file()
    }
}
