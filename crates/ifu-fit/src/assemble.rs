use std::collections::BTreeSet;

use ifu_core::errors::IfuError;
use ndarray::Array3;
use tracing::{info, warn};

use crate::checkpoint::{CheckpointLocator, RowCheckpoint};

/// Continuum cube rebuilt from row checkpoints.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Cube indexed `(wavelength, y, x)`; rows without a checkpoint are NaN.
    pub cube: Array3<f64>,
    /// Rows filled from a checkpoint.
    pub present: Vec<usize>,
    /// Rows left at the NaN sentinel.
    pub missing: Vec<usize>,
}

impl Assembly {
    /// True when every expected row had a checkpoint.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Places every available row checkpoint into a NaN-initialised cube.
///
/// `expected_rows` is the cube's x extent, `columns` its y extent. Missing rows
/// are a normal outcome of partial runs and are only reported; a checkpoint whose
/// shape disagrees with the cube is a [`IfuError::Shape`] error.
pub fn assemble(
    expected_rows: usize,
    locator: &CheckpointLocator,
    columns: usize,
    spectral_len: usize,
) -> Result<Assembly, IfuError> {
    let mut cube = Array3::from_elem((spectral_len, columns, expected_rows), f64::NAN);
    let mut present = Vec::new();
    let mut missing = Vec::new();
    let mut hashes = BTreeSet::new();

    for row in 0..expected_rows {
        if !locator.exists(row) {
            missing.push(row);
            continue;
        }
        let checkpoint = RowCheckpoint::load(&locator.path(row))?;
        checkpoint.validate(row, columns, spectral_len)?;
        for (column, spectrum) in checkpoint.payload.iter().enumerate() {
            for (plane, value) in spectrum.iter().enumerate() {
                cube[[plane, column, row]] = *value;
            }
        }
        hashes.insert(checkpoint.config_hash);
        present.push(row);
    }

    if hashes.len() > 1 {
        warn!(
            configs = hashes.len(),
            prefix = %locator.prefix_path().display(),
            "checkpoints come from different fit configurations"
        );
    }
    info!(
        present = present.len(),
        missing = missing.len(),
        "continuum cube assembled"
    );
    Ok(Assembly {
        cube,
        present,
        missing,
    })
}
