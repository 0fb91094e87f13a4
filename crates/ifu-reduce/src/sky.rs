use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::nanmedian;

/// Spaxel aperture flagged as sky, in 0-based pixel coordinates.
///
/// Written in parameter files as `[x, y, r]` (circle) or `[x, y, dx, dy]` (box
/// covering `x..=x+dx`, `y..=y+dy`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub enum SkyRegion {
    /// Every spaxel within `r` of `(x, y)`.
    Circle {
        /// Centre column.
        x: f64,
        /// Centre row.
        y: f64,
        /// Radius in spaxels.
        r: f64,
    },
    /// Rectangle anchored at its lower-left spaxel.
    Box {
        /// First column.
        x: usize,
        /// First row.
        y: usize,
        /// Extra columns.
        dx: usize,
        /// Extra rows.
        dy: usize,
    },
}

impl TryFrom<Vec<f64>> for SkyRegion {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, r] => Ok(SkyRegion::Circle {
                x: *x,
                y: *y,
                r: *r,
            }),
            [x, y, dx, dy] => {
                let index = |v: f64| {
                    if v >= 0.0 && v.fract() == 0.0 {
                        Ok(v as usize)
                    } else {
                        Err(format!("box sky region needs non-negative integers, got {v}"))
                    }
                };
                Ok(SkyRegion::Box {
                    x: index(*x)?,
                    y: index(*y)?,
                    dx: index(*dx)?,
                    dy: index(*dy)?,
                })
            }
            other => Err(format!(
                "sky region needs 3 (circle) or 4 (box) values, got {}",
                other.len()
            )),
        }
    }
}

impl From<SkyRegion> for Vec<f64> {
    fn from(region: SkyRegion) -> Self {
        match region {
            SkyRegion::Circle { x, y, r } => vec![x, y, r],
            SkyRegion::Box { x, y, dx, dy } => vec![x as f64, y as f64, dx as f64, dy as f64],
        }
    }
}

/// Marks the sky spaxels of an `(ny, nx)` field.
pub fn sky_mask(regions: &[SkyRegion], ny: usize, nx: usize) -> Array2<bool> {
    let mut mask = Array2::from_elem((ny, nx), false);
    for region in regions {
        match *region {
            SkyRegion::Circle { x, y, r } => {
                for ((row, col), flag) in mask.indexed_iter_mut() {
                    let d = ((col as f64 - x).powi(2) + (row as f64 - y).powi(2)).sqrt();
                    if d <= r {
                        *flag = true;
                    }
                }
            }
            SkyRegion::Box { x, y, dx, dy } => {
                // Bounds saturate so oversized boxes clip to the field.
                let row_end = y.saturating_add(dy).saturating_add(1).min(ny);
                let col_end = x.saturating_add(dx).saturating_add(1).min(nx);
                for row in y..row_end {
                    for col in x..col_end {
                        mask[[row, col]] = true;
                    }
                }
            }
        }
    }
    mask
}

/// Median spectrum of the masked spaxels.
pub fn sky_spectrum(data: ArrayView3<'_, f64>, mask: &Array2<bool>) -> Result<Array1<f64>, IfuError> {
    let (_, ny, nx) = data.dim();
    if mask.dim() != (ny, nx) {
        return Err(IfuError::Shape(
            ErrorInfo::new("sky-mask", "sky mask differs from the spatial shape")
                .with_context("mask", format!("{:?}", mask.dim()))
                .with_context("cube", format!("{:?}", (ny, nx))),
        ));
    }
    let spaxels: Vec<(usize, usize)> = mask
        .indexed_iter()
        .filter(|(_, flag)| **flag)
        .map(|(idx, _)| idx)
        .collect();
    if spaxels.is_empty() {
        return Err(IfuError::Config(
            ErrorInfo::new("sky-empty", "sky regions cover no spaxel")
                .with_hint("check sky_regions against the cube footprint"),
        ));
    }
    debug!(spaxels = spaxels.len(), "assembling sky spectrum");
    Ok(data
        .axis_iter(Axis(0))
        .map(|plane| nanmedian(spaxels.iter().map(|idx| plane[*idx])))
        .collect())
}

/// Subtracts `sky` from every spaxel.
pub fn subtract_sky(data: ArrayView3<'_, f64>, sky: &Array1<f64>) -> Result<Array3<f64>, IfuError> {
    if sky.len() != data.dim().0 {
        return Err(IfuError::Shape(
            ErrorInfo::new("sky-length", "sky spectrum differs from the cube depth")
                .with_context("sky", sky.len().to_string())
                .with_context("planes", data.dim().0.to_string()),
        ));
    }
    let mut out = data.to_owned();
    for (mut plane, value) in out.axis_iter_mut(Axis(0)).zip(sky.iter()) {
        plane -= *value;
    }
    Ok(out)
}
