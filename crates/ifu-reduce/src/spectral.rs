use std::fmt;
use std::str::FromStr;

use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::{Array2, ArrayView1, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::stats::{nanmax, nanmedian, nanstd, nansum};

/// Per-spaxel reduction applied across a wavelength range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// NaN-ignoring median.
    Median,
    /// NaN-ignoring maximum.
    Max,
    /// NaN-ignoring population standard deviation.
    Std,
}

impl Aggregate {
    fn apply(self, values: ArrayView1<'_, f64>) -> f64 {
        let values = values.iter().copied();
        match self {
            Aggregate::Median => nanmedian(values),
            Aggregate::Max => nanmax(values),
            Aggregate::Std => nanstd(values),
        }
    }
}

/// Inclusive wavelength interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveRange {
    /// Lower bound.
    pub lo: f64,
    /// Upper bound (inclusive).
    pub hi: f64,
}

impl WaveRange {
    /// Builds the interval, accepting bounds in either order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    /// Indices of the planes whose wavelength lies in the interval.
    pub fn planes(&self, lams: &[f64]) -> Vec<usize> {
        lams.iter()
            .enumerate()
            .filter(|(_, lam)| **lam >= self.lo && **lam <= self.hi)
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for WaveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}-{:.1}", self.lo, self.hi)
    }
}

/// Reduces the planes of `data` inside `range` to one map.
///
/// An interval holding no plane yields an all-NaN map.
pub fn reduce_range(
    data: ArrayView3<'_, f64>,
    lams: &[f64],
    range: WaveRange,
    aggregate: Aggregate,
) -> Result<Array2<f64>, IfuError> {
    check_axis(data, lams)?;
    let (_, ny, nx) = data.dim();
    let planes = range.planes(lams);
    if planes.is_empty() {
        return Ok(Array2::from_elem((ny, nx), f64::NAN));
    }
    let selected = data.select(Axis(0), &planes);
    Ok(selected.map_axis(Axis(0), |spectrum| aggregate.apply(spectrum)))
}

/// Signal estimate used by a signal-to-noise window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnrKind {
    /// Continuum window: signal is the median.
    #[serde(rename = "c")]
    Continuum,
    /// Emission line window: signal is the maximum.
    #[serde(rename = "e")]
    Emission,
}

impl SnrKind {
    /// One-letter tag used in parameter files and map headers.
    pub fn tag(self) -> &'static str {
        match self {
            SnrKind::Continuum => "c",
            SnrKind::Emission => "e",
        }
    }
}

impl FromStr for SnrKind {
    type Err = IfuError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "c" => Ok(SnrKind::Continuum),
            "e" => Ok(SnrKind::Emission),
            other => Err(IfuError::Config(
                ErrorInfo::new("snr-kind", "signal-to-noise type unknown")
                    .with_context("kind", other)
                    .with_hint("use \"c\" (continuum) or \"e\" (emission)"),
            )),
        }
    }
}

/// Crude signal-to-noise map over one window.
///
/// Noise is the standard deviation across the window. Negative ratios are set to
/// zero; spaxels without noise or without data are NaN.
pub fn snr_map(
    data: ArrayView3<'_, f64>,
    lams: &[f64],
    range: WaveRange,
    kind: SnrKind,
) -> Result<Array2<f64>, IfuError> {
    let signal = match kind {
        SnrKind::Continuum => reduce_range(data, lams, range, Aggregate::Median)?,
        SnrKind::Emission => reduce_range(data, lams, range, Aggregate::Max)?,
    };
    let noise = reduce_range(data, lams, range, Aggregate::Std)?;
    let mut snr = Array2::from_elem(signal.dim(), f64::NAN);
    ndarray::Zip::from(&mut snr)
        .and(&signal)
        .and(&noise)
        .for_each(|out, s, n| {
            if n.is_finite() && *n > 0.0 && s.is_finite() {
                *out = (s / n).max(0.0);
            }
        });
    Ok(snr)
}

/// 1 where a spaxel holds at least one non-NaN sample, NaN elsewhere.
pub fn coverage_map(data: ArrayView3<'_, f64>) -> Array2<f64> {
    data.map_axis(Axis(0), |spectrum| {
        if spectrum.iter().all(|v| v.is_nan()) {
            f64::NAN
        } else {
            1.0
        }
    })
}

/// NaN-ignoring sum over every plane.
pub fn white_light(data: ArrayView3<'_, f64>) -> Array2<f64> {
    data.map_axis(Axis(0), |spectrum| nansum(spectrum.iter().copied()))
}

/// Summed flux in `band` minus the summed flux in the optional continuum window.
pub fn band_image(
    data: ArrayView3<'_, f64>,
    lams: &[f64],
    band: WaveRange,
    continuum: Option<WaveRange>,
) -> Result<Array2<f64>, IfuError> {
    check_axis(data, lams)?;
    let sum_over = |range: WaveRange| {
        let planes = range.planes(lams);
        data.select(Axis(0), &planes)
            .map_axis(Axis(0), |spectrum| nansum(spectrum.iter().copied()))
    };
    let mut image = sum_over(band);
    if let Some(continuum) = continuum {
        image -= &sum_over(continuum);
    }
    Ok(image)
}

fn check_axis(data: ArrayView3<'_, f64>, lams: &[f64]) -> Result<(), IfuError> {
    if data.dim().0 == lams.len() {
        return Ok(());
    }
    Err(IfuError::Shape(
        ErrorInfo::new("axis-length", "wavelength axis differs from the cube depth")
            .with_context("lams", lams.len().to_string())
            .with_context("planes", data.dim().0.to_string()),
    ))
}
