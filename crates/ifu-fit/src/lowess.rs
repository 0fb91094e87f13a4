use ifu_core::errors::{ErrorInfo, IfuError};
use serde::{Deserialize, Serialize};

/// LOWESS smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowessOpts {
    /// Fraction of the samples used in each local regression.
    pub frac: f64,
    /// Number of robustifying reweighting passes after the initial fit.
    pub iterations: usize,
}

impl Default for LowessOpts {
    fn default() -> Self {
        Self {
            frac: 0.05,
            iterations: 5,
        }
    }
}

impl LowessOpts {
    /// Rejects fractions outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), IfuError> {
        if self.frac > 0.0 && self.frac <= 1.0 {
            return Ok(());
        }
        Err(IfuError::Config(
            ErrorInfo::new("lowess-frac", "smoothing fraction must lie in (0, 1]")
                .with_context("frac", self.frac.to_string()),
        ))
    }
}

/// Smooths `y(x)` with locally weighted linear regression.
///
/// `x` must be sorted ascending and every sample finite. Returns the fitted value at
/// every `x`.
pub fn lowess(x: &[f64], y: &[f64], opts: &LowessOpts) -> Result<Vec<f64>, IfuError> {
    if x.len() != y.len() {
        return Err(IfuError::Fit(
            ErrorInfo::new("lowess-length", "abscissa and ordinate lengths differ")
                .with_context("x", x.len().to_string())
                .with_context("y", y.len().to_string()),
        ));
    }
    let n = x.len();
    if n < 2 {
        return Ok(y.to_vec());
    }
    let k = ((opts.frac * n as f64).ceil() as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for pass in 0..=opts.iterations {
        let mut left = 0usize;
        for i in 0..n {
            // Slide the k-point window so that it holds the nearest neighbours of x[i].
            while left + k < n && x[i] - x[left] > x[left + k] - x[i] {
                left += 1;
            }
            let right = left + k - 1;
            let radius = (x[i] - x[left]).max(x[right] - x[i]);
            fitted[i] = local_fit(x, y, &robustness, left, right, i, radius);
        }

        if pass == opts.iterations {
            break;
        }
        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        let scale = median(residuals.iter().map(|r| r.abs()).collect());
        if scale <= f64::EPSILON {
            break;
        }
        for (weight, residual) in robustness.iter_mut().zip(&residuals) {
            *weight = bisquare(residual / (6.0 * scale));
        }
    }
    Ok(fitted)
}

fn local_fit(
    x: &[f64],
    y: &[f64],
    robustness: &[f64],
    left: usize,
    right: usize,
    i: usize,
    radius: f64,
) -> f64 {
    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    let mut sum_wy = 0.0;
    let mut weights = Vec::with_capacity(right - left + 1);
    for j in left..=right {
        let distance = (x[j] - x[i]).abs();
        let kernel = if radius > 0.0 {
            tricube(distance / radius)
        } else {
            1.0
        };
        let w = kernel * robustness[j];
        weights.push(w);
        sum_w += w;
        sum_wx += w * x[j];
        sum_wy += w * y[j];
    }
    if sum_w <= 0.0 {
        return y[i];
    }
    let mean_x = sum_wx / sum_w;
    let mean_y = sum_wy / sum_w;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (offset, w) in weights.iter().enumerate() {
        let j = left + offset;
        let dx = x[j] - mean_x;
        sxx += w * dx * dx;
        sxy += w * dx * (y[j] - mean_y);
    }
    if sxx <= f64::EPSILON * sum_w {
        return mean_y;
    }
    mean_y + sxy / sxx * (x[i] - mean_x)
}

fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u * u;
        t * t * t
    }
}

fn bisquare(u: f64) -> f64 {
    if u.abs() >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u;
        t * t
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Fits a continuum to one spectrum, tolerating missing samples.
///
/// Non-finite samples are dropped before the fit and the fitted curve is linearly
/// interpolated back onto every wavelength (held constant past the ends). Fewer than
/// two finite samples yields an all-NaN spectrum.
pub fn smooth_spectrum(
    lams: &[f64],
    spectrum: &[f64],
    opts: &LowessOpts,
) -> Result<Vec<f64>, IfuError> {
    if lams.len() != spectrum.len() {
        return Err(IfuError::Fit(
            ErrorInfo::new("spectrum-length", "spectrum and wavelength axis differ in length")
                .with_context("lams", lams.len().to_string())
                .with_context("spectrum", spectrum.len().to_string()),
        ));
    }
    let mut samples: Vec<(f64, f64)> = lams
        .iter()
        .zip(spectrum)
        .filter(|(lam, value)| lam.is_finite() && value.is_finite())
        .map(|(lam, value)| (*lam, *value))
        .collect();
    if samples.len() < 2 {
        return Ok(vec![f64::NAN; lams.len()]);
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (x, y): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
    let fitted = lowess(&x, &y, opts)?;
    Ok(lams.iter().map(|lam| interpolate(&x, &fitted, *lam)).collect())
}

fn interpolate(x: &[f64], y: &[f64], at: f64) -> f64 {
    if !at.is_finite() {
        return f64::NAN;
    }
    let last = x.len() - 1;
    if at <= x[0] {
        return y[0];
    }
    if at >= x[last] {
        return y[last];
    }
    let upper = x.partition_point(|value| *value < at);
    let lower = upper - 1;
    let span = x[upper] - x[lower];
    if span <= 0.0 {
        return y[upper];
    }
    let t = (at - x[lower]) / span;
    y[lower] + t * (y[upper] - y[lower])
}
