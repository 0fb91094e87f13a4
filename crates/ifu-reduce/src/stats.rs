//! NaN-aware reductions over 1-D samples.

/// Median of the finite samples, NaN when there are none.
pub fn nanmedian(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        0.5 * (finite[mid - 1] + finite[mid])
    } else {
        finite[mid]
    }
}

/// Largest non-NaN sample, NaN when there are none.
pub fn nanmax(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
}

/// Population standard deviation of the non-NaN samples, NaN when there are none.
pub fn nanstd(values: impl IntoIterator<Item = f64>) -> f64 {
    let finite: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Sum of the non-NaN samples; zero when there are none.
pub fn nansum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// Median absolute deviation about the median of the non-NaN samples.
pub fn nanmad(values: &[f64]) -> f64 {
    let median = nanmedian(values.iter().copied());
    nanmedian(values.iter().map(|v| (v - median).abs()))
}
