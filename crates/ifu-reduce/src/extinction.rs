use std::fmt;
use std::str::FromStr;

use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Empirical reddening laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReddeningCurve {
    /// Cardelli, Clayton & Mathis (1989).
    Ccm89,
    /// O'Donnell (1994): CCM89 with revised optical coefficients.
    Od94,
}

impl FromStr for ReddeningCurve {
    type Err = IfuError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "ccm89" => Ok(ReddeningCurve::Ccm89),
            "od94" => Ok(ReddeningCurve::Od94),
            _ => Err(IfuError::Config(
                ErrorInfo::new("curve-unsupported", "reddening curve not supported")
                    .with_context("curve", value)
                    .with_hint("supported curves: ccm89, od94"),
            )),
        }
    }
}

impl fmt::Display for ReddeningCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReddeningCurve::Ccm89 => f.write_str("ccm89"),
            ReddeningCurve::Od94 => f.write_str("od94"),
        }
    }
}

const CCM89_OPTICAL_A: [f64; 8] = [
    1.0, 0.17699, -0.50447, -0.02427, 0.72085, 0.01979, -0.77530, 0.32999,
];
const CCM89_OPTICAL_B: [f64; 8] = [
    0.0, 1.41338, 2.28305, 1.07233, -5.38434, -0.62251, 5.30260, -2.09002,
];
const OD94_OPTICAL_A: [f64; 9] = [
    1.0, 0.104, -0.609, 0.701, 1.137, -1.718, -0.827, 1.647, -0.505,
];
const OD94_OPTICAL_B: [f64; 9] = [
    0.0, 1.952, 2.908, -3.989, -7.985, 11.102, 5.491, -10.805, 3.347,
];

fn poly(coefficients: &[f64], y: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * y + c)
}

impl ReddeningCurve {
    /// `(a(x), b(x))` at inverse wavelength `x` (µm⁻¹); NaN outside 0.3–10 µm⁻¹.
    pub fn coefficients(self, x: f64) -> (f64, f64) {
        if (0.3..1.1).contains(&x) {
            let p = x.powf(1.61);
            (0.574 * p, -0.527 * p)
        } else if (1.1..3.3).contains(&x) {
            let y = x - 1.82;
            match self {
                ReddeningCurve::Ccm89 => (poly(&CCM89_OPTICAL_A, y), poly(&CCM89_OPTICAL_B, y)),
                ReddeningCurve::Od94 => (poly(&OD94_OPTICAL_A, y), poly(&OD94_OPTICAL_B, y)),
            }
        } else if (3.3..8.0).contains(&x) {
            let (fa, fb) = if x >= 5.9 {
                let d = x - 5.9;
                (
                    -0.04473 * d.powi(2) - 0.009779 * d.powi(3),
                    0.2130 * d.powi(2) + 0.1207 * d.powi(3),
                )
            } else {
                (0.0, 0.0)
            };
            (
                1.752 - 0.316 * x - 0.104 / ((x - 4.67).powi(2) + 0.341) + fa,
                -3.090 + 1.825 * x + 1.206 / ((x - 4.62).powi(2) + 0.263) + fb,
            )
        } else if (8.0..=10.0).contains(&x) {
            let d = x - 8.0;
            (
                -1.073 - 0.628 * d + 0.137 * d.powi(2) - 0.070 * d.powi(3),
                13.670 + 4.257 * d - 0.420 * d.powi(2) + 0.374 * d.powi(3),
            )
        } else {
            (f64::NAN, f64::NAN)
        }
    }
}

/// Galactic extinction inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extinction {
    /// Extinction in B (mag).
    pub ab: f64,
    /// Extinction in V (mag).
    pub av: f64,
    /// Reddening law.
    pub curve: ReddeningCurve,
    /// Total-to-selective extinction ratio.
    pub rv: f64,
}

impl Extinction {
    /// `A_λ` in magnitudes for wavelengths in Ångström.
    pub fn alam(&self, lams: &[f64]) -> Array1<f64> {
        let ebv = self.ab - self.av;
        lams.iter()
            .map(|lam| {
                let (a, b) = self.curve.coefficients(1.0e4 / lam);
                ebv * (a * self.rv + b)
            })
            .collect()
    }

    /// Multiplicative flux correction and its square for variance propagation.
    pub fn correction(&self, lams: &[f64]) -> Correction {
        let factor = self.alam(lams).mapv(|alam| 10f64.powf(0.4 * alam));
        let factor_sq = factor.mapv(|f| f * f);
        Correction { factor, factor_sq }
    }
}

/// Per-wavelength extinction correction.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// Applied to values.
    pub factor: Array1<f64>,
    /// Applied to variances.
    pub factor_sq: Array1<f64>,
}
