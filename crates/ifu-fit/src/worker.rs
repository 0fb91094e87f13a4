use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_core::hash::stable_hash_string;
use serde::{Deserialize, Serialize};

use crate::lowess::{smooth_spectrum, LowessOpts};

/// Continuum estimation methods known to the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuumMethod {
    /// Locally weighted scatterplot smoothing.
    Lowess,
}

impl ContinuumMethod {
    /// Tag used in checkpoint and artifact names.
    pub fn tag(self) -> &'static str {
        match self {
            ContinuumMethod::Lowess => "lowess",
        }
    }
}

impl FromStr for ContinuumMethod {
    type Err = IfuError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lowess" => Ok(ContinuumMethod::Lowess),
            other => Err(IfuError::Config(
                ErrorInfo::new("method-unsupported", "continuum fitting method not supported")
                    .with_context("method", other)
                    .with_hint("supported methods: lowess"),
            )),
        }
    }
}

impl fmt::Display for ContinuumMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One spectrum to fit, identified by its position in the cube.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnJob {
    /// Fit row (x index) the spectrum belongs to.
    pub row: usize,
    /// Position of the spectrum within its row (y index).
    pub column: usize,
    /// Values along the wavelength axis.
    pub spectrum: Vec<f64>,
}

/// Numeric routine applied by each worker to a single spectrum.
///
/// Implementations must be free of shared mutable state: the same instance is
/// called concurrently from every worker thread.
pub trait ContinuumFit: Sync {
    /// Method tag written into checkpoint names.
    fn method(&self) -> ContinuumMethod;

    /// Stable hash of the fit configuration, stamped into every checkpoint.
    fn config_hash(&self) -> Result<String, IfuError>;

    /// Returns the fitted continuum, one value per wavelength.
    fn fit(&self, lams: &[f64], job: &ColumnJob) -> Result<Vec<f64>, IfuError>;
}

/// LOWESS continuum fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LowessFit {
    opts: LowessOpts,
}

impl LowessFit {
    /// Builds the fitter, validating the smoothing fraction.
    pub fn new(opts: LowessOpts) -> Result<Self, IfuError> {
        opts.validate()?;
        Ok(Self { opts })
    }

    /// Smoothing parameters in use.
    pub fn opts(&self) -> &LowessOpts {
        &self.opts
    }
}

impl ContinuumFit for LowessFit {
    fn method(&self) -> ContinuumMethod {
        ContinuumMethod::Lowess
    }

    fn config_hash(&self) -> Result<String, IfuError> {
        stable_hash_string(&(self.method(), &self.opts))
    }

    fn fit(&self, lams: &[f64], job: &ColumnJob) -> Result<Vec<f64>, IfuError> {
        smooth_spectrum(lams, &job.spectrum, &self.opts)
    }
}

/// Runs one job, turning errors and panics into a [`IfuError::Fit`] naming the spaxel.
pub fn run_job<F: ContinuumFit + ?Sized>(
    fitter: &F,
    lams: &[f64],
    job: &ColumnJob,
) -> Result<Vec<f64>, IfuError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| fitter.fit(lams, job)));
    let fitted = match outcome {
        Ok(Ok(fitted)) => fitted,
        Ok(Err(IfuError::Interrupted(info))) => return Err(IfuError::Interrupted(info)),
        Ok(Err(err)) => return Err(IfuError::Fit(locate(err.info().clone(), job))),
        Err(_) => {
            return Err(IfuError::Fit(locate(
                ErrorInfo::new("worker-panic", "continuum fit panicked"),
                job,
            )))
        }
    };
    if fitted.len() != lams.len() {
        return Err(IfuError::Fit(locate(
            ErrorInfo::new("fit-length", "fitted spectrum length differs from the axis")
                .with_context("expected", lams.len().to_string())
                .with_context("actual", fitted.len().to_string()),
            job,
        )));
    }
    Ok(fitted)
}

fn locate(info: ErrorInfo, job: &ColumnJob) -> ErrorInfo {
    info.with_context("row", job.row.to_string())
        .with_context("column", job.column.to_string())
}
