use std::thread;

use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::{s, ArrayView2, ArrayView3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::checkpoint::{CheckpointLocator, RowCheckpoint};
use crate::worker::{run_job, ColumnJob, ContinuumFit};

/// Inclusive range of fit rows to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSpan {
    /// First row processed.
    pub start: usize,
    /// Last row processed (inclusive).
    pub end: usize,
}

impl RowSpan {
    /// Resolves optional bounds against the number of fit rows in the cube.
    ///
    /// Missing bounds default to `0` and `nrows - 1`.
    pub fn resolve(start: Option<usize>, end: Option<usize>, nrows: usize) -> Result<Self, IfuError> {
        if nrows == 0 {
            return Err(IfuError::Shape(ErrorInfo::new(
                "fit-empty-cube",
                "cube has no rows to fit",
            )));
        }
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(nrows - 1);
        if start > end || end >= nrows {
            return Err(IfuError::Config(
                ErrorInfo::new("fit-row-span", "row span outside the cube")
                    .with_context("start_row", start.to_string())
                    .with_context("end_row", end.to_string())
                    .with_context("rows", nrows.to_string())
                    .with_hint("start_row <= end_row < number of rows"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Number of rows in the span.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false: a resolved span holds at least one row.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Rows in increasing order.
    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Size of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workers {
    /// One worker per available processing unit.
    #[default]
    All,
    /// Explicit pool size; zero is treated as one.
    Count(usize),
}

impl Workers {
    /// Number of worker threads to spawn.
    pub fn threads(self) -> usize {
        match self {
            Workers::All => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Workers::Count(n) => n.max(1),
        }
    }
}

/// Inputs of one fitting call.
#[derive(Debug, Clone)]
pub struct FitRequest<'a> {
    /// Value cube indexed `(wavelength, y, x)`.
    pub data: ArrayView3<'a, f64>,
    /// Wavelength of every plane.
    pub lams: &'a [f64],
    /// Rows (x positions) to fit.
    pub span: RowSpan,
    /// Pool size.
    pub workers: Workers,
    /// Spaxels `(y, x)` zeroed before dispatch.
    pub excluded: Option<ArrayView2<'a, bool>>,
}

/// Outcome of a completed fitting call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    /// Rows fitted and checkpointed, in order.
    pub rows: Vec<usize>,
    /// Locator of the written checkpoints.
    pub locator: CheckpointLocator,
}

/// Fits every spectrum of every row in the span, checkpointing row by row.
///
/// Rows are processed in increasing order on one thread pool that lives for the
/// whole call. A row's checkpoint is written only after all of its columns have
/// been fitted; when `cancel` fires, in-flight work is drained and the call
/// returns [`IfuError::Interrupted`] naming the row that was not persisted.
pub fn fit_continuum<F: ContinuumFit + ?Sized>(
    request: &FitRequest<'_>,
    fitter: &F,
    locator: &CheckpointLocator,
    cancel: &CancelToken,
) -> Result<FitSummary, IfuError> {
    let (nlam, ny, nx) = request.data.dim();
    if request.lams.len() != nlam {
        return Err(IfuError::Shape(
            ErrorInfo::new("fit-axis", "wavelength axis differs from the cube depth")
                .with_context("lams", request.lams.len().to_string())
                .with_context("planes", nlam.to_string()),
        ));
    }
    if request.span.end >= nx {
        return Err(IfuError::Config(
            ErrorInfo::new("fit-row-span", "row span outside the cube")
                .with_context("end_row", request.span.end.to_string())
                .with_context("rows", nx.to_string()),
        ));
    }
    if let Some(mask) = &request.excluded {
        if mask.dim() != (ny, nx) {
            return Err(IfuError::Shape(
                ErrorInfo::new("fit-mask", "exclusion mask differs from the spatial shape")
                    .with_context("mask", format!("{:?}", mask.dim()))
                    .with_context("cube", format!("{:?}", (ny, nx))),
            ));
        }
    }

    let config_hash = fitter.config_hash()?;
    let threads = request.workers.threads();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| IfuError::Config(ErrorInfo::new("thread-pool", err.to_string())))?;
    info!(
        method = %fitter.method(),
        start = request.span.start,
        end = request.span.end,
        workers = threads,
        "starting continuum fit"
    );

    let mut rows = Vec::with_capacity(request.span.len());
    for row in request.span.rows() {
        if cancel.is_cancelled() {
            return Err(IfuError::interrupted(row));
        }
        let jobs = row_jobs(request, row);
        let fitted: Result<Vec<Vec<f64>>, IfuError> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    if cancel.is_cancelled() {
                        return Err(IfuError::interrupted(row));
                    }
                    run_job(fitter, request.lams, job)
                })
                .collect()
        });
        // The pool has drained by now; a cancel seen here still voids the row.
        if cancel.is_cancelled() {
            return Err(IfuError::interrupted(row));
        }
        let checkpoint = RowCheckpoint::new(row, config_hash.clone(), fitted?)?;
        let path = locator.path(row);
        checkpoint.store(&path)?;
        debug!(row, path = %path.display(), "checkpoint written");
        info!(row, columns = ny, done = rows.len() + 1, total = request.span.len(), "row fitted");
        rows.push(row);
    }
    Ok(FitSummary {
        rows,
        locator: locator.clone(),
    })
}

fn row_jobs(request: &FitRequest<'_>, row: usize) -> Vec<ColumnJob> {
    let (nlam, ny, _) = request.data.dim();
    (0..ny)
        .map(|column| {
            let zeroed = request
                .excluded
                .as_ref()
                .map(|mask| mask[[column, row]])
                .unwrap_or(false);
            let spectrum = if zeroed {
                vec![0.0; nlam]
            } else {
                request.data.slice(s![.., column, row]).to_vec()
            };
            ColumnJob {
                row,
                column,
                spectrum,
            }
        })
        .collect()
}
