#![deny(missing_docs)]

//! Resumable row-chunked parallel continuum fitting for IFU datacubes.

/// Reassembly of row checkpoints into a continuum cube.
pub mod assemble;
/// Cooperative cancellation shared with the worker pool.
pub mod cancel;
/// Versioned row checkpoint records and their file naming.
pub mod checkpoint;
/// Row-by-row parallel fitting driver.
pub mod fitter;
/// LOWESS smoothing kernel.
pub mod lowess;
/// Per-spectrum fit contract and failure isolation.
pub mod worker;

pub use assemble::{assemble, Assembly};
pub use cancel::CancelToken;
pub use checkpoint::{CheckpointLocator, RowCheckpoint, CHECKPOINT_VERSION};
pub use fitter::{fit_continuum, FitRequest, FitSummary, RowSpan, Workers};
pub use lowess::{lowess, smooth_spectrum, LowessOpts};
pub use worker::{run_job, ColumnJob, ContinuumFit, ContinuumMethod, LowessFit};
