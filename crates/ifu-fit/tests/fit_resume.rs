use ifu_core::errors::IfuError;
use ifu_fit::{
    assemble, fit_continuum, CancelToken, CheckpointLocator, ColumnJob, ContinuumFit,
    ContinuumMethod, FitRequest, RowSpan, Workers,
};
use ndarray::Array3;
use tempfile::tempdir;

/// Echoes the input spectrum and cancels the run once it reaches `cancel_at`.
struct EchoFit {
    cancel: CancelToken,
    cancel_at: Option<usize>,
}

impl ContinuumFit for EchoFit {
    fn method(&self) -> ContinuumMethod {
        ContinuumMethod::Lowess
    }

    fn config_hash(&self) -> Result<String, IfuError> {
        Ok("echo".into())
    }

    fn fit(&self, _lams: &[f64], job: &ColumnJob) -> Result<Vec<f64>, IfuError> {
        if Some(job.row) == self.cancel_at {
            self.cancel.cancel();
        }
        Ok(job.spectrum.clone())
    }
}

fn sample_cube(nlam: usize, ny: usize, nx: usize) -> Array3<f64> {
    Array3::from_shape_fn((nlam, ny, nx), |(l, y, x)| (l + 10 * y + 100 * x) as f64)
}

#[test]
fn interrupted_fit_leaves_completed_rows_assemblable() {
    let dir = tempdir().expect("tmp dir");
    let cube = sample_cube(4, 3, 10);
    let lams: Vec<f64> = (0..4).map(|i| 5000.0 + i as f64).collect();
    let cancel = CancelToken::new();
    let fitter = EchoFit {
        cancel: cancel.clone(),
        cancel_at: Some(5),
    };
    let locator = CheckpointLocator::new(dir.path(), "06", "ngc", ContinuumMethod::Lowess);
    let request = FitRequest {
        data: cube.view(),
        lams: &lams,
        span: RowSpan::resolve(Some(0), Some(9), 10).expect("span"),
        workers: Workers::Count(2),
        excluded: None,
    };

    let err = fit_continuum(&request, &fitter, &locator, &cancel).expect_err("interrupted");
    assert!(matches!(err, IfuError::Interrupted(_)));
    assert_eq!(err.interrupted_row(), Some(5));
    assert!(err.to_string().contains("row 5 interrupted"));
    assert!(!locator.exists(5));

    let assembly = assemble(10, &locator, 3, 4).expect("assemble");
    assert_eq!(assembly.present, vec![0, 1, 2, 3, 4]);
    assert_eq!(assembly.missing, vec![5, 6, 7, 8, 9]);
    for x in 0..10 {
        for y in 0..3 {
            for l in 0..4 {
                let value = assembly.cube[[l, y, x]];
                if x < 5 {
                    assert_eq!(value, cube[[l, y, x]]);
                } else {
                    assert!(value.is_nan());
                }
            }
        }
    }
}

#[test]
fn explicit_start_row_resumes_after_interruption() {
    let dir = tempdir().expect("tmp dir");
    let cube = sample_cube(3, 2, 6);
    let lams = vec![1.0, 2.0, 3.0];
    let locator = CheckpointLocator::new(dir.path(), "06", "ngc", ContinuumMethod::Lowess);
    let cancel = CancelToken::new();
    let first = EchoFit {
        cancel: cancel.clone(),
        cancel_at: Some(3),
    };
    let mut request = FitRequest {
        data: cube.view(),
        lams: &lams,
        span: RowSpan::resolve(None, None, 6).expect("span"),
        workers: Workers::Count(1),
        excluded: None,
    };
    let err = fit_continuum(&request, &first, &locator, &cancel).expect_err("interrupted");
    let resume_row = err.interrupted_row().expect("row");

    let fresh = CancelToken::new();
    let second = EchoFit {
        cancel: fresh.clone(),
        cancel_at: None,
    };
    request.span = RowSpan::resolve(Some(resume_row), None, 6).expect("span");
    let summary = fit_continuum(&request, &second, &locator, &fresh).expect("resumed");
    assert_eq!(summary.rows, vec![3, 4, 5]);

    let assembly = assemble(6, &locator, 2, 3).expect("assemble");
    assert!(assembly.is_complete());
    assert_eq!(assembly.cube, cube);
}

#[test]
fn cancelled_token_stops_before_first_row() {
    let dir = tempdir().expect("tmp dir");
    let cube = sample_cube(2, 2, 2);
    let lams = vec![1.0, 2.0];
    let cancel = CancelToken::new();
    cancel.cancel();
    let fitter = EchoFit {
        cancel: cancel.clone(),
        cancel_at: None,
    };
    let locator = CheckpointLocator::new(dir.path(), "06", "ngc", ContinuumMethod::Lowess);
    let request = FitRequest {
        data: cube.view(),
        lams: &lams,
        span: RowSpan::resolve(Some(1), None, 2).expect("span"),
        workers: Workers::All,
        excluded: None,
    };
    let err = fit_continuum(&request, &fitter, &locator, &cancel).expect_err("interrupted");
    assert_eq!(err.interrupted_row(), Some(1));
    assert!(!locator.exists(0));
    assert!(!locator.exists(1));
}

#[test]
fn row_span_rejects_bounds_outside_cube() {
    assert_eq!(
        RowSpan::resolve(None, None, 4).expect("span"),
        RowSpan { start: 0, end: 3 }
    );
    assert!(matches!(
        RowSpan::resolve(Some(2), Some(4), 4),
        Err(IfuError::Config(_))
    ));
    assert!(matches!(
        RowSpan::resolve(Some(3), Some(2), 4),
        Err(IfuError::Config(_))
    ));
    assert!(matches!(RowSpan::resolve(None, None, 0), Err(IfuError::Shape(_))));
}

#[test]
fn excluded_spaxels_are_zeroed_in_place() {
    let dir = tempdir().expect("tmp dir");
    let cube = sample_cube(3, 3, 2);
    let lams = vec![1.0, 2.0, 3.0];
    let mut mask = ndarray::Array2::from_elem((3, 2), false);
    mask[[1, 0]] = true;
    let cancel = CancelToken::new();
    let fitter = EchoFit {
        cancel: cancel.clone(),
        cancel_at: None,
    };
    let locator = CheckpointLocator::new(dir.path(), "06", "ngc", ContinuumMethod::Lowess);
    let request = FitRequest {
        data: cube.view(),
        lams: &lams,
        span: RowSpan::resolve(None, None, 2).expect("span"),
        workers: Workers::Count(2),
        excluded: Some(mask.view()),
    };
    fit_continuum(&request, &fitter, &locator, &cancel).expect("fit");
    let assembly = assemble(2, &locator, 3, 3).expect("assemble");
    for l in 0..3 {
        assert_eq!(assembly.cube[[l, 1, 0]], 0.0);
        assert_eq!(assembly.cube[[l, 0, 0]], cube[[l, 0, 0]]);
        assert_eq!(assembly.cube[[l, 2, 0]], cube[[l, 2, 0]]);
        assert_eq!(assembly.cube[[l, 1, 1]], cube[[l, 1, 1]]);
    }
}
