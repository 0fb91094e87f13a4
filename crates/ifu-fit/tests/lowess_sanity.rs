use ifu_core::errors::IfuError;
use ifu_core::stable_hash_string;
use ifu_fit::{lowess, smooth_spectrum, ContinuumFit, LowessFit, LowessOpts};

#[test]
fn straight_line_is_reproduced() {
    let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
    let y: Vec<f64> = x.iter().map(|v| 3.0 + 0.5 * v).collect();
    let fitted = lowess(&x, &y, &LowessOpts { frac: 0.3, iterations: 2 }).expect("lowess");
    for (f, t) in fitted.iter().zip(&y) {
        assert!((f - t).abs() < 1e-9, "{f} vs {t}");
    }
}

#[test]
fn isolated_emission_line_is_rejected_by_robust_passes() {
    let x: Vec<f64> = (0..200).map(|i| 4800.0 + i as f64).collect();
    let mut y: Vec<f64> = (0..200).map(|i| 10.0 + 0.1 * (i as f64 * 1.7).sin()).collect();
    y[100] = 500.0;
    let fitted = lowess(&x, &y, &LowessOpts { frac: 0.1, iterations: 3 }).expect("lowess");
    assert!((fitted[100] - 10.0).abs() < 0.5, "{}", fitted[100]);
}

#[test]
fn missing_samples_are_interpolated_back() {
    let lams: Vec<f64> = (0..20).map(|i| 5000.0 + 1.25 * i as f64).collect();
    let mut spectrum: Vec<f64> = lams.iter().map(|l| 0.01 * l).collect();
    spectrum[4] = f64::NAN;
    spectrum[0] = f64::INFINITY;
    let fitted = smooth_spectrum(&lams, &spectrum, &LowessOpts::default()).expect("smooth");
    assert_eq!(fitted.len(), lams.len());
    assert!(fitted.iter().all(|v| v.is_finite()));
    assert!((fitted[4] - 0.01 * lams[4]).abs() < 1e-6);
}

#[test]
fn all_missing_spectrum_gives_nan() {
    let lams = vec![1.0, 2.0, 3.0];
    let fitted =
        smooth_spectrum(&lams, &[f64::NAN, 4.0, f64::NAN], &LowessOpts::default()).expect("smooth");
    assert!(fitted.iter().all(|v| v.is_nan()));
}

#[test]
fn invalid_fraction_is_a_config_error() {
    let err = LowessFit::new(LowessOpts { frac: 0.0, iterations: 1 }).expect_err("frac");
    assert!(matches!(err, IfuError::Config(_)));
    assert!(LowessFit::new(LowessOpts { frac: 1.5, iterations: 1 }).is_err());
}

#[test]
fn config_hash_tracks_options() {
    let a = LowessFit::new(LowessOpts::default()).expect("fit");
    let b = LowessFit::new(LowessOpts { frac: 0.2, iterations: 5 }).expect("fit");
    assert_eq!(a.config_hash().expect("hash"), a.config_hash().expect("hash"));
    assert_ne!(a.config_hash().expect("hash"), b.config_hash().expect("hash"));
}

#[test]
fn config_hash_uses_the_shared_canonical_encoding() {
    let fit = LowessFit::new(LowessOpts { frac: 0.25, iterations: 2 }).expect("fit");
    let expected = stable_hash_string(&(fit.method(), fit.opts())).expect("hash");
    assert_eq!(fit.config_hash().expect("hash"), expected);
}

#[test]
fn unknown_method_tag_is_rejected() {
    let err = "polyfit".parse::<ifu_fit::ContinuumMethod>().expect_err("method");
    assert_eq!(err.info().code, "method-unsupported");
}
