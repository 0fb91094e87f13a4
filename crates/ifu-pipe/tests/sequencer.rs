mod common;

use std::sync::{Arc, Mutex};

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_fit::CancelToken;
use ifu_pipe::{
    run, ArtifactRegistry, RegistryStore, Step, StepContext, StepDescriptor, StepTable,
    RAW_CUBE_KEY,
};
use tempfile::tempdir;

/// Records `name:suffix` and registers an artifact named after the suffix.
struct Recording {
    name: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
    cancels: bool,
}

impl Step for Recording {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        self.calls
            .lock()
            .expect("lock")
            .push(format!("{}:{}", descriptor.step, ctx.tag));
        if self.cancels {
            ctx.cancel.cancel();
        }
        if self.fail {
            return Err(IfuError::Fit(ErrorInfo::new("boom", "step failed")));
        }
        registry.put(format!("out_{}", ctx.tag), ctx.params.product_path(ctx.tag, "out"));
        Ok(registry)
    }
}

fn table(calls: &Arc<Mutex<Vec<String>>>) -> StepTable {
    let mut table = StepTable::new();
    for (name, fail, cancels) in [
        ("first", false, false),
        ("second", false, false),
        ("broken", true, false),
        ("stopper", false, true),
    ] {
        table.register(Box::new(Recording {
            name,
            calls: Arc::clone(calls),
            fail,
            cancels,
        }));
    }
    table
}

#[test]
fn enabled_steps_run_in_recipe_order_and_disabled_ones_are_skipped() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe(
        "- {step: second, run: true, suffix: '01'}\n\
         - {step: first, run: false, suffix: '02'}\n\
         - {step: first, run: true, suffix: '03'}\n",
    );

    let summary = run(&recipe, &params, &table(&calls), &CancelToken::new()).expect("run");
    assert_eq!(*calls.lock().expect("lock"), vec!["second:01", "first:03"]);
    assert_eq!(summary.executed, vec!["second:01", "first:03"]);
    assert_eq!(summary.skipped, vec!["first:02"]);

    let saved = RegistryStore::for_target(&params.prod_loc, "ngc").load().expect("registry");
    assert_eq!(saved, summary.registry);
    assert!(saved.contains(RAW_CUBE_KEY));
    assert!(saved.contains("out_01") && saved.contains("out_03"));
    assert!(!saved.contains("out_02"));
}

#[test]
fn unknown_step_fails_before_anything_runs_even_when_disabled() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe(
        "- {step: first, run: true, suffix: '01'}\n\
         - {step: frist, run: false, suffix: '02'}\n",
    );

    let err = run(&recipe, &params, &table(&calls), &CancelToken::new()).expect_err("unknown");
    assert!(matches!(err, IfuError::UnknownStep(_)));
    assert_eq!(err.info().code, "step-unknown");
    assert!(err.info().hint.as_deref().unwrap_or_default().contains("first"));
    assert!(calls.lock().expect("lock").is_empty());
    assert!(!RegistryStore::for_target(&params.prod_loc, "ngc").exists());
}

#[test]
fn failing_step_keeps_the_registry_of_the_last_successful_step() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe(
        "- {step: first, run: true, suffix: '01'}\n\
         - {step: broken, run: true, suffix: '02'}\n\
         - {step: second, run: true, suffix: '03'}\n",
    );

    let err = run(&recipe, &params, &table(&calls), &CancelToken::new()).expect_err("broken");
    assert_eq!(err.info().code, "boom");
    assert_eq!(*calls.lock().expect("lock"), vec!["first:01", "broken:02"]);
    let saved = RegistryStore::for_target(&params.prod_loc, "ngc").load().expect("registry");
    assert!(saved.contains("out_01"));
    assert!(!saved.contains("out_03"));
}

#[test]
fn cancelled_token_runs_no_step() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe(
        "- {step: first, run: true, suffix: '01'}\n\
         - {step: second, run: true, suffix: '02'}\n",
    );
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = run(&recipe, &params, &table(&calls), &cancel).expect_err("interrupted");
    assert!(matches!(err, IfuError::Interrupted(_)));
    assert_eq!(err.interrupted_step_name(), Some("first:01"));
    assert_eq!(err.interrupted_row(), None);
    assert!(calls.lock().expect("lock").is_empty());
}

#[test]
fn cancellation_during_a_step_stops_before_the_next_one() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe(
        "- {step: first, run: true, suffix: '01'}\n\
         - {step: stopper, run: true, suffix: '02'}\n\
         - {step: second, run: true, suffix: '03'}\n",
    );

    let err = run(&recipe, &params, &table(&calls), &CancelToken::new()).expect_err("interrupted");
    assert_eq!(err.info().code, "run-interrupted");
    assert_eq!(err.interrupted_step_name(), Some("second:03"));
    assert_eq!(*calls.lock().expect("lock"), vec!["first:01", "stopper:02"]);
    let saved = RegistryStore::for_target(&params.prod_loc, "ngc").load().expect("registry");
    assert!(saved.contains("out_02"));
    assert!(!saved.contains("out_03"));
}

#[test]
fn missing_raw_cube_is_reported_on_a_fresh_run() {
    let dir = tempdir().expect("tmp dir");
    let mut params = common::load_fixture(dir.path(), "");
    params.data_fn = "absent.cube".into();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recipe = common::recipe("- {step: first, run: true, suffix: '01'}\n");

    let err = run(&recipe, &params, &table(&calls), &CancelToken::new()).expect_err("missing");
    assert!(matches!(err, IfuError::MissingInputFile(_)));
    assert!(calls.lock().expect("lock").is_empty());
}

#[test]
fn later_runs_start_from_the_persisted_registry() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let steps = table(&calls);

    run(
        &common::recipe("- {step: first, run: true, suffix: '01'}\n"),
        &params,
        &steps,
        &CancelToken::new(),
    )
    .expect("first run");
    let summary = run(
        &common::recipe("- {step: second, run: true, suffix: '02'}\n"),
        &params,
        &steps,
        &CancelToken::new(),
    )
    .expect("second run");
    assert!(summary.registry.contains("out_01"));
    assert!(summary.registry.contains("out_02"));
}

#[test]
fn standard_table_knows_every_builtin_step() {
    let names: Vec<&str> = StepTable::standard().names().collect();
    assert_eq!(
        names,
        vec![
            "adjust_WCS",
            "crude_snr_maps",
            "fit_continuum",
            "gal_dered",
            "make_continuum_cube",
            "plot_BW",
            "plot_RGB",
            "sky_sub",
            "subtract_continuum",
        ]
    );
}
