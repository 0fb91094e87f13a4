mod common;

use ifu_core::errors::IfuError;
use ifu_fit::Workers;
use ifu_pipe::{Multiprocessing, Params, Recipe};
use ifu_reduce::{ReddeningCurve, SkyRegion, SnrKind};
use serde::Deserialize;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn relative_paths_resolve_against_the_parameter_file() {
    let dir = tempdir().expect("tmp dir");
    let params = common::load_fixture(dir.path(), "");
    assert_eq!(params.prod_loc, dir.path().join("prod"));
    assert_eq!(params.tmp_loc, dir.path().join("tmp"));
    assert_eq!(params.raw_cube_path(), dir.path().join("raw").join("ngc.cube"));
    assert_eq!(
        params.product_path("06", "lowess"),
        dir.path().join("prod").join("06_ngc_lowess.cube")
    );
}

#[test]
fn optional_fields_take_their_defaults() {
    let params = Params::from_yaml(
        b"target: t\ninst: MUSE\ndata_loc: /d\ndata_fn: c.cube\nprod_loc: /p\ntmp_loc: /t\n",
        Path::new("/base"),
    )
    .expect("params");
    assert_eq!(params.gal_curve, "ccm89");
    assert_eq!(params.gal_rv, 3.1);
    assert_eq!(params.lowess_frac, 0.05);
    assert_eq!(params.lowess_it, 5);
    assert_eq!(params.multiprocessing, Multiprocessing::Flag(true));
    assert_eq!(params.workers(), Workers::All);
    assert!(params.snr_ranges.is_empty() && params.sky_regions.is_empty());
    assert_eq!(params.data_loc, Path::new("/d"));
    assert!(matches!(params.catalog_path(), Err(IfuError::Config(_))));
}

#[test]
fn science_parameters_parse_from_their_list_forms() {
    let params = Params::from_yaml(
        b"target: t\ninst: MUSE\ndata_loc: d\ndata_fn: c.cube\nprod_loc: p\ntmp_loc: t\n\
          Ab: 0.2\nAv: 0.15\ngal_curve: OD94\n\
          snr_ranges: [[6000, 6500, c], [6560, 6570, e]]\n\
          sky_regions: [[10, 12, 3], [0, 0, 4, 4]]\n\
          multiprocessing: false\n",
        Path::new("/base"),
    )
    .expect("params");
    let extinction = params.extinction().expect("extinction");
    assert_eq!(extinction.curve, ReddeningCurve::Od94);
    assert_eq!((extinction.ab, extinction.av), (0.2, 0.15));
    assert_eq!(params.snr_ranges[1].kind, SnrKind::Emission);
    assert_eq!(params.snr_ranges[0].range.hi, 6500.0);
    assert_eq!(params.sky_regions[1], SkyRegion::Box { x: 0, y: 0, dx: 4, dy: 4 });
    assert_eq!(params.workers(), Workers::Count(1));
    assert_eq!(params.wcs_catalog, None);
}

#[test]
fn unknown_curve_and_instrument_are_config_errors() {
    let mut params = Params::from_yaml(
        b"target: t\ninst: KCWI\ndata_loc: d\ndata_fn: c\nprod_loc: p\ntmp_loc: t\ngal_curve: f99\n",
        Path::new("/base"),
    )
    .expect("params");
    assert!(matches!(params.extinction(), Err(IfuError::Config(_))));
    assert!(matches!(params.instrument(), Err(IfuError::Config(_))));
    params.inst = "MUSE".into();
    assert!(params.instrument().is_ok());
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SampleArgs {
    name_in: String,
    #[serde(default)]
    start_row: Option<usize>,
}

#[test]
fn recipe_keeps_order_and_hands_args_through() {
    let recipe = Recipe::from_yaml(
        b"- step: fit_continuum\n  run: true\n  suffix: '06'\n  args: {name_in: raw_cube, start_row: 12}\n\
          - name: make_continuum_cube\n  enabled: false\n  tag: '07'\n",
    )
    .expect("recipe");
    assert_eq!(recipe.steps.len(), 2);
    assert_eq!(recipe.steps[1].step, "make_continuum_cube");
    assert_eq!(recipe.steps.iter().filter(|step| step.run).count(), 1);

    let args: SampleArgs = recipe.steps[0].args().expect("args");
    assert_eq!(args.name_in, "raw_cube");
    assert_eq!(args.start_row, Some(12));
    assert_eq!(
        recipe.recipe_hash().expect("hash"),
        ifu_core::stable_hash_string(&recipe).expect("hash")
    );
}

#[test]
fn unexpected_argument_keys_are_rejected() {
    let recipe = Recipe::from_yaml(
        b"- {step: fit_continuum, run: true, suffix: '06', args: {name_in: a, strat_row: 3}}\n",
    )
    .expect("recipe");
    let err = recipe.steps[0].args::<SampleArgs>().expect_err("unknown key");
    assert_eq!(err.info().code, "step-args");
    assert_eq!(err.info().context.get("suffix").map(String::as_str), Some("06"));
}

#[test]
fn descriptor_without_required_fields_is_rejected() {
    assert!(Recipe::from_yaml(b"- {step: sky_sub, suffix: '03'}\n").is_err());
    assert!(Recipe::from_yaml(b"- {step: sky_sub, run: true, suffix: '03', extra: 1}\n").is_err());
}

#[test]
fn bundled_demo_configuration_is_valid() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
    let recipe = ifu_pipe::load_recipe(demos.join("recipe.yaml")).expect("recipe");
    let table = ifu_pipe::StepTable::standard();
    for step in &recipe.steps {
        table.resolve(&step.step).expect("known step");
    }
    let params = ifu_pipe::load_params(demos.join("params.yaml")).expect("params");
    assert_eq!(params.workers(), Workers::All);
    assert!(params.extinction().is_ok());
    assert_eq!(params.catalog_path().expect("catalog"), demos.join("gaia.yaml"));
}
