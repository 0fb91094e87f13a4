#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ifu_io::{Datacube, Header, WavelengthAxis};
use ifu_pipe::{Params, Recipe};
use ndarray::Array3;

pub const NLAM: usize = 40;
pub const NY: usize = 3;
pub const NX: usize = 4;

/// Linear spectra with a spatial offset: `2 + 0.01 l + y + 0.5 x`.
pub fn sample_data() -> Array3<f64> {
    Array3::from_shape_fn((NLAM, NY, NX), |(l, y, x)| {
        2.0 + 0.01 * l as f64 + y as f64 + 0.5 * x as f64
    })
}

pub fn sample_cube() -> Datacube {
    let mut primary = Header::new();
    primary.set("OBJECT", "NGC0000");
    primary.set("DATE-OBS", "2019-07-02T03:04:05.000");
    let mut data_header = Header::new();
    for (key, value) in [
        ("CRPIX1", 2.0),
        ("CRPIX2", 2.0),
        ("CRVAL1", 150.0),
        ("CRVAL2", 2.0),
        ("CD1_1", -5.5e-5),
        ("CD2_2", 5.5e-5),
    ] {
        data_header.set(key, value);
    }
    let axis = WavelengthAxis {
        crpix: 1.0,
        crval: 5000.0,
        cdelt: 1.25,
    };
    let data = sample_data();
    let variance = Array3::from_elem(data.dim(), 0.25);
    Datacube::from_parts(axis, data, variance, primary, data_header).expect("cube")
}

/// Writes the raw cube and a parameter file under `root`; extra YAML lines are appended.
pub fn write_fixture(root: &Path, extra: &str) -> PathBuf {
    write_raw_cube(root, &sample_cube());
    write_params(root, extra)
}

pub fn write_raw_cube(root: &Path, cube: &Datacube) {
    let raw_dir = root.join("raw");
    fs::create_dir_all(&raw_dir).expect("raw dir");
    cube.to_container()
        .write(&raw_dir.join("ngc.cube"))
        .expect("write raw cube");
}

pub fn write_params(root: &Path, extra: &str) -> PathBuf {
    let params = format!(
        "target: ngc\n\
         inst: MUSE\n\
         data_loc: raw\n\
         data_fn: ngc.cube\n\
         prod_loc: prod\n\
         tmp_loc: tmp\n\
         lowess_frac: 0.3\n\
         lowess_it: 0\n\
         multiprocessing: 2\n\
         {extra}"
    );
    let path = root.join("params.yaml");
    fs::write(&path, params).expect("write params");
    path
}

pub fn load_fixture(root: &Path, extra: &str) -> Params {
    ifu_pipe::load_params(write_fixture(root, extra)).expect("params")
}

pub fn recipe(yaml: &str) -> Recipe {
    Recipe::from_yaml(yaml.as_bytes()).expect("recipe")
}
