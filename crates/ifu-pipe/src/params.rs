use std::fs;
use std::path::{Path, PathBuf};

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_fit::{LowessOpts, Workers};
use ifu_io::Instrument;
use ifu_reduce::{Extinction, OffsetOpts, SkyRegion, SnrKind, WaveRange};
use serde::{Deserialize, Serialize};

use crate::serde::from_yaml_slice;

/// Worker pool request: `true` for every core, `false` for one, or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Multiprocessing {
    /// All cores (`true`) or a single worker (`false`).
    Flag(bool),
    /// Explicit pool size.
    Count(usize),
}

impl Default for Multiprocessing {
    fn default() -> Self {
        Multiprocessing::Flag(true)
    }
}

impl From<Multiprocessing> for Workers {
    fn from(value: Multiprocessing) -> Self {
        match value {
            Multiprocessing::Flag(true) => Workers::All,
            Multiprocessing::Flag(false) => Workers::Count(1),
            Multiprocessing::Count(n) => Workers::Count(n),
        }
    }
}

/// Signal-to-noise window, written `[lo, hi, "c" | "e"]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, SnrKind)", into = "(f64, f64, SnrKind)")]
pub struct SnrRange {
    /// Wavelength interval.
    pub range: WaveRange,
    /// Signal estimate.
    pub kind: SnrKind,
}

impl From<(f64, f64, SnrKind)> for SnrRange {
    fn from((lo, hi, kind): (f64, f64, SnrKind)) -> Self {
        Self {
            range: WaveRange::new(lo, hi),
            kind,
        }
    }
}

impl From<SnrRange> for (f64, f64, SnrKind) {
    fn from(value: SnrRange) -> Self {
        (value.range.lo, value.range.hi, value.kind)
    }
}

fn default_gal_curve() -> String {
    "ccm89".into()
}

fn default_gal_rv() -> f64 {
    3.1
}

fn default_lowess_frac() -> f64 {
    LowessOpts::default().frac
}

fn default_lowess_it() -> usize {
    LowessOpts::default().iterations
}

fn default_match_radius() -> f64 {
    OffsetOpts::default().match_radius
}

fn default_detect_sigma() -> f64 {
    OffsetOpts::default().detect_sigma
}

/// Scientific and operational parameters of one reduction.
///
/// Constructed once per run and handed by reference to every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Target identifier, used in every product name.
    pub target: String,
    /// Instrument tag, e.g. `MUSE`.
    pub inst: String,
    /// Directory of the raw cube.
    pub data_loc: PathBuf,
    /// File name of the raw cube.
    pub data_fn: String,
    /// Directory receiving products and the artifact registry.
    pub prod_loc: PathBuf,
    /// Directory receiving row checkpoints.
    pub tmp_loc: PathBuf,
    /// Redshift of the target.
    #[serde(default)]
    pub z_target: f64,
    /// Galactic extinction in B (mag).
    #[serde(default, alias = "Ab")]
    pub ab: f64,
    /// Galactic extinction in V (mag).
    #[serde(default, alias = "Av")]
    pub av: f64,
    /// Reddening law name.
    #[serde(default = "default_gal_curve")]
    pub gal_curve: String,
    /// Total-to-selective extinction ratio.
    #[serde(default = "default_gal_rv")]
    pub gal_rv: f64,
    /// Windows of the crude signal-to-noise maps.
    #[serde(default)]
    pub snr_ranges: Vec<SnrRange>,
    /// Sky apertures.
    #[serde(default)]
    pub sky_regions: Vec<SkyRegion>,
    /// LOWESS smoothing fraction.
    #[serde(default = "default_lowess_frac")]
    pub lowess_frac: f64,
    /// LOWESS robustness iterations.
    #[serde(default = "default_lowess_it")]
    pub lowess_it: usize,
    /// Spaxels with a continuum S/N below this are zeroed before fitting.
    #[serde(default)]
    pub lowess_snr_min: Option<f64>,
    /// Spaxels with a continuum S/N at or above this are zeroed before fitting.
    #[serde(default)]
    pub lowess_snr_max: Option<f64>,
    /// Worker pool size.
    #[serde(default)]
    pub multiprocessing: Multiprocessing,
    /// Point catalog used by the WCS adjustment.
    #[serde(default)]
    pub wcs_catalog: Option<PathBuf>,
    /// Catalog matching radius in pixels.
    #[serde(default = "default_match_radius")]
    pub wcs_match_radius: f64,
    /// Source detection threshold in robust sigmas.
    #[serde(default = "default_detect_sigma")]
    pub wcs_detect_sigma: f64,
    /// Progress logging at `info` rather than `warn`.
    #[serde(default)]
    pub verbose: bool,
    /// Directory of the parameter file (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Params {
    /// Parses parameters from YAML, resolving relative paths against `base_dir`.
    pub fn from_yaml(bytes: &[u8], base_dir: &Path) -> Result<Self, IfuError> {
        let mut params: Params = from_yaml_slice(bytes)?;
        params.base_dir = base_dir.to_path_buf();
        params.data_loc = params.resolve(&params.data_loc);
        params.prod_loc = params.resolve(&params.prod_loc);
        params.tmp_loc = params.resolve(&params.tmp_loc);
        params.wcs_catalog = params.wcs_catalog.as_deref().map(|p| params.resolve(p));
        Ok(params)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Location of the raw input cube.
    pub fn raw_cube_path(&self) -> PathBuf {
        self.data_loc.join(&self.data_fn)
    }

    /// Product file `{tag}_{target}_{product}.cube` under `prod_loc`.
    pub fn product_path(&self, tag: &str, product: &str) -> PathBuf {
        self.prod_loc
            .join(format!("{tag}_{}_{product}.cube", self.target))
    }

    /// Parsed instrument tag.
    pub fn instrument(&self) -> Result<Instrument, IfuError> {
        self.inst.parse()
    }

    /// Smoothing parameters of the LOWESS continuum fit.
    pub fn lowess_opts(&self) -> LowessOpts {
        LowessOpts {
            frac: self.lowess_frac,
            iterations: self.lowess_it,
        }
    }

    /// Worker pool size of the continuum fit.
    pub fn workers(&self) -> Workers {
        self.multiprocessing.into()
    }

    /// Galactic extinction settings.
    pub fn extinction(&self) -> Result<Extinction, IfuError> {
        Ok(Extinction {
            ab: self.ab,
            av: self.av,
            curve: self.gal_curve.parse()?,
            rv: self.gal_rv,
        })
    }

    /// Catalog matching settings.
    pub fn offset_opts(&self) -> OffsetOpts {
        OffsetOpts {
            match_radius: self.wcs_match_radius,
            detect_sigma: self.wcs_detect_sigma,
        }
    }

    /// Point catalog path, required by the WCS adjustment.
    pub fn catalog_path(&self) -> Result<&Path, IfuError> {
        self.wcs_catalog.as_deref().ok_or_else(|| {
            IfuError::Config(
                ErrorInfo::new("wcs-catalog", "no point catalog configured")
                    .with_hint("set wcs_catalog in the parameter file"),
            )
        })
    }
}

/// Loads the parameter file.
pub fn load_params<P: AsRef<Path>>(path: P) -> Result<Params, IfuError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| {
        IfuError::Config(
            ErrorInfo::new("params-read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Params::from_yaml(&bytes, base_dir)
}
