//! Continuum estimation: resumable row fitting, reassembly and subtraction.

use std::fs;

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_fit::{
    assemble, fit_continuum, CheckpointLocator, ContinuumMethod, FitRequest, LowessFit, RowSpan,
};
use ifu_io::Container;
use ndarray::{Array2, Array3};
use serde::Deserialize;
use tracing::{info, warn};

use super::snr::KIND_KEY;
use super::{read_cube, write_product, Step, StepContext};
use crate::params::Params;
use crate::recipe::StepDescriptor;
use crate::registry::{ArtifactRegistry, RAW_CUBE_KEY};

const SNR_MAPS_KEY: &str = "snr_maps";

fn default_method() -> String {
    ContinuumMethod::Lowess.tag().to_string()
}

fn checkpoints_key(method: ContinuumMethod) -> String {
    format!("{}_checkpoints", method.tag())
}

fn cube_key(method: ContinuumMethod) -> String {
    format!("{}_cube", method.tag())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FitArgs {
    name_in: String,
    #[serde(default)]
    start_row: Option<usize>,
    #[serde(default)]
    end_row: Option<usize>,
    #[serde(default = "default_method")]
    method: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MethodArgs {
    #[serde(default = "default_method")]
    method: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubtractArgs {
    name_in: String,
    name_out: String,
    #[serde(default = "default_method")]
    method: String,
}

/// Fits the continuum of every spectrum, one checkpoint per row.
///
/// `start_row` lets an interrupted run resume where it stopped. Registers the
/// checkpoint prefix as `<method>_checkpoints`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitContinuum;

impl Step for FitContinuum {
    fn name(&self) -> &'static str {
        "fit_continuum"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: FitArgs = descriptor.args()?;
        let method: ContinuumMethod = args.method.parse()?;
        let fitter = match method {
            ContinuumMethod::Lowess => LowessFit::new(ctx.params.lowess_opts())?,
        };
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let (_, _, nx) = cube.shape();
        let span = RowSpan::resolve(args.start_row, args.end_row, nx)?;
        let excluded = exclusion_mask(&registry, ctx.params)?;

        let tmp_loc = &ctx.params.tmp_loc;
        fs::create_dir_all(tmp_loc).map_err(|err| IfuError::io("tmp-dir", tmp_loc, err))?;
        let locator = CheckpointLocator::new(tmp_loc, ctx.tag, &ctx.params.target, method);
        let lams = cube.lams.to_vec();
        let request = FitRequest {
            data: cube.data.view(),
            lams: &lams,
            span,
            workers: ctx.params.workers(),
            excluded: excluded.as_ref().map(|mask| mask.view()),
        };
        let summary = fit_continuum(&request, &fitter, &locator, ctx.cancel)?;
        info!(rows = summary.rows.len(), method = %method, "continuum fit complete");

        registry.put(checkpoints_key(method), summary.locator.prefix_path());
        Ok(registry)
    }
}

/// Spaxels whose continuum S/N falls outside `[lowess_snr_min, lowess_snr_max)`.
///
/// Uses the first continuum map of `snr_maps`; without bounds or maps nothing is
/// excluded.
fn exclusion_mask(
    registry: &ArtifactRegistry,
    params: &Params,
) -> Result<Option<Array2<bool>>, IfuError> {
    if params.lowess_snr_min.is_none() && params.lowess_snr_max.is_none() {
        return Ok(None);
    }
    if !registry.contains(SNR_MAPS_KEY) {
        warn!("S/N bounds set but no snr_maps artifact; fitting every spaxel");
        return Ok(None);
    }
    let maps = Container::read(registry.get(SNR_MAPS_KEY)?)?;
    let Some(snr) = maps
        .sections
        .iter()
        .skip(2)
        .find(|section| section.header.get_str(KIND_KEY) == Some("c"))
        .and_then(|section| section.as_image())
    else {
        warn!("snr_maps holds no continuum map; fitting every spaxel");
        return Ok(None);
    };
    let min = params.lowess_snr_min.unwrap_or(f64::NEG_INFINITY);
    let max = params.lowess_snr_max.unwrap_or(f64::INFINITY);
    let mask = snr.mapv(|value| value.is_nan() || value < min || value >= max);
    info!(
        excluded = mask.iter().filter(|out| **out).count(),
        min,
        max,
        "spaxels excluded from the continuum fit"
    );
    Ok(Some(mask))
}

/// Rebuilds the continuum cube from the row checkpoints of a fit.
///
/// Rows without a checkpoint stay NaN. The variance section is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeContinuumCube;

impl Step for MakeContinuumCube {
    fn name(&self) -> &'static str {
        "make_continuum_cube"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: MethodArgs = descriptor.args()?;
        let method: ContinuumMethod = args.method.parse()?;
        let locator = CheckpointLocator::from_prefix_path(registry.get(&checkpoints_key(method))?)?;
        let raw = read_cube(&registry, RAW_CUBE_KEY, ctx.params)?;
        let (nlam, ny, nx) = raw.shape();

        let assembly = assemble(nx, &locator, ny, nlam)?;
        if !assembly.is_complete() {
            warn!(
                missing = assembly.missing.len(),
                first = ?assembly.missing.first(),
                "continuum cube has rows without checkpoints"
            );
        }
        let variance = Array3::zeros(assembly.cube.dim());
        let product = raw.derived_product(assembly.cube, variance, ctx.tag)?;
        write_product(
            &mut registry,
            &cube_key(method),
            &product,
            &ctx.params.product_path(ctx.tag, method.tag()),
        )?;
        Ok(registry)
    }
}

/// Subtracts the reassembled continuum from a cube; the variance is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtractContinuum;

impl Step for SubtractContinuum {
    fn name(&self) -> &'static str {
        "subtract_continuum"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: SubtractArgs = descriptor.args()?;
        let method: ContinuumMethod = args.method.parse()?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let continuum = read_cube(&registry, &cube_key(method), ctx.params)?;
        if continuum.shape() != cube.shape() {
            return Err(IfuError::Shape(
                ErrorInfo::new("continuum-shape", "continuum cube differs from the input cube")
                    .with_context("cube", format!("{:?}", cube.shape()))
                    .with_context("continuum", format!("{:?}", continuum.shape())),
            ));
        }
        let data = &cube.data - &continuum.data;
        let product = cube.derived_product(data, cube.variance.clone(), ctx.tag)?;
        write_product(
            &mut registry,
            &args.name_out,
            &product,
            &ctx.params.product_path(ctx.tag, &format!("{}-contsub-cube", method.tag())),
        )?;
        Ok(registry)
    }
}
