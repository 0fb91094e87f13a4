//! Band-sum images. Only the arrays are produced; rendering them is left to
//! downstream tools.

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_io::{Container, Datacube, Section};
use ifu_reduce::{band_image, WaveRange};
use ndarray::Array2;
use serde::Deserialize;
use tracing::info;

use super::{read_cube, write_product, Step, StepContext};
use crate::recipe::StepDescriptor;
use crate::registry::ArtifactRegistry;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BwArgs {
    name_in: String,
    bands: Vec<[f64; 2]>,
    #[serde(default)]
    conts: Vec<Option<[f64; 2]>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RgbArgs {
    name_in: String,
    bands: Vec<[f64; 6]>,
    #[serde(default)]
    conts: Vec<Option<[f64; 6]>>,
}

/// Continuum window paired with band `index`; the list is cycled when shorter.
fn continuum_for<T: Copy>(conts: &[Option<T>], index: usize) -> Option<T> {
    if conts.is_empty() {
        None
    } else {
        conts[index % conts.len()]
    }
}

fn band(
    cube: &Datacube,
    lams: &[f64],
    lo: f64,
    hi: f64,
    cont: Option<(f64, f64)>,
) -> Result<Array2<f64>, IfuError> {
    band_image(
        cube.data.view(),
        lams,
        WaveRange::new(lo, hi),
        cont.map(|(a, b)| WaveRange::new(a, b)),
    )
}

fn check_bands(step: &str, count: usize) -> Result<(), IfuError> {
    if count > 0 {
        return Ok(());
    }
    Err(IfuError::Config(
        ErrorInfo::new("step-args", "no band requested").with_context("step", step),
    ))
}

/// One continuum-subtracted band-sum image per requested band.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotBw;

impl Step for PlotBw {
    fn name(&self) -> &'static str {
        "plot_BW"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: BwArgs = descriptor.args()?;
        check_bands(self.name(), args.bands.len())?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let lams = cube.lams.to_vec();

        for (index, [lo, hi]) in args.bands.iter().copied().enumerate() {
            let cont = continuum_for(&args.conts, index).map(|[a, b]| (a, b));
            let image = band(&cube, &lams, lo, hi, cont)?;
            let mut header = cube.product_header(ctx.tag, false);
            header.set_with_comment("BAND", WaveRange::new(lo, hi).to_string(), "summed range (A)");
            let key = format!("bw_{lo:.0}-{hi:.0}");
            let product = format!("BW_{lo:.0}-{hi:.0}");
            write_product(
                &mut registry,
                &key,
                &Container::new(vec![Section::image(image, header)]),
                &ctx.params.product_path(ctx.tag, &product),
            )?;
            info!(%key, "band image written");
        }
        Ok(registry)
    }
}

/// Three band-sum images per band triple, stored as one three-section product.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotRgb;

impl Step for PlotRgb {
    fn name(&self) -> &'static str {
        "plot_RGB"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: RgbArgs = descriptor.args()?;
        check_bands(self.name(), args.bands.len())?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let lams = cube.lams.to_vec();

        for (index, edges) in args.bands.iter().enumerate() {
            let cont = continuum_for(&args.conts, index);
            let mut sections = Vec::with_capacity(3);
            for channel in 0..3 {
                let (lo, hi) = (edges[2 * channel], edges[2 * channel + 1]);
                let window = cont.map(|c| (c[2 * channel], c[2 * channel + 1]));
                let image = band(&cube, &lams, lo, hi, window)?;
                let mut header = cube.product_header(ctx.tag, false);
                header.set_with_comment(
                    "BAND",
                    WaveRange::new(lo, hi).to_string(),
                    "summed range (A)",
                );
                sections.push(Section::image(image, header));
            }
            let label = edges
                .chunks(2)
                .map(|pair| format!("{:.0}-{:.0}", pair[0], pair[1]))
                .collect::<Vec<_>>()
                .join("_");
            let key = format!("rgb_{label}");
            write_product(
                &mut registry,
                &key,
                &Container::new(sections),
                &ctx.params.product_path(ctx.tag, &format!("RGB_{label}")),
            )?;
            info!(%key, "composite written");
        }
        Ok(registry)
    }
}
