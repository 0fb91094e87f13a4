use ifu_core::errors::IfuError;
use ifu_io::{Container, Section};
use ifu_reduce::{sky_mask, sky_spectrum, subtract_sky, white_light};
use serde::Deserialize;
use tracing::info;

use super::{read_cube, write_product, Step, StepContext};
use crate::recipe::StepDescriptor;
use crate::registry::ArtifactRegistry;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    name_in: String,
    name_out: String,
}

/// Subtracts the median spectrum of the sky apertures from every spaxel.
///
/// Writes the white-light image of the input as `wl_im` alongside the cube. The
/// variance is carried over unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkySub;

impl Step for SkySub {
    fn name(&self) -> &'static str {
        "sky_sub"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: Args = descriptor.args()?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let (_, ny, nx) = cube.shape();

        let white = Container::new(vec![
            Section::primary(cube.primary.clone()),
            Section::image(white_light(cube.data.view()), cube.product_header(ctx.tag, false)),
        ]);
        write_product(
            &mut registry,
            "wl_im",
            &white,
            &ctx.params.product_path(ctx.tag, "wl-im"),
        )?;

        let mask = sky_mask(&ctx.params.sky_regions, ny, nx);
        let sky = sky_spectrum(cube.data.view(), &mask)?;
        info!(
            spaxels = mask.iter().filter(|inside| **inside).count(),
            "sky spectrum estimated"
        );
        let data = subtract_sky(cube.data.view(), &sky)?;
        let product = cube.derived_product(data, cube.variance.clone(), ctx.tag)?;
        write_product(
            &mut registry,
            &args.name_out,
            &product,
            &ctx.params.product_path(ctx.tag, "skysub-cube"),
        )?;
        Ok(registry)
    }
}
