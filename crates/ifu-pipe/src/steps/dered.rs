use ifu_core::errors::IfuError;
use ndarray::Axis;
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

/// Corrects for Galactic extinction: values scale by the correction factor,
/// variances by its square.
#[derive(Debug, Clone, Copy, Default)]
pub struct GalDered;

impl Step for GalDered {
    fn name(&self) -> &'static str {
        "gal_dered"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: Args = descriptor.args()?;
        let extinction = ctx.params.extinction()?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let correction = extinction.correction(&cube.lams.to_vec());

        let mut data = cube.data.clone();
        let mut variance = cube.variance.clone();
        for (plane, (factor, factor_sq)) in correction
            .factor
            .iter()
            .zip(correction.factor_sq.iter())
            .enumerate()
        {
            data.index_axis_mut(Axis(0), plane).mapv_inplace(|v| v * factor);
            variance
                .index_axis_mut(Axis(0), plane)
                .mapv_inplace(|v| v * factor_sq);
        }
        info!(curve = %extinction.curve, ab = extinction.ab, av = extinction.av, "extinction corrected");

        let mut product = cube.derived_product(data, variance, ctx.tag)?;
        for index in [1, 2] {
            let header = &mut product.section_mut(index)?.header;
            header.set_with_comment("IFU_AB", extinction.ab, "Galactic extinction in B (mag)");
            header.set_with_comment("IFU_AV", extinction.av, "Galactic extinction in V (mag)");
        }
        write_product(
            &mut registry,
            &args.name_out,
            &product,
            &ctx.params.product_path(ctx.tag, "gal-dered-cube"),
        )?;
        Ok(registry)
    }
}
