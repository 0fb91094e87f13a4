use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_io::{Container, Header, Section};
use ifu_reduce::{decimal_year, linear_offset, load_catalog, white_light, LinearWcs};
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

/// Shifts the spatial reference pixel so catalog sources land on their detections.
///
/// Also writes the white-light image used for the detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustWcs;

impl Step for AdjustWcs {
    fn name(&self) -> &'static str {
        "adjust_WCS"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: Args = descriptor.args()?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;

        let white = white_light(cube.data.view());
        let white_product = Container::new(vec![Section::image(
            white.clone(),
            cube.product_header(ctx.tag, false),
        )]);
        write_product(
            &mut registry,
            "white_light",
            &white_product,
            &ctx.params.product_path(ctx.tag, "white_light"),
        )?;

        let date_obs = cube.primary.get_str("DATE-OBS").ok_or_else(|| {
            IfuError::Serde(
                ErrorInfo::new("header-missing-key", "required header key absent")
                    .with_context("key", "DATE-OBS"),
            )
        })?;
        let epoch = decimal_year(date_obs)?;
        let catalog = load_catalog(ctx.params.catalog_path()?)?;
        let wcs = LinearWcs::from_header(&cube.data_header)?;
        let (dx, dy) = linear_offset(&white, &wcs, &catalog, epoch, &ctx.params.offset_opts())?;
        info!(dx, dy, epoch, "applying linear WCS correction");

        let mut corrected = cube.to_container();
        for index in [1, 2] {
            shift_reference_pixel(&mut corrected.section_mut(index)?.header, dx, dy, ctx.tag);
        }
        write_product(
            &mut registry,
            &args.name_out,
            &corrected,
            &ctx.params.product_path(ctx.tag, "wcs-corr"),
        )?;
        Ok(registry)
    }
}

fn shift_reference_pixel(header: &mut Header, dx: f64, dy: f64, tag: &str) {
    header.stamp_provenance(tag);
    for (key, shift) in [("CRPIX1", dx), ("CRPIX2", dy)] {
        if let Some(value) = header.get_f64(key) {
            header.set(key, value - shift);
        }
    }
}
