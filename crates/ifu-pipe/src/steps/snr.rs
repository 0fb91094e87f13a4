use ifu_core::errors::IfuError;
use ifu_io::{Container, Section};
use ifu_reduce::{coverage_map, snr_map, WaveRange};
use serde::Deserialize;
use tracing::info;

use super::{read_cube, write_product, Step, StepContext};
use crate::recipe::StepDescriptor;
use crate::registry::ArtifactRegistry;

/// Header key recording the wavelength window of a map.
pub const RANGE_KEY: &str = "SNRRANGE";
/// Header key recording the map type (`x` coverage, `c` continuum, `e` emission).
pub const KIND_KEY: &str = "SNRTYPE";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    name_in: String,
    #[serde(default)]
    zcorr_lams: bool,
}

/// Coverage map plus one crude signal-to-noise map per configured window.
///
/// Section 1 holds the coverage map; section `i + 2` the map of `snr_ranges[i]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrudeSnrMaps;

impl Step for CrudeSnrMaps {
    fn name(&self) -> &'static str {
        "crude_snr_maps"
    }

    fn run(
        &self,
        mut registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError> {
        let args: Args = descriptor.args()?;
        let cube = read_cube(&registry, &args.name_in, ctx.params)?;
        let mut lams = cube.lams.to_vec();
        if args.zcorr_lams {
            let scale = 1.0 + ctx.params.z_target;
            lams.iter_mut().for_each(|lam| *lam /= scale);
        }

        let mut sections = vec![Section::primary(cube.primary.clone())];
        let mut header = cube.product_header(ctx.tag, false);
        if let (Some(first), Some(last)) = (lams.first(), lams.last()) {
            header.set_with_comment(
                RANGE_KEY,
                WaveRange::new(*first, *last).to_string(),
                "spectral range (A) used for S/N",
            );
        }
        header.set_with_comment(KIND_KEY, "x", "NaN = no data, 1 = valid spectrum");
        sections.push(Section::image(coverage_map(cube.data.view()), header));

        for window in &ctx.params.snr_ranges {
            let map = snr_map(cube.data.view(), &lams, window.range, window.kind)?;
            let mut header = cube.product_header(ctx.tag, false);
            header.set_with_comment(
                RANGE_KEY,
                window.range.to_string(),
                "spectral range (A) used for S/N",
            );
            header.set_with_comment(KIND_KEY, window.kind.tag(), "c = continuum, e = emission");
            sections.push(Section::image(map, header));
        }
        info!(maps = ctx.params.snr_ranges.len(), "signal-to-noise maps computed");

        write_product(
            &mut registry,
            "snr_maps",
            &Container::new(sections),
            &ctx.params.product_path(ctx.tag, "snr-maps"),
        )?;
        Ok(registry)
    }
}
