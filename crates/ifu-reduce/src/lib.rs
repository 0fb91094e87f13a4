#![deny(missing_docs)]

//! Numeric reduction steps for IFU datacubes.

/// Galactic extinction laws and flux corrections.
pub mod extinction;
/// Sky aperture masks and median sky subtraction.
pub mod sky;
/// Wavelength-range reductions, signal-to-noise maps and band images.
pub mod spectral;
/// NaN-aware statistics.
pub mod stats;
/// Linear WCS offset against a point catalog.
pub mod wcs;

pub use extinction::{Correction, Extinction, ReddeningCurve};
pub use sky::{sky_mask, sky_spectrum, subtract_sky, SkyRegion};
pub use spectral::{
    band_image, coverage_map, reduce_range, snr_map, white_light, Aggregate, SnrKind, WaveRange,
};
pub use wcs::{
    decimal_year, detect_sources, linear_offset, load_catalog, CatalogSource, Detection,
    LinearWcs, OffsetOpts,
};
