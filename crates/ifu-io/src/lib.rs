#![deny(missing_docs)]
#![doc = "Product container format, header cards and instrument datacube readers."]

/// Multi-section container encoding.
pub mod container;
/// Instrument layouts and the value/variance datacube.
pub mod cube;
/// Header cards and coordinate key transfer.
pub mod header;

pub use container::{write_atomic, Container, Payload, Section, FORMAT_VERSION};
pub use cube::{Datacube, Instrument, WavelengthAxis};
pub use header::{Card, Header, HeaderValue, SPATIAL_WCS_KEYS, SPECTRAL_WCS_KEYS};
