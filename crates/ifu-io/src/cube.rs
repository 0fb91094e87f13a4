use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};

use crate::container::{Container, Section};
use crate::header::Header;

/// Instruments whose raw product layout the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    /// MUSE: primary header, value cube, variance cube.
    #[serde(rename = "MUSE")]
    Muse,
}

impl Instrument {
    /// Section holding the value cube.
    pub fn data_section(self) -> usize {
        match self {
            Instrument::Muse => 1,
        }
    }

    /// Section holding the variance cube.
    pub fn variance_section(self) -> usize {
        match self {
            Instrument::Muse => 2,
        }
    }
}

impl FromStr for Instrument {
    type Err = IfuError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "MUSE" => Ok(Instrument::Muse),
            other => Err(IfuError::Config(
                ErrorInfo::new("instrument-unsupported", "unsupported instrument tag")
                    .with_context("inst", other)
                    .with_hint("supported instruments: MUSE"),
            )),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Muse => write!(f, "MUSE"),
        }
    }
}

/// Linear wavelength axis specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthAxis {
    /// Reference pixel (1-based).
    pub crpix: f64,
    /// Wavelength at the reference pixel.
    pub crval: f64,
    /// Step between consecutive planes.
    pub cdelt: f64,
}

impl WavelengthAxis {
    /// Reads the axis from a data header (`CRPIX3`, `CRVAL3`, `CD3_3` or `CDELT3`).
    pub fn from_header(header: &Header) -> Result<Self, IfuError> {
        let crpix = required(header, "CRPIX3")?;
        let crval = required(header, "CRVAL3")?;
        let cdelt = header
            .get_f64("CD3_3")
            .or_else(|| header.get_f64("CDELT3"))
            .ok_or_else(|| missing_key("CD3_3"))?;
        Ok(Self {
            crpix,
            crval,
            cdelt,
        })
    }

    /// Writes the axis keys into `header`.
    pub fn write_to(&self, header: &mut Header) {
        header.set("CTYPE3", "AWAV");
        header.set("CUNIT3", "Angstrom");
        header.set("CRPIX3", self.crpix);
        header.set("CRVAL3", self.crval);
        header.set("CD3_3", self.cdelt);
    }

    /// Wavelength of every plane.
    pub fn values(&self, len: usize) -> Array1<f64> {
        Array1::from_iter(
            (0..len).map(|i| self.crval + self.cdelt * (i as f64 + 1.0 - self.crpix)),
        )
    }
}

fn required(header: &Header, key: &str) -> Result<f64, IfuError> {
    header.get_f64(key).ok_or_else(|| missing_key(key))
}

fn missing_key(key: &str) -> IfuError {
    IfuError::Serde(
        ErrorInfo::new("header-missing-key", "required header key absent").with_context("key", key),
    )
}

/// Value and variance cubes of one dataset together with their headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Datacube {
    /// Wavelength of every plane; its length equals the first cube dimension.
    pub lams: Array1<f64>,
    /// Value cube `(wavelength, y, x)`.
    pub data: Array3<f64>,
    /// Variance cube, same shape as `data`.
    pub variance: Array3<f64>,
    /// Primary (dataset level) header.
    pub primary: Header,
    /// Header of the value section.
    pub data_header: Header,
    /// Header of the variance section.
    pub variance_header: Header,
}

impl Datacube {
    /// Assembles a dataset from arrays, writing the axis keys into both headers.
    pub fn from_parts(
        axis: WavelengthAxis,
        data: Array3<f64>,
        variance: Array3<f64>,
        primary: Header,
        mut data_header: Header,
    ) -> Result<Self, IfuError> {
        check_same_shape(&data, &variance)?;
        axis.write_to(&mut data_header);
        let (nlam, ny, nx) = data.dim();
        data_header.set("NAXIS1", nx);
        data_header.set("NAXIS2", ny);
        data_header.set("NAXIS3", nlam);
        let variance_header = data_header.clone();
        Ok(Self {
            lams: axis.values(nlam),
            data,
            variance,
            primary,
            data_header,
            variance_header,
        })
    }

    /// Reads a dataset using the section layout of `instrument`.
    pub fn read(path: &Path, instrument: Instrument) -> Result<Self, IfuError> {
        let container = Container::read(path)?;
        let primary = container.section(0)?.header.clone();
        let data_section = container.section(instrument.data_section())?;
        let variance_section = container.section(instrument.variance_section())?;
        let data = data_section
            .as_cube()
            .ok_or_else(|| not_a_cube(path, instrument.data_section()))?
            .clone();
        let variance = variance_section
            .as_cube()
            .ok_or_else(|| not_a_cube(path, instrument.variance_section()))?
            .clone();
        check_same_shape(&data, &variance)?;
        let axis = WavelengthAxis::from_header(&data_section.header)?;
        let lams = axis.values(data.dim().0);
        tracing::debug!(path = %path.display(), shape = ?data.dim(), "loaded datacube");
        Ok(Self {
            lams,
            data,
            variance,
            primary,
            data_header: data_section.header.clone(),
            variance_header: variance_section.header.clone(),
        })
    }

    /// `(wavelength planes, y, x)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Builds a fresh product header from the data header: coordinate keys plus provenance.
    pub fn product_header(&self, tag: &str, spectral: bool) -> Header {
        let mut header = Header::new();
        header.add_spatial_wcs(&self.data_header);
        if spectral {
            header.add_spectral_wcs(&self.data_header);
        }
        header.stamp_provenance(tag);
        header
    }

    /// Packs replacement value and variance cubes into a three-section product.
    pub fn derived_product(
        &self,
        data: Array3<f64>,
        variance: Array3<f64>,
        tag: &str,
    ) -> Result<Container, IfuError> {
        check_same_shape(&data, &variance)?;
        if data.dim() != self.data.dim() {
            return Err(IfuError::Shape(
                ErrorInfo::new("product-shape", "derived cube differs from its source")
                    .with_context("expected", format!("{:?}", self.data.dim()))
                    .with_context("actual", format!("{:?}", data.dim())),
            ));
        }
        let header = self.product_header(tag, true);
        Ok(Container::new(vec![
            Section::primary(self.primary.clone()),
            Section::cube(data, header.clone()),
            Section::cube(variance, header),
        ]))
    }

    /// Writes the dataset in the MUSE layout, keeping the original headers.
    pub fn to_container(&self) -> Container {
        Container::new(vec![
            Section::primary(self.primary.clone()),
            Section::cube(self.data.clone(), self.data_header.clone()),
            Section::cube(self.variance.clone(), self.variance_header.clone()),
        ])
    }
}

fn not_a_cube(path: &Path, index: usize) -> IfuError {
    IfuError::Shape(
        ErrorInfo::new("section-not-cube", "section does not hold a 3-D payload")
            .with_context("path", path.display().to_string())
            .with_context("section", index.to_string()),
    )
}

fn check_same_shape(data: &Array3<f64>, variance: &Array3<f64>) -> Result<(), IfuError> {
    if data.dim() == variance.dim() {
        return Ok(());
    }
    Err(IfuError::Shape(
        ErrorInfo::new("variance-shape", "value and variance cubes differ in shape")
            .with_context("data", format!("{:?}", data.dim()))
            .with_context("variance", format!("{:?}", variance.dim())),
    ))
}
