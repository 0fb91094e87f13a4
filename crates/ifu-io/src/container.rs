use std::fs;
use std::path::{Path, PathBuf};

use ifu_core::errors::{ErrorInfo, IfuError};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::header::Header;

const MAGIC: &[u8; 4] = b"IFUC";

/// Current on-disk container format version.
pub const FORMAT_VERSION: u32 = 1;

/// Data carried by a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Header-only section.
    Empty,
    /// 2-D map indexed `(y, x)`.
    Image(Array2<f64>),
    /// 3-D cube indexed `(wavelength, y, x)`.
    Cube(Array3<f64>),
}

/// Header plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Keyword records.
    pub header: Header,
    /// Array data, if any.
    pub payload: Payload,
}

impl Section {
    /// Header-only section.
    pub fn primary(header: Header) -> Self {
        Self {
            header,
            payload: Payload::Empty,
        }
    }

    /// Section holding a 2-D map.
    pub fn image(image: Array2<f64>, header: Header) -> Self {
        Self {
            header,
            payload: Payload::Image(image),
        }
    }

    /// Section holding a 3-D cube.
    pub fn cube(cube: Array3<f64>, header: Header) -> Self {
        Self {
            header,
            payload: Payload::Cube(cube),
        }
    }

    /// Borrow the cube payload.
    pub fn as_cube(&self) -> Option<&Array3<f64>> {
        match &self.payload {
            Payload::Cube(cube) => Some(cube),
            _ => None,
        }
    }

    /// Borrow the image payload.
    pub fn as_image(&self) -> Option<&Array2<f64>> {
        match &self.payload {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Human readable payload shape, used by the inspector.
    pub fn shape(&self) -> Vec<usize> {
        match &self.payload {
            Payload::Empty => Vec::new(),
            Payload::Image(image) => image.shape().to_vec(),
            Payload::Cube(cube) => cube.shape().to_vec(),
        }
    }
}

/// Multi-section product file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Container {
    /// Sections in file order.
    pub sections: Vec<Section>,
}

impl Container {
    /// Creates a container from its sections.
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Returns section `index`, failing when the file holds fewer sections.
    pub fn section(&self, index: usize) -> Result<&Section, IfuError> {
        self.sections.get(index).ok_or_else(|| {
            IfuError::Shape(
                ErrorInfo::new("container-section", "section index out of range")
                    .with_context("index", index.to_string())
                    .with_context("sections", self.sections.len().to_string()),
            )
        })
    }

    /// Mutable access to section `index`.
    pub fn section_mut(&mut self, index: usize) -> Result<&mut Section, IfuError> {
        let count = self.sections.len();
        self.sections.get_mut(index).ok_or_else(|| {
            IfuError::Shape(
                ErrorInfo::new("container-section", "section index out of range")
                    .with_context("index", index.to_string())
                    .with_context("sections", count.to_string()),
            )
        })
    }

    /// Encodes the container into its on-disk byte layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IfuError> {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        let body = bincode::serialize(&self.sections)
            .map_err(|err| IfuError::serde("container-encode", err))?;
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes a container, validating magic bytes and format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IfuError> {
        if bytes.len() < 8 || &bytes[..4] != MAGIC {
            return Err(IfuError::serde(
                "container-magic",
                "not an IFU product container",
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version > FORMAT_VERSION {
            return Err(IfuError::Serde(
                ErrorInfo::new("container-version", "container written by a newer pipeline")
                    .with_context("version", version.to_string())
                    .with_context("supported", FORMAT_VERSION.to_string()),
            ));
        }
        let sections = bincode::deserialize(&bytes[8..])
            .map_err(|err| IfuError::serde("container-decode", err))?;
        Ok(Self { sections })
    }

    /// Reads a container from disk.
    pub fn read(path: &Path) -> Result<Self, IfuError> {
        let bytes = fs::read(path).map_err(|err| IfuError::io("container-read", path, err))?;
        Self::from_bytes(&bytes).map_err(|err| match err {
            IfuError::Serde(info) => {
                IfuError::Serde(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Writes the container, overwriting any existing file.
    pub fn write(&self, path: &Path) -> Result<(), IfuError> {
        write_atomic(path, &self.to_bytes()?)
    }
}

/// Writes `bytes` to a temporary sibling and renames it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IfuError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| IfuError::io("mkdir", parent, err))?;
        }
    }
    let staging = staging_path(path);
    fs::write(&staging, bytes).map_err(|err| IfuError::io("staging-write", &staging, err))?;
    fs::rename(&staging, path).map_err(|err| IfuError::io("staging-rename", path, err))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
