//! Linear pixel-shift correction of the spatial WCS against a point catalog.
//!
//! The catalog positions are propagated to the observing epoch, projected on the
//! tangent plane and through the inverse CD matrix, then matched to sources found in
//! a reference image. The correction is the median pixel offset of the matches.

use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_io::Header;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stats::{nanmad, nanmedian};

const MAS_PER_DEG: f64 = 3.6e6;

/// Gnomonic (TAN) spatial WCS with a linear CD matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearWcs {
    /// Reference pixel, 1-based `(x, y)`.
    pub crpix: [f64; 2],
    /// Sky position of the reference pixel in degrees `(ra, dec)`.
    pub crval: [f64; 2],
    /// Degrees per pixel, `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub cd: [[f64; 2]; 2],
}

impl LinearWcs {
    /// Reads `CRPIX*`, `CRVAL*` and `CD*` from a header; missing cross terms are zero.
    pub fn from_header(header: &Header) -> Result<Self, IfuError> {
        let key = |name: &str| {
            header.get_f64(name).ok_or_else(|| {
                IfuError::Serde(
                    ErrorInfo::new("header-missing-key", "required header key absent")
                        .with_context("key", name),
                )
            })
        };
        Ok(Self {
            crpix: [key("CRPIX1")?, key("CRPIX2")?],
            crval: [key("CRVAL1")?, key("CRVAL2")?],
            cd: [
                [key("CD1_1")?, header.get_f64("CD1_2").unwrap_or(0.0)],
                [header.get_f64("CD2_1").unwrap_or(0.0), key("CD2_2")?],
            ],
        })
    }

    /// 0-based pixel position of `(ra, dec)` in degrees, `None` behind the tangent plane.
    pub fn world_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (xi, eta) = tan_project(
            ra.to_radians(),
            dec.to_radians(),
            self.crval[0].to_radians(),
            self.crval[1].to_radians(),
        )?;
        let inv = cd_inverse(&self.cd)?;
        let (xi, eta) = (xi.to_degrees(), eta.to_degrees());
        let dx = inv[0][0] * xi + inv[0][1] * eta;
        let dy = inv[1][0] * xi + inv[1][1] * eta;
        Some((self.crpix[0] + dx - 1.0, self.crpix[1] + dy - 1.0))
    }
}

/// Forward gnomonic projection; inputs and outputs in radians.
pub fn tan_project(ra: f64, dec: f64, ra0: f64, dec0: f64) -> Option<(f64, f64)> {
    let da = ra - ra0;
    let denom = dec.sin() * dec0.sin() + dec.cos() * dec0.cos() * da.cos();
    if denom <= 1e-12 {
        return None;
    }
    let xi = dec.cos() * da.sin() / denom;
    let eta = (dec.sin() * dec0.cos() - dec.cos() * dec0.sin() * da.cos()) / denom;
    Some((xi, eta))
}

fn cd_inverse(cd: &[[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
    if det.abs() < 1e-30 {
        return None;
    }
    Some([
        [cd[1][1] / det, -cd[0][1] / det],
        [-cd[1][0] / det, cd[0][0] / det],
    ])
}

/// Catalog entry with proper motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogSource {
    /// Right ascension (deg) at `epoch`.
    pub ra: f64,
    /// Declination (deg) at `epoch`.
    pub dec: f64,
    /// Proper motion in RA·cos(dec), mas/yr.
    #[serde(default)]
    pub pmra: f64,
    /// Proper motion in dec, mas/yr.
    #[serde(default)]
    pub pmdec: f64,
    /// Reference epoch, decimal year.
    pub epoch: f64,
}

impl CatalogSource {
    /// Position `(ra, dec)` moved to `epoch` (decimal year).
    pub fn position_at(&self, epoch: f64) -> (f64, f64) {
        let dt = epoch - self.epoch;
        let dec = self.dec + self.pmdec * dt / MAS_PER_DEG;
        let cos_dec = self.dec.to_radians().cos().max(1e-12);
        let ra = self.ra + self.pmra * dt / MAS_PER_DEG / cos_dec;
        (ra, dec)
    }
}

/// Reads a YAML (or JSON) list of catalog sources.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogSource>, IfuError> {
    let text = fs::read_to_string(path).map_err(|err| IfuError::io("catalog-read", path, err))?;
    serde_yaml::from_str(&text).map_err(|err| {
        IfuError::Serde(
            ErrorInfo::new("catalog-parse", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Converts a `DATE-OBS` value to a decimal year.
pub fn decimal_year(date_obs: &str) -> Result<f64, IfuError> {
    let parsed = match NaiveDateTime::parse_from_str(date_obs, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(parsed) => parsed,
        Err(err) => NaiveDate::parse_from_str(date_obs, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| {
                IfuError::Serde(
                    ErrorInfo::new("date-obs", err.to_string()).with_context("value", date_obs),
                )
            })?,
    };
    let year = parsed.year();
    let days = if NaiveDate::from_ymd_opt(year, 12, 31).map(|d| d.ordinal()) == Some(366) {
        366.0
    } else {
        365.0
    };
    let seconds =
        f64::from(parsed.num_seconds_from_midnight()) + f64::from(parsed.nanosecond()) * 1e-9;
    Ok(year as f64 + (f64::from(parsed.ordinal0()) + seconds / 86_400.0) / days)
}

/// Source found in a reference image, 0-based pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Centroid column.
    pub x: f64,
    /// Centroid row.
    pub y: f64,
    /// Background-subtracted flux in the centroid window.
    pub flux: f64,
}

const CENTROID_HALF: usize = 2;

/// Local maxima above `median + sigma * 1.4826 MAD`, refined by an intensity-weighted
/// centroid over the surrounding 5x5 window.
pub fn detect_sources(image: &Array2<f64>, sigma: f64) -> Vec<Detection> {
    let finite: Vec<f64> = image.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }
    let background = nanmedian(finite.iter().copied());
    let threshold = background + sigma * 1.4826 * nanmad(&finite);
    let (ny, nx) = image.dim();
    let mut detections = Vec::new();
    for row in 1..ny.saturating_sub(1) {
        for col in 1..nx.saturating_sub(1) {
            let peak = image[[row, col]];
            if !peak.is_finite() || peak <= threshold {
                continue;
            }
            let is_max = (row - 1..=row + 1)
                .flat_map(|r| (col - 1..=col + 1).map(move |c| (r, c)))
                .all(|idx| idx == (row, col) || image[idx].is_nan() || image[idx] <= peak);
            if !is_max {
                continue;
            }
            let (mut sum, mut sum_x, mut sum_y) = (0.0, 0.0, 0.0);
            let rows = row.saturating_sub(CENTROID_HALF)..=(row + CENTROID_HALF).min(ny - 1);
            for r in rows {
                let cols = col.saturating_sub(CENTROID_HALF)..=(col + CENTROID_HALF).min(nx - 1);
                for c in cols {
                    let weight = image[[r, c]] - background;
                    if weight.is_finite() && weight > 0.0 {
                        sum += weight;
                        sum_x += weight * c as f64;
                        sum_y += weight * r as f64;
                    }
                }
            }
            if sum > 0.0 {
                detections.push(Detection {
                    x: sum_x / sum,
                    y: sum_y / sum,
                    flux: sum,
                });
            }
        }
    }
    detections
}

/// Matching tolerances for [`linear_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetOpts {
    /// Largest catalog-to-detection distance accepted as a match, in pixels.
    pub match_radius: f64,
    /// Detection threshold in robust standard deviations.
    pub detect_sigma: f64,
}

impl Default for OffsetOpts {
    fn default() -> Self {
        Self {
            match_radius: 3.0,
            detect_sigma: 5.0,
        }
    }
}

/// Pixel shift `(dx, dy)` to subtract from `CRPIX1`/`CRPIX2`.
pub fn linear_offset(
    image: &Array2<f64>,
    wcs: &LinearWcs,
    catalog: &[CatalogSource],
    epoch: f64,
    opts: &OffsetOpts,
) -> Result<(f64, f64), IfuError> {
    let detections = detect_sources(image, opts.detect_sigma);
    debug!(detections = detections.len(), catalog = catalog.len(), "matching sources");
    let mut dxs = Vec::new();
    let mut dys = Vec::new();
    for source in catalog {
        let (ra, dec) = source.position_at(epoch);
        let Some((px, py)) = wcs.world_to_pixel(ra, dec) else {
            continue;
        };
        let nearest = detections
            .iter()
            .map(|d| (d, ((d.x - px).powi(2) + (d.y - py).powi(2)).sqrt()))
            .filter(|(_, dist)| *dist <= opts.match_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((detection, _)) = nearest {
            dxs.push(px - detection.x);
            dys.push(py - detection.y);
        }
    }
    if dxs.is_empty() {
        return Err(IfuError::Fit(
            ErrorInfo::new("wcs-no-match", "no catalog source matched a detection")
                .with_context("detections", detections.len().to_string())
                .with_context("catalog", catalog.len().to_string())
                .with_hint("increase wcs_match_radius or lower wcs_detect_sigma"),
        ));
    }
    let offset = (nanmedian(dxs.iter().copied()), nanmedian(dys.iter().copied()));
    info!(matches = dxs.len(), dx = offset.0, dy = offset.1, "linear WCS offset");
    Ok(offset)
}
