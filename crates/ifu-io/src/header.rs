use std::fmt;

use serde::{Deserialize, Serialize};

use ifu_core::provenance::{PIPELINE_VERSION, STEP_KEY, VERSION_KEY};

/// Spatial coordinate keys copied from the instrument header into every product.
pub const SPATIAL_WCS_KEYS: [&str; 12] = [
    "CRPIX1", "CD1_1", "CTYPE1", "CUNIT1", "CRPIX2", "CD2_2", "CTYPE2", "CUNIT2", "CD1_2",
    "CD2_1", "CRVAL1", "CRVAL2",
];

/// Wavelength axis keys copied into every 3-D product.
pub const SPECTRAL_WCS_KEYS: [&str; 9] = [
    "CTYPE3", "CUNIT3", "CD3_3", "CRPIX3", "CRVAL3", "CD1_3", "CD2_3", "CD3_1", "CD3_2",
];

/// Scalar value stored in a header card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Free text value.
    Str(String),
    /// Logical value.
    Bool(bool),
}

impl HeaderValue {
    /// Numeric view of the value, accepting both integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(value) => Some(*value as f64),
            HeaderValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Int(value) => write!(f, "{value}"),
            HeaderValue::Float(value) => write!(f, "{value}"),
            HeaderValue::Str(value) => write!(f, "'{value}'"),
            HeaderValue::Bool(value) => f.write_str(if *value { "T" } else { "F" }),
        }
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Int(value as i64)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

/// Single keyword record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Keyword, unique within a header.
    pub key: String,
    /// Stored value.
    pub value: HeaderValue,
    /// Optional free text comment.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Ordered set of cards attached to a section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Creates an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|card| card.key == key)
            .map(|card| &card.value)
    }

    /// Numeric lookup.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    /// Text lookup.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    /// Sets `key`, replacing an existing card in place or appending a new one.
    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) {
        self.upsert(key, value.into(), None);
    }

    /// Sets `key` together with a comment.
    pub fn set_with_comment(&mut self, key: &str, value: impl Into<HeaderValue>, comment: &str) {
        self.upsert(key, value.into(), Some(comment.to_string()));
    }

    fn upsert(&mut self, key: &str, value: HeaderValue, comment: Option<String>) {
        if let Some(card) = self.cards.iter_mut().find(|card| card.key == key) {
            card.value = value;
            if comment.is_some() {
                card.comment = comment;
            }
            return;
        }
        self.cards.push(Card {
            key: key.to_string(),
            value,
            comment,
        });
    }

    /// Iterates over the cards in insertion order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// Number of cards in the header.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when the header holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Copies every key in `keys` present in `reference`, verbatim (value and comment).
    pub fn copy_keys(&mut self, reference: &Header, keys: &[&str]) {
        for key in keys {
            if let Some(card) = reference.cards.iter().find(|card| card.key == *key) {
                self.upsert(key, card.value.clone(), card.comment.clone());
            }
        }
    }

    /// Transfers the spatial coordinate keys from `reference`.
    pub fn add_spatial_wcs(&mut self, reference: &Header) {
        self.copy_keys(reference, &SPATIAL_WCS_KEYS);
    }

    /// Transfers the wavelength axis keys from `reference`.
    pub fn add_spectral_wcs(&mut self, reference: &Header) {
        self.copy_keys(reference, &SPECTRAL_WCS_KEYS);
    }

    /// Records the pipeline version and the producing step tag.
    pub fn stamp_provenance(&mut self, tag: &str) {
        self.set_with_comment(VERSION_KEY, PIPELINE_VERSION, "pipeline version");
        self.set_with_comment(STEP_KEY, tag, "pipeline processing step");
    }
}
