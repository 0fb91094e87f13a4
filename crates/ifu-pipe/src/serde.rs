use ifu_core::errors::{ErrorInfo, IfuError};
pub use ifu_core::hash::to_canonical_json_bytes;
use serde::de::DeserializeOwned;

fn serde_error(code: &str, err: impl ToString) -> IfuError {
    IfuError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, IfuError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, IfuError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml_deserialize", err))
}
