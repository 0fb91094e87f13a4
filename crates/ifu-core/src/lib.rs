#![deny(missing_docs)]
#![doc = "Core error taxonomy, canonical hashing and provenance constants for the IFU reduction pipeline."]

pub mod errors;
pub mod hash;
pub mod provenance;

pub use errors::{ErrorInfo, IfuError};
pub use hash::{stable_hash_string, to_canonical_json_bytes};
pub use provenance::{PIPELINE_VERSION, STEP_KEY, VERSION_KEY};
