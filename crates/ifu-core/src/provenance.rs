//! Provenance descriptors stamped into every product the pipeline writes.

/// Version string of the pipeline, recorded in product headers.
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header key carrying [`PIPELINE_VERSION`].
pub const VERSION_KEY: &str = "IFUVERS";

/// Header key carrying the tag of the step that produced a section.
pub const STEP_KEY: &str = "IFUSTEP";
