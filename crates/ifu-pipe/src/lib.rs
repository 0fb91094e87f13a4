#![deny(missing_docs)]
#![doc = "Recipe-driven step sequencer and artifact registry for IFU datacube reduction."]

/// Run parameters loaded from the parameter file.
pub mod params;
/// Recipe files and step descriptors.
pub mod recipe;
/// Artifact registry and its persistence.
pub mod registry;
/// Step sequencing driver.
pub mod sequencer;
/// JSON and YAML serde helpers.
pub mod serde;
/// Built-in processing steps.
pub mod steps;

pub use params::{load_params, Multiprocessing, Params, SnrRange};
pub use recipe::{load_recipe, Recipe, StepDescriptor};
pub use registry::{ArtifactRegistry, RegistryStore, RAW_CUBE_KEY};
pub use sequencer::{run, run_from_paths, RunSummary};
pub use steps::{Step, StepContext, StepTable};
