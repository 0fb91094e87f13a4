//! Step implementations and the table resolving recipe names to them.

use std::collections::BTreeMap;
use std::path::Path;

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_fit::CancelToken;
use ifu_io::{Container, Datacube};
use tracing::debug;

use crate::params::Params;
use crate::recipe::StepDescriptor;
use crate::registry::ArtifactRegistry;

mod continuum;
mod dered;
mod images;
mod sky;
mod snr;
mod wcs;

pub use continuum::{FitContinuum, MakeContinuumCube, SubtractContinuum};
pub use dered::GalDered;
pub use images::{PlotBw, PlotRgb};
pub use sky::SkySub;
pub use snr::CrudeSnrMaps;
pub use wcs::AdjustWcs;

/// Everything a step sees besides the registry and its own arguments.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Run parameters.
    pub params: &'a Params,
    /// Output tag of the step being run.
    pub tag: &'a str,
    /// Cancellation shared with long-running steps.
    pub cancel: &'a CancelToken,
}

/// A named processing step.
pub trait Step: Send + Sync {
    /// Name used in recipes.
    fn name(&self) -> &'static str;

    /// Runs the step and returns the updated registry.
    fn run(
        &self,
        registry: ArtifactRegistry,
        ctx: &StepContext<'_>,
        descriptor: &StepDescriptor,
    ) -> Result<ArtifactRegistry, IfuError>;
}

/// Closed set of steps a recipe may name.
#[derive(Default)]
pub struct StepTable {
    steps: BTreeMap<&'static str, Box<dyn Step>>,
}

impl StepTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every built-in step.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(Box::new(AdjustWcs));
        table.register(Box::new(CrudeSnrMaps));
        table.register(Box::new(PlotBw));
        table.register(Box::new(PlotRgb));
        table.register(Box::new(SkySub));
        table.register(Box::new(GalDered));
        table.register(Box::new(FitContinuum));
        table.register(Box::new(MakeContinuumCube));
        table.register(Box::new(SubtractContinuum));
        table
    }

    /// Adds or replaces a step.
    pub fn register(&mut self, step: Box<dyn Step>) {
        self.steps.insert(step.name(), step);
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.keys().copied()
    }

    /// Looks up the step registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<&dyn Step, IfuError> {
        self.steps.get(name).map(|step| step.as_ref()).ok_or_else(|| {
            IfuError::UnknownStep(
                ErrorInfo::new("step-unknown", format!("no step named {name}"))
                    .with_context("step", name)
                    .with_hint(format!(
                        "known steps: {}",
                        self.names().collect::<Vec<_>>().join(", ")
                    )),
            )
        })
    }
}

impl std::fmt::Debug for StepTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn read_cube(registry: &ArtifactRegistry, key: &str, params: &Params) -> Result<Datacube, IfuError> {
    let path = registry.get(key)?;
    debug!(key, path = %path.display(), "reading cube");
    Datacube::read(path, params.instrument()?)
}

fn write_product(
    registry: &mut ArtifactRegistry,
    key: &str,
    container: &Container,
    path: &Path,
) -> Result<(), IfuError> {
    container.write(path)?;
    debug!(key, path = %path.display(), "product written");
    registry.put(key, path);
    Ok(())
}
