use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use ifu_core::errors::IfuError;
use ifu_fit::CancelToken;
use tracing::{info, warn};

use crate::params::{load_params, Params};
use crate::recipe::{load_recipe, Recipe};
use crate::registry::{ArtifactRegistry, RegistryStore};
use crate::steps::{StepContext, StepTable};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// `name:suffix` of every executed step, in order.
    pub executed: Vec<String>,
    /// `name:suffix` of every disabled step.
    pub skipped: Vec<String>,
    /// Registry as saved after the last step.
    pub registry: ArtifactRegistry,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

/// Executes the enabled steps of `recipe` in order.
///
/// Every step name is resolved before anything runs, so a misspelled step fails
/// the run without side effects even when disabled. The registry is loaded before
/// and saved after each step; a failing step leaves the registry of the last
/// successful step on disk. A cancelled token stops the run before the next
/// enabled step with [`IfuError::Interrupted`].
pub fn run(
    recipe: &Recipe,
    params: &Params,
    table: &StepTable,
    cancel: &CancelToken,
) -> Result<RunSummary, IfuError> {
    let started = Instant::now();
    for descriptor in &recipe.steps {
        table.resolve(&descriptor.step)?;
    }
    info!(
        recipe = %recipe.recipe_hash()?,
        steps = recipe.steps.len(),
        target = %params.target,
        "starting run"
    );

    fs::create_dir_all(&params.prod_loc)
        .map_err(|err| IfuError::io("prod-dir", &params.prod_loc, err))?;
    let store = RegistryStore::for_target(&params.prod_loc, &params.target);
    let mut registry = store.load_or_seed(&params.raw_cube_path())?;

    let mut executed = Vec::new();
    let mut skipped = Vec::new();
    for descriptor in &recipe.steps {
        let label = format!("{}:{}", descriptor.step, descriptor.suffix);
        if !descriptor.run {
            info!(step = %label, "disabled, skipping");
            skipped.push(label);
            continue;
        }
        if cancel.is_cancelled() {
            warn!(step = %label, "cancelled, stopping before step");
            return Err(IfuError::interrupted_step(&label));
        }
        let step = table.resolve(&descriptor.step)?;
        let ctx = StepContext {
            params,
            tag: &descriptor.suffix,
            cancel,
        };
        let step_started = Instant::now();
        info!(step = %label, "running");
        let loaded = store.load()?;
        registry = match step.run(loaded, &ctx, descriptor) {
            Ok(updated) => updated,
            Err(err) => {
                warn!(step = %label, code = %err.info().code, "step failed");
                return Err(err);
            }
        };
        store.save(&registry)?;
        info!(
            step = %label,
            artifacts = registry.len(),
            seconds = step_started.elapsed().as_secs_f64(),
            "step finished"
        );
        executed.push(label);
    }

    let duration = started.elapsed();
    info!(seconds = duration.as_secs_f64(), "run finished");
    Ok(RunSummary {
        executed,
        skipped,
        registry,
        duration,
    })
}

/// Loads both configuration files and runs the standard step table.
pub fn run_from_paths(
    recipe_path: &Path,
    params_path: &Path,
    cancel: &CancelToken,
) -> Result<RunSummary, IfuError> {
    let recipe = load_recipe(recipe_path)?;
    let params = load_params(params_path)?;
    run(&recipe, &params, &StepTable::standard(), cancel)
}
