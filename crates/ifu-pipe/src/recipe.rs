use std::fs;
use std::path::Path;

use ifu_core::errors::{ErrorInfo, IfuError};
use ifu_core::hash::stable_hash_string;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::serde::from_yaml_slice;

/// One entry of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDescriptor {
    /// Registered step name.
    #[serde(alias = "name")]
    pub step: String,
    /// Disabled steps are skipped without side effects.
    #[serde(alias = "enabled")]
    pub run: bool,
    /// Tag namespacing the step's output files.
    #[serde(alias = "tag")]
    pub suffix: String,
    /// Free-form arguments handed to the step.
    #[serde(default)]
    pub args: Value,
}

impl StepDescriptor {
    /// Deserializes the arguments into the step's typed argument struct.
    ///
    /// Missing or null arguments behave as an empty mapping.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, IfuError> {
        let value = match &self.args {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other.clone(),
        };
        serde_yaml::from_value(value).map_err(|err| {
            IfuError::Config(
                ErrorInfo::new("step-args", err.to_string())
                    .with_context("step", self.step.as_str())
                    .with_context("suffix", self.suffix.as_str()),
            )
        })
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe {
    /// Steps in execution order.
    pub steps: Vec<StepDescriptor>,
}

impl Recipe {
    /// Parses a YAML recipe.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, IfuError> {
        from_yaml_slice(bytes)
    }

    /// Content hash, logged at the start of a run.
    pub fn recipe_hash(&self) -> Result<String, IfuError> {
        stable_hash_string(self)
    }
}

/// Loads the recipe file.
pub fn load_recipe<P: AsRef<Path>>(path: P) -> Result<Recipe, IfuError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| {
        IfuError::Config(
            ErrorInfo::new("recipe-read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Recipe::from_yaml(&bytes)
}
