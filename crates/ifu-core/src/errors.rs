//! Structured error types shared across the IFU pipeline crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`IfuError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, row indices, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the IFU pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum IfuError {
    /// Broken invocation: missing configuration, unsupported instrument or method.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// A recipe names a step that is not registered.
    #[error("unknown step: {0}")]
    UnknownStep(ErrorInfo),
    /// A step asked the registry for a key it does not hold.
    #[error("missing artifact: {0}")]
    MissingArtifact(ErrorInfo),
    /// The raw input cube could not be found.
    #[error("missing input file: {0}")]
    MissingInputFile(ErrorInfo),
    /// The run was cancelled between steps or while a fit row was in flight.
    #[error("interrupted: {0}")]
    Interrupted(ErrorInfo),
    /// A numeric fit failed.
    #[error("fit error: {0}")]
    Fit(ErrorInfo),
    /// Array or record shapes disagree.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl IfuError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            IfuError::Config(info)
            | IfuError::UnknownStep(info)
            | IfuError::MissingArtifact(info)
            | IfuError::MissingInputFile(info)
            | IfuError::Interrupted(info)
            | IfuError::Fit(info)
            | IfuError::Shape(info)
            | IfuError::Io(info)
            | IfuError::Serde(info) => info,
        }
    }

    /// Builds the cancellation outcome for the row that was in flight.
    pub fn interrupted(row: usize) -> Self {
        IfuError::Interrupted(
            ErrorInfo::new("fit-interrupted", format!("row {row} interrupted"))
                .with_context("row", row.to_string())
                .with_hint("re-run the step with start_row set to this row"),
        )
    }

    /// Builds the cancellation outcome for a run stopped before `step` started.
    pub fn interrupted_step(step: &str) -> Self {
        IfuError::Interrupted(
            ErrorInfo::new("run-interrupted", format!("step {step} interrupted"))
                .with_context("step", step)
                .with_hint("re-run the recipe with the completed steps disabled"),
        )
    }

    /// Returns the step that was about to start when the run was cancelled.
    pub fn interrupted_step_name(&self) -> Option<&str> {
        match self {
            IfuError::Interrupted(info) => info.context.get("step").map(String::as_str),
            _ => None,
        }
    }

    /// Returns the in-flight row when the error is an interruption.
    pub fn interrupted_row(&self) -> Option<usize> {
        match self {
            IfuError::Interrupted(info) => info.context.get("row")?.parse().ok(),
            _ => None,
        }
    }

    /// Shorthand for an [`IfuError::Io`] carrying the offending path.
    pub fn io(code: &str, path: &std::path::Path, err: impl ToString) -> Self {
        IfuError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }

    /// Shorthand for an [`IfuError::Serde`] without path context.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        IfuError::Serde(ErrorInfo::new(code, err.to_string()))
    }
}
