//! Error taxonomy for plan validation, registry construction and lowering.

use thiserror::Error;

use crate::registry::ParameterSlot;

/// Result type alias for the pure plan pipeline.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Every way a reasoning-service payload can fail to become a list of invocations.
///
/// All variants abort the whole call: nothing is partially validated or partially lowered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Malformed payload: reasoning service output is not valid JSON ({0})")]
    MalformedPayload(String),

    #[error("Schema violation at '{field}': {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("Invalid step shape at action_sequence[{index}]: {reason}")]
    InvalidStepShape { index: usize, reason: String },

    #[error(
        "Unsupported action: {action} (step {position}). Supported actions are: {}",
        supported.join(", ")
    )]
    UnsupportedAction {
        action: String,
        position: usize,
        supported: Vec<String>,
    },

    #[error(
        "Missing required parameters for '{action}' (step {position}): {}",
        join_slots(missing)
    )]
    InvalidParameters {
        action: String,
        position: usize,
        missing: Vec<ParameterSlot>,
    },

    #[error("Duplicate action name '{name}': already registered as {existing}, conflicting {conflicting}")]
    DuplicateActionName {
        name: String,
        existing: String,
        conflicting: String,
    },

    #[error("Invalid registry entry '{name}': {reason}")]
    InvalidRegistryEntry { name: String, reason: String },
}

impl PlanError {
    pub(crate) fn schema(field: &str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn step_shape(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidStepShape {
            index,
            reason: reason.into(),
        }
    }

    /// Stable error code, suitable for logs and CLI exit reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "P001",
            Self::SchemaViolation { .. } => "P002",
            Self::InvalidStepShape { .. } => "P003",
            Self::UnsupportedAction { .. } => "L001",
            Self::InvalidParameters { .. } => "L002",
            Self::DuplicateActionName { .. } => "R001",
            Self::InvalidRegistryEntry { .. } => "R002",
        }
    }

    /// The top-level field a schema violation refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::SchemaViolation { field, .. } => Some(field),
            _ => None,
        }
    }
}

fn join_slots(slots: &[ParameterSlot]) -> String {
    slots
        .iter()
        .map(ParameterSlot::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
