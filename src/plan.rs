//! Typed task plan model.
//!
//! A [`TaskPlan`] only exists after [`crate::validator::validate`] has checked the raw
//! reasoning-service payload; nothing else in the crate constructs one from untrusted text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::ParameterSlot;
use crate::spatial::Position;

/// Objective, ordered actions and anticipated challenges for one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub objective: String,
    /// Execution order is sequence order, never the `step` numbers.
    pub action_sequence: Vec<ActionStep>,
    pub potential_challenges: Vec<String>,
}

impl TaskPlan {
    pub fn len(&self) -> usize {
        self.action_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_sequence.is_empty()
    }

    /// Zero-based indices of steps whose declared `step` number does not match `index + 1`.
    ///
    /// Used for diagnostics only.
    pub fn misnumbered_steps(&self) -> Vec<usize> {
        self.action_sequence
            .iter()
            .enumerate()
            .filter_map(|(index, step)| match step.step {
                Some(n) if n as usize != index + 1 => Some(index),
                _ => None,
            })
            .collect()
    }
}

/// One element of a plan's action sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: StepParameters,
}

impl ActionStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            step: None,
            action: action.into(),
            description: String::new(),
            parameters: StepParameters::default(),
        }
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_parameters(mut self, parameters: StepParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Step parameters: the recognized slots plus whatever else the service sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    /// Unrecognized keys, kept for diagnostics and never lowered.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StepParameters {
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = Some(angle);
        self
    }

    pub fn has(&self, slot: ParameterSlot) -> bool {
        match slot {
            ParameterSlot::Position => self.position.is_some(),
            ParameterSlot::Object => self.object.is_some(),
            ParameterSlot::Angle => self.angle.is_some(),
        }
    }
}
