//! Plan validator: untrusted reasoning-service text in, [`TaskPlan`] out.
//!
//! The payload is decoded into a generic JSON value first and then checked field by field.
//! Nothing about its structure is assumed, and the first problem found (in a fixed order)
//! is the one reported.

use serde_json::{Map, Value};

use crate::error::{PlanError, Result};
use crate::plan::{ActionStep, StepParameters, TaskPlan};
use crate::spatial::{Position, Vector3D};

/// Top-level keys, in the order missing keys are reported.
pub const REQUIRED_FIELDS: [&str; 3] = ["objective", "action_sequence", "potential_challenges"];

/// Parses and validates a raw reasoning-service payload.
#[tracing::instrument(skip_all, fields(payload_len = raw_text.len()))]
pub fn validate(raw_text: &str) -> Result<TaskPlan> {
    let value: Value = serde_json::from_str(raw_text.trim())
        .map_err(|e| PlanError::MalformedPayload(e.to_string()))?;
    validate_value(&value)
}

/// Validates an already-decoded payload.
pub fn validate_value(value: &Value) -> Result<TaskPlan> {
    let Some(root) = value.as_object() else {
        return Err(PlanError::schema(
            REQUIRED_FIELDS[0],
            "payload is not a JSON object",
        ));
    };

    for field in REQUIRED_FIELDS {
        if root.get(field).map_or(true, Value::is_null) {
            return Err(PlanError::schema(field, "missing required field"));
        }
    }

    let objective = match &root["objective"] {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::String(_) => return Err(PlanError::schema("objective", "objective is empty")),
        _ => return Err(PlanError::schema("objective", "objective is not text")),
    };

    let Value::Array(raw_steps) = &root["action_sequence"] else {
        return Err(PlanError::schema("action_sequence", "not an array"));
    };
    if raw_steps.is_empty() {
        return Err(PlanError::schema(
            "action_sequence",
            "action sequence is empty",
        ));
    }

    let potential_challenges = parse_challenges(&root["potential_challenges"])?;

    let action_sequence = raw_steps
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_step(index, raw))
        .collect::<Result<Vec<_>>>()?;

    let plan = TaskPlan {
        objective,
        action_sequence,
        potential_challenges,
    };

    let misnumbered = plan.misnumbered_steps();
    if !misnumbered.is_empty() {
        tracing::warn!(
            indices = ?misnumbered,
            "step numbers are not contiguous from 1; sequence order is used"
        );
    }

    tracing::debug!(
        objective = %plan.objective,
        steps = plan.len(),
        challenges = plan.potential_challenges.len(),
        "task plan validated"
    );

    Ok(plan)
}

fn parse_challenges(value: &Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(PlanError::schema("potential_challenges", "not an array"));
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(PlanError::schema(
                "potential_challenges",
                "every challenge must be text",
            )),
        })
        .collect()
}

fn parse_step(index: usize, value: &Value) -> Result<ActionStep> {
    let Some(obj) = value.as_object() else {
        return Err(PlanError::step_shape(index, "step is not a JSON object"));
    };

    let action = match obj.get("action") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(PlanError::step_shape(index, "`action` is empty")),
        None | Some(Value::Null) => {
            return Err(PlanError::step_shape(index, "missing `action`"));
        }
        Some(_) => return Err(PlanError::step_shape(index, "`action` is not text")),
    };

    let step = match obj.get("step") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) if n >= 1 => Some(n),
            _ => {
                tracing::warn!(index, step = %v, "ignoring malformed step number");
                None
            }
        },
    };

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => StepParameters::default(),
        Some(Value::Object(map)) => parse_parameters(index, map)?,
        Some(_) => {
            return Err(PlanError::step_shape(
                index,
                "`parameters` is not a JSON object",
            ))
        }
    };

    Ok(ActionStep {
        step,
        action,
        description,
        parameters,
    })
}

fn parse_parameters(index: usize, map: &Map<String, Value>) -> Result<StepParameters> {
    let mut extra = map.clone();

    let position = match extra.remove("position") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(Position::Coordinates(parse_coordinates(
            index, &items,
        )?)),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(Position::Named(s)),
        Some(_) => {
            return Err(PlanError::step_shape(
                index,
                "`position` must be [x, y, z] or a location name",
            ))
        }
    };

    let object = match extra.remove("object") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(_) => {
            return Err(PlanError::step_shape(
                index,
                "`object` must be a non-empty name",
            ))
        }
    };

    let angle = match extra.remove("angle") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => return Err(PlanError::step_shape(index, "`angle` is not a number")),
        },
        Some(_) => return Err(PlanError::step_shape(index, "`angle` is not a number")),
    };

    Ok(StepParameters {
        position,
        object,
        angle,
        extra,
    })
}

fn parse_coordinates(index: usize, items: &[Value]) -> Result<Vector3D> {
    let coords: Vec<f32> = items
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .filter(|f| f.is_finite())
        .collect();

    match coords.as_slice() {
        [x, y, z] if items.len() == 3 => Ok(Vector3D::from([*x, *y, *z])),
        _ => Err(PlanError::step_shape(
            index,
            "`position` must contain exactly three finite numbers",
        )),
    }
}
