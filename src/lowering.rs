//! Action lowering: validated plan + registry → ordered primitive invocations.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::plan::TaskPlan;
use crate::registry::{lowercase_action_name, ActionRegistry, ParameterSlot};
use crate::spatial::Position;

/// A fully resolved call for the execution environment.
///
/// Slots the step did not provide stay `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveInvocation {
    /// Canonical registry name of the action this came from.
    pub action: String,
    /// Primitive name, always drawn from the registry.
    pub target: String,
    pub position: Option<Position>,
    pub object: Option<String>,
    pub angle: Option<f64>,
}

/// Lowers every step of `plan`, in sequence order, or fails without producing anything.
///
/// The `step` numbers are ignored for ordering. Every action is resolved before any slot is
/// checked, so an unregistered action is reported ahead of a missing parameter on an
/// earlier step.
#[tracing::instrument(skip_all, fields(objective = %plan.objective, steps = plan.len()))]
pub fn lower(plan: &TaskPlan, registry: &ActionRegistry) -> Result<Vec<PrimitiveInvocation>> {
    let mut resolved = Vec::with_capacity(plan.len());

    for (index, step) in plan.action_sequence.iter().enumerate() {
        let Some(entry) = registry.resolve(&step.action) else {
            let position = index + 1;
            let action = lowercase_action_name(&step.action);
            tracing::warn!(step = position, action = %action, "unsupported action, aborting plan");
            return Err(PlanError::UnsupportedAction {
                action,
                position,
                supported: registry.names(),
            });
        };
        resolved.push(entry);
    }

    let mut invocations = Vec::with_capacity(plan.len());

    for (index, (step, (action, descriptor))) in
        plan.action_sequence.iter().zip(resolved).enumerate()
    {
        let position = index + 1;

        let missing: Vec<ParameterSlot> = descriptor
            .required
            .iter()
            .copied()
            .filter(|slot| !step.parameters.has(*slot))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(step = position, action = %action, missing = ?missing, "missing required parameters");
            return Err(PlanError::InvalidParameters {
                action: action.to_string(),
                position,
                missing,
            });
        }

        if !step.parameters.extra.is_empty() {
            tracing::debug!(
                step = position,
                ignored = ?step.parameters.extra.keys().collect::<Vec<_>>(),
                "ignoring unrecognized parameters"
            );
        }

        invocations.push(PrimitiveInvocation {
            action: action.to_string(),
            target: descriptor.target.clone(),
            position: step.parameters.position.clone(),
            object: step.parameters.object.clone(),
            angle: step.parameters.angle,
        });
    }

    tracing::debug!(invocations = invocations.len(), "plan lowered");
    Ok(invocations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ActionStep, StepParameters};
    use crate::registry::PrimitiveDescriptor;
    use crate::spatial::Vector3D;
    use crate::validator::validate;
    use serde_json::json;

    fn plan_of(steps: Vec<ActionStep>) -> TaskPlan {
        TaskPlan {
            objective: "test".to_string(),
            action_sequence: steps,
            potential_challenges: Vec::new(),
        }
    }

    fn arm_registry() -> ActionRegistry {
        ActionRegistry::build([
            ("move_to", "arm.move_to"),
            ("pick_up", "arm.pick"),
            ("place", "arm.place"),
        ])
        .expect("registry")
    }

    #[test]
    fn lowers_move_to_example() {
        let plan = validate(
            &json!({
                "objective": "move arm",
                "action_sequence": [
                    { "step": 1, "action": "MOVE_TO", "parameters": { "position": [1, 2, 3] } }
                ],
                "potential_challenges": []
            })
            .to_string(),
        )
        .expect("valid plan");
        let registry = ActionRegistry::build([("move_to", "arm.move_to")]).expect("registry");

        let invocations = lower(&plan, &registry).expect("lowered");
        assert_eq!(
            invocations,
            vec![PrimitiveInvocation {
                action: "move_to".to_string(),
                target: "arm.move_to".to_string(),
                position: Some(Position::Coordinates(Vector3D::new(1.0, 2.0, 3.0))),
                object: None,
                angle: None,
            }]
        );

        let as_json = serde_json::to_value(&invocations[0]).expect("serialize");
        assert_eq!(as_json["object"], json!(null));
        assert_eq!(as_json["position"], json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn empty_registry_rejects_first_step() {
        let plan = plan_of(vec![ActionStep::new("MOVE_TO").with_step(1)]);
        let registry = ActionRegistry::build(Vec::<(String, String)>::new()).expect("registry");

        match lower(&plan, &registry).unwrap_err() {
            PlanError::UnsupportedAction {
                action, position, ..
            } => {
                assert_eq!(action, "move_to");
                assert_eq!(position, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn output_mirrors_input_order_and_length() {
        let plan = plan_of(vec![
            ActionStep::new("place"),
            ActionStep::new("move_to"),
            ActionStep::new("pick_up"),
            ActionStep::new("move_to"),
        ]);

        let targets: Vec<_> = lower(&plan, &arm_registry())
            .expect("lowered")
            .into_iter()
            .map(|i| i.target)
            .collect();
        assert_eq!(
            targets,
            vec!["arm.place", "arm.move_to", "arm.pick", "arm.move_to"]
        );
    }

    #[test]
    fn step_numbers_do_not_reorder() {
        let plan = plan_of(vec![
            ActionStep::new("pick_up").with_step(2),
            ActionStep::new("place").with_step(1),
        ]);

        let actions: Vec<_> = lower(&plan, &arm_registry())
            .expect("lowered")
            .into_iter()
            .map(|i| i.action)
            .collect();
        assert_eq!(actions, vec!["pick_up", "place"]);
    }

    #[test]
    fn unsupported_action_anywhere_fails_whole_plan() {
        let plan = plan_of(vec![
            ActionStep::new("move_to"),
            ActionStep::new("pick_up"),
            ActionStep::new("juggle"),
            ActionStep::new("wave"),
        ]);

        match lower(&plan, &arm_registry()).unwrap_err() {
            PlanError::UnsupportedAction {
                action,
                position,
                supported,
            } => {
                assert_eq!(action, "juggle");
                assert_eq!(position, 3);
                assert_eq!(supported, vec!["move_to", "pick_up", "place"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unregistered_action_outranks_earlier_missing_slot() {
        let registry = ActionRegistry::robot_arm().expect("registry");
        let plan = plan_of(vec![ActionStep::new("move_to"), ActionStep::new("juggle")]);

        match lower(&plan, &registry).unwrap_err() {
            PlanError::UnsupportedAction {
                action, position, ..
            } => {
                assert_eq!(action, "juggle");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_mandatory_slot_is_invalid_parameters() {
        let registry = ActionRegistry::robot_arm().expect("registry");
        let plan = plan_of(vec![
            ActionStep::new("pick_up")
                .with_parameters(StepParameters::default().with_object("cube")),
            ActionStep::new("move_to")
                .with_parameters(StepParameters::default().with_object("cube")),
        ]);

        match lower(&plan, &registry).unwrap_err() {
            PlanError::InvalidParameters {
                action,
                position,
                missing,
            } => {
                assert_eq!(action, "move_to");
                assert_eq!(position, 2);
                assert_eq!(missing, vec![ParameterSlot::Position]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn aliases_lower_to_canonical_targets() {
        let registry = ActionRegistry::robot_arm().expect("registry");
        let plan = plan_of(vec![
            ActionStep::new("goto").with_parameters(
                StepParameters::default()
                    .with_position(Position::Coordinates(Vector3D::new(1.0, 2.0, 3.0))),
            ),
            ActionStep::new("pickup ")
                .with_parameters(StepParameters::default().with_object("cube")),
            ActionStep::new("PlaceOn").with_parameters(
                StepParameters::default().with_position(Position::Named("table".to_string())),
            ),
        ]);

        let invocations = lower(&plan, &registry).expect("lowered");
        let targets: Vec<_> = invocations.iter().map(|i| i.target.as_str()).collect();
        assert_eq!(
            targets,
            vec![
                "self.robot.move_to_position",
                "self.robot.pick_object",
                "self.robot.place_object"
            ]
        );
        assert_eq!(invocations[1].action, "pick_up");
    }

    #[test]
    fn declared_slots_pass_through_and_extras_are_dropped() {
        let registry = ActionRegistry::builder()
            .action_with(
                "rotate",
                PrimitiveDescriptor::new("self.robot.rotate").requires(ParameterSlot::Angle),
            )
            .build()
            .expect("registry");
        let mut params = StepParameters::default().with_angle(90.5);
        params.extra.insert("speed".to_string(), json!("slow"));
        let plan = plan_of(vec![ActionStep::new("rotate").with_parameters(params)]);

        let invocations = lower(&plan, &registry).expect("lowered");
        assert_eq!(invocations[0].angle, Some(90.5));
        assert_eq!(invocations[0].position, None);
    }
}
