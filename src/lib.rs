//! Robot task plan validation and lowering.
//!
//! This crate defines:
//! - [`validator::validate`]: untrusted reasoning-service output → typed [`TaskPlan`].
//! - [`ActionRegistry`]: the immutable action name → primitive table.
//! - [`lowering::lower`]: a validated plan → ordered [`PrimitiveInvocation`]s, all or nothing.
//! - [`ScriptRenderer`]: invocations → control script text.
//! - [`TaskCompiler`]: the three steps above behind one call.
//!
//! The reasoning service and the execution environment stay outside the core, behind the
//! [`ReasoningService`] and [`ExecutionEnvironment`] traits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod execution;
pub mod lowering;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod script;
pub mod spatial;
pub mod validator;

pub use config::{Config, ConfigError};
pub use error::{PlanError, Result};
pub use execution::{dispatch, DispatchError, ExecutionEnvironment};
pub use lowering::{lower, PrimitiveInvocation};
pub use plan::{ActionStep, StepParameters, TaskPlan};
pub use planner::{Planner, PlannerError, ReasoningService, RetryPolicy, ServiceError};
pub use registry::{ActionRegistry, ParameterSlot, PrimitiveDescriptor, RegistryBuilder};
pub use script::ScriptRenderer;
pub use spatial::{BoundsError, Position, Vector3D, WorkspaceBounds};
pub use validator::validate;

/// The output of one compile: the validated plan, its invocations and the rendered script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTask {
    pub plan: TaskPlan,
    pub invocations: Vec<PrimitiveInvocation>,
    pub script: String,
}

/// Validates, lowers and renders plans against one shared registry.
///
/// Holds no per-call state, so a single instance can serve concurrent callers.
#[derive(Clone)]
pub struct TaskCompiler {
    registry: Arc<ActionRegistry>,
    renderer: ScriptRenderer,
}

impl std::fmt::Debug for TaskCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCompiler")
            .field("actions", &self.registry.len())
            .field("names", &self.registry.names())
            .field("function_name", &self.renderer.function_name)
            .finish()
    }
}

impl TaskCompiler {
    /// Compiler over the default robot-arm registry.
    pub fn new() -> Result<Self> {
        Ok(Self::from_registry(Arc::new(ActionRegistry::robot_arm()?)))
    }

    /// Creates a compiler sharing an already-built registry.
    pub fn from_registry(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            renderer: ScriptRenderer::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: ScriptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Validates a raw payload, lowers it and renders the script.
    pub fn compile(&self, raw_text: &str) -> Result<CompiledTask> {
        let plan = validate(raw_text)?;
        self.compile_plan(plan)
    }

    /// Lowers and renders an already-validated plan.
    pub fn compile_plan(&self, plan: TaskPlan) -> Result<CompiledTask> {
        let invocations = lower(&plan, &self.registry)?;
        let script = self.renderer.render(&invocations);

        tracing::info!(
            objective = %plan.objective,
            invocations = invocations.len(),
            "task compiled"
        );

        Ok(CompiledTask {
            plan,
            invocations,
            script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pick_and_place() -> String {
        json!({
            "objective": "Pick up the red cube and place it on the blue platform",
            "action_sequence": [
                {
                    "step": 1,
                    "action": "move_to",
                    "description": "approach",
                    "parameters": { "position": [0.1, 0.2, 0.3], "object": "red_cube" }
                },
                {
                    "step": 2,
                    "action": "pick_up",
                    "description": "grasp",
                    "parameters": { "object": "red_cube" }
                },
                {
                    "step": 3,
                    "action": "place",
                    "description": "release on platform",
                    "parameters": { "position": [0.4, 0.5, 0.6] }
                }
            ],
            "potential_challenges": ["cube may slip"]
        })
        .to_string()
    }

    #[test]
    fn compiles_pick_and_place_with_default_registry() {
        let compiler = TaskCompiler::new().expect("default registry");
        let task = compiler.compile(&pick_and_place()).expect("compiled");

        assert_eq!(task.invocations.len(), 3);
        assert!(task.script.contains("self.robot.move_to_position"));
        assert!(task.script.contains("self.robot.pick_object(object='red_cube')"));
        assert!(task
            .script
            .contains("self.robot.place_object(position=[0.4, 0.5, 0.6])"));
    }

    #[test]
    fn custom_renderer_names_the_entry_function() {
        let compiler = TaskCompiler::new()
            .expect("default registry")
            .with_renderer(ScriptRenderer {
                function_name: "run_arm".to_string(),
                ..ScriptRenderer::default()
            });
        let task = compiler.compile(&pick_and_place()).expect("compiled");

        assert!(task.script.contains("def run_arm():"));
        assert!(!task.script.contains("execute_robot_task"));
    }

    #[test]
    fn compile_fails_closed_on_unsupported_action() {
        let compiler = TaskCompiler::new().expect("default registry");
        let payload = json!({
            "objective": "spin",
            "action_sequence": [
                { "action": "move_to", "parameters": { "position": [0, 0, 0.5] } },
                { "action": "rotate", "parameters": { "angle": 90 } }
            ],
            "potential_challenges": []
        })
        .to_string();

        match compiler.compile(&payload).unwrap_err() {
            PlanError::UnsupportedAction {
                action, position, ..
            } => {
                assert_eq!(action, "rotate");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn shared_registry_serves_concurrent_compiles() {
        let compiler = TaskCompiler::new().expect("default registry");
        let payload = pick_and_place();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| compiler.compile(&payload)))
                .collect();
            for handle in handles {
                let task = handle.join().expect("thread").expect("compiled");
                assert_eq!(task.invocations.len(), 3);
            }
        });
    }
}
