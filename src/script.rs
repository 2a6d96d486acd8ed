//! Control-script rendering.
//!
//! Turns lowered invocations into the script text handed to the execution environment: one
//! call per invocation inside a function that logs and re-raises any failure.

use serde::{Deserialize, Serialize};

use crate::lowering::PrimitiveInvocation;
use crate::spatial::Position;

const INDENT: &str = "    ";

/// Renders invocation lists into control scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRenderer {
    /// Name of the generated entry function.
    pub function_name: String,
    /// Callable used to resolve named positions at run time.
    pub position_lookup: String,
}

impl Default for ScriptRenderer {
    fn default() -> Self {
        Self {
            function_name: "execute_robot_task".to_string(),
            position_lookup: "self.robot.get_position".to_string(),
        }
    }
}

impl ScriptRenderer {
    pub fn render(&self, invocations: &[PrimitiveInvocation]) -> String {
        let mut lines = vec![
            "# Auto-generated robotic task execution script".to_string(),
            "import logging".to_string(),
            String::new(),
            String::new(),
            format!("def {}():", self.function_name),
            format!("{INDENT}try:"),
        ];

        if invocations.is_empty() {
            lines.push(format!("{INDENT}{INDENT}pass"));
        }
        for invocation in invocations {
            lines.push(format!(
                "{INDENT}{INDENT}{}({})",
                invocation.target,
                self.arguments(invocation).join(", ")
            ));
        }

        lines.extend([
            format!("{INDENT}except Exception as e:"),
            format!("{INDENT}{INDENT}logging.error(f'Task execution failed: {{e}}')"),
            format!("{INDENT}{INDENT}raise"),
        ]);

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }

    fn arguments(&self, invocation: &PrimitiveInvocation) -> Vec<String> {
        let mut args = Vec::new();

        match &invocation.position {
            Some(Position::Coordinates(v)) => {
                args.push(format!("position=[{:?}, {:?}, {:?}]", v.x(), v.y(), v.z()));
            }
            Some(Position::Named(name)) => {
                args.push(format!(
                    "position={}({})",
                    self.position_lookup,
                    quote(name)
                ));
            }
            None => {}
        }
        if let Some(object) = &invocation.object {
            args.push(format!("object={}", quote(object)));
        }
        if let Some(angle) = invocation.angle {
            args.push(format!("angle={angle:?}"));
        }

        args
    }
}

/// Single-quoted string literal with backslashes, quotes and line breaks escaped.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}
