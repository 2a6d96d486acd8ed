//! Spatial primitives shared by the plan model and the workspace check.
//!
//! Coordinates stay in plain typed structures so the pure pipeline never needs to know about
//! the simulator's own frame types.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lowering::PrimitiveInvocation;

/// Cartesian point in the arm's workspace frame, in metres with the base at the origin.
///
/// This is what a `[x, y, z]` position parameter becomes once validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3D(pub Vector3<f32>);

impl Vector3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn x(&self) -> f32 {
        self.0.x
    }

    pub fn y(&self) -> f32 {
        self.0.y
    }

    pub fn z(&self) -> f32 {
        self.0.z
    }
}

impl From<[f32; 3]> for Vector3D {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Where a step wants the end effector to go.
///
/// Plans usually carry explicit coordinates, but the reasoning service may also name a
/// location ("blue platform") that only the execution environment can resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Coordinates(Vector3D),
    Named(String),
}

impl Position {
    pub fn coordinates(&self) -> Option<&Vector3D> {
        match self {
            Self::Coordinates(v) => Some(v),
            Self::Named(_) => None,
        }
    }
}

/// Inclusive `[min, max]` range along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange(pub f32, pub f32);

impl AxisRange {
    pub fn min(&self) -> f32 {
        self.0
    }

    pub fn max(&self) -> f32 {
        self.1
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.0 && value <= self.1
    }

    pub fn is_ordered(&self) -> bool {
        self.0 <= self.1
    }
}

/// The box the arm can physically reach.
///
/// Neither validation nor lowering consult it; callers opt in with [`WorkspaceBounds::check`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceBounds {
    pub x: AxisRange,
    pub y: AxisRange,
    pub z: AxisRange,
}

impl Default for WorkspaceBounds {
    fn default() -> Self {
        Self {
            x: AxisRange(-1.0, 1.0),
            y: AxisRange(-1.0, 1.0),
            z: AxisRange(0.0, 1.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("step {position} ({target}) targets ({x}, {y}, {z}), outside the workspace")]
    OutOfWorkspace {
        position: usize,
        target: String,
        x: f32,
        y: f32,
        z: f32,
    },
}

impl WorkspaceBounds {
    pub fn contains(&self, point: &Vector3D) -> bool {
        self.x.contains(point.x()) && self.y.contains(point.y()) && self.z.contains(point.z())
    }

    /// Checks every coordinate position of an already-lowered plan.
    ///
    /// Named positions are skipped: they are resolved by the execution environment.
    pub fn check(&self, invocations: &[PrimitiveInvocation]) -> Result<(), BoundsError> {
        for (index, invocation) in invocations.iter().enumerate() {
            let Some(point) = invocation.position.as_ref().and_then(Position::coordinates) else {
                continue;
            };

            if !self.contains(point) {
                return Err(BoundsError::OutOfWorkspace {
                    position: index + 1,
                    target: invocation.target.clone(),
                    x: point.x(),
                    y: point.y(),
                    z: point.z(),
                });
            }
        }

        Ok(())
    }
}
