//! Execution-environment boundary.

use async_trait::async_trait;
use thiserror::Error;

use crate::lowering::PrimitiveInvocation;

/// The simulator or hardware driver that actually performs primitives.
///
/// Implementations look the primitive up by `invocation.target` and report failures as text.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    async fn invoke(&self, invocation: &PrimitiveInvocation) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Primitive '{target}' failed at step {position}: {reason}")]
pub struct DispatchError {
    pub position: usize,
    pub target: String,
    pub reason: String,
}

/// Invokes each primitive in order, stopping at the first failure.
///
/// Returns the number of primitives executed.
#[tracing::instrument(skip_all, fields(invocations = invocations.len()))]
pub async fn dispatch<E>(
    env: &E,
    invocations: &[PrimitiveInvocation],
) -> Result<usize, DispatchError>
where
    E: ExecutionEnvironment + ?Sized,
{
    for (index, invocation) in invocations.iter().enumerate() {
        let position = index + 1;
        tracing::debug!(step = position, target = %invocation.target, "invoking primitive");

        if let Err(reason) = env.invoke(invocation).await {
            tracing::error!(step = position, target = %invocation.target, %reason, "primitive failed");
            return Err(DispatchError {
                position,
                target: invocation.target.clone(),
                reason,
            });
        }
    }

    Ok(invocations.len())
}
