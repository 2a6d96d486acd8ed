//! Reasoning-service boundary.
//!
//! The [`Planner`] is the caller around the pure core: it refuses empty instructions, asks
//! the reasoning service for a plan, pulls the JSON payload out of the reply and validates
//! it. Retries and backoff live here and nowhere else.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PlanError;
use crate::plan::TaskPlan;
use crate::validator;

/// System prompt sent with every instruction.
pub const SYSTEM_PROMPT: &str = r#"You are a robotic task planning system. Convert natural language instructions
into structured task plans. Always respond with a single valid JSON object:
{
    "objective": "Brief description of the task",
    "action_sequence": [
        {
            "step": 1,
            "action": "action_name",
            "description": "What this step does",
            "parameters": {
                "position": [x, y, z],
                "object": "object_name"
            }
        }
    ],
    "potential_challenges": ["Anything that could make the task fail"]
}
Supported actions: move_to, pick_up, place."#;

/// Failure reported by a [`ReasoningService`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("reasoning service call failed: {0}")]
pub struct ServiceError(pub String);

/// The external natural-language reasoning service.
///
/// Implementations own transport, model selection and sampling parameters; the planner only
/// sees text in and text out.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, system_prompt: &str, instruction: &str)
        -> Result<String, ServiceError>;
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Empty instruction provided")]
    EmptyInstruction,

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Task planning failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<PlannerError>,
    },
}

/// How often and how patiently the planner re-asks the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_min: Duration::from_secs(4),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based): doubles from `backoff_min`,
    /// capped at `backoff_max`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.backoff_min
            .saturating_mul(1 << exponent)
            .clamp(self.backoff_min, self.backoff_max.max(self.backoff_min))
    }
}

/// Turns instructions into validated plans through a [`ReasoningService`].
#[derive(Debug)]
pub struct Planner<S> {
    service: S,
    policy: RetryPolicy,
}

impl<S: ReasoningService> Planner<S> {
    pub fn new(service: S) -> Self {
        Self::with_policy(service, RetryPolicy::default())
    }

    pub fn with_policy(service: S, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Plans `instruction`, retrying service and validation failures per the policy.
    #[tracing::instrument(skip_all, fields(instruction_len = instruction.len()))]
    pub async fn plan(&self, instruction: &str) -> Result<TaskPlan, PlannerError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(PlannerError::EmptyInstruction);
        }

        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(instruction).await {
                Ok(plan) => {
                    tracing::info!(attempt, steps = plan.len(), "task plan accepted");
                    return Ok(plan);
                }
                Err(err) if attempt >= attempts => {
                    tracing::error!(attempts, error = %err, "task planning failed");
                    return Err(PlannerError::RetriesExhausted {
                        attempts,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "task planning attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, instruction: &str) -> Result<TaskPlan, PlannerError> {
        let reply = self.service.complete(SYSTEM_PROMPT, instruction).await?;
        let plan = validator::validate(extract_payload(&reply))?;
        Ok(plan)
    }
}

/// Pulls the JSON payload out of a service reply that may wrap it in markdown or prose.
pub fn extract_payload(reply: &str) -> &str {
    if let Some(start) = reply.find("```json") {
        let body = &reply[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = reply.find("```") {
        let fenced = &reply[start + 3..];
        // Skip a language tag on the fence line.
        let body = fenced.find('\n').map_or(fenced, |nl| &fenced[nl + 1..]);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            return &reply[start..=end];
        }
    }

    reply.trim()
}
