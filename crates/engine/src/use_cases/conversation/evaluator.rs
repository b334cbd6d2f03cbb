//! Outcome condition evaluation.

use std::sync::Arc;

use atlas_domain::{Condition, ConditionInput, ContextMap, ConversationContext, Tenant};

use super::operations::OperationError;
use super::placeholder::{resolve, resolve_int};
use crate::infrastructure::ports::ValidationPort;

/// Resolves a condition against the context and asks the validation
/// service for a verdict.
pub struct ConditionEvaluator {
    validation: Arc<dyn ValidationPort>,
}

impl ConditionEvaluator {
    pub fn new(validation: Arc<dyn ValidationPort>) -> Self {
        Self { validation }
    }

    pub async fn evaluate(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        condition: &Condition,
    ) -> Result<bool, OperationError> {
        let input = to_input(condition, context.variables())?;
        tracing::debug!(
            character_id = %context.character_id(),
            condition_type = %input.condition_type,
            operator = %input.operator,
            value = input.value,
            reference_id = input.reference_id,
            "Evaluating condition"
        );

        let verdict = self
            .validation
            .validate(tenant, context.character_id(), vec![input])
            .await?;
        if !verdict.passed {
            tracing::debug!(
                character_id = %context.character_id(),
                details = ?verdict.details,
                "Condition not met"
            );
        }
        Ok(verdict.passed)
    }
}

/// Builds the wire condition. An empty reference id means none.
pub fn to_input(condition: &Condition, variables: &ContextMap) -> Result<ConditionInput, OperationError> {
    let value = resolve_int(&condition.value, variables)?;
    let value = i32::try_from(value).map_err(|_| OperationError::invalid("value", value, "out of range"))?;

    let mut input = ConditionInput::new(&condition.condition_type, &condition.operator, value);
    input.step = condition.step.clone();
    input.include_equipped = condition.include_equipped;

    if !condition.reference_id.is_empty() {
        let resolved = resolve(&condition.reference_id, variables)?;
        input.reference_id = resolved
            .trim()
            .parse()
            .map_err(|_| OperationError::invalid("referenceId", &resolved, "not a valid uint32"))?;
    }
    if !condition.world_id.is_empty() {
        input.world_id = small_id("worldId", &condition.world_id, variables)?;
    }
    if !condition.channel_id.is_empty() {
        input.channel_id = small_id("channelId", &condition.channel_id, variables)?;
    }
    Ok(input)
}

fn small_id(param: &'static str, raw: &str, variables: &ContextMap) -> Result<u8, OperationError> {
    let value = resolve_int(raw, variables)?;
    u8::try_from(value).map_err(|_| OperationError::invalid(param, value, "out of range"))
}
