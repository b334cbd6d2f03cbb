//! Saga status events published by the orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure reasons the orchestrator reports and the conversation engine
/// routes on.
pub mod reason {
    pub const VALIDATION_FAILED: &str = "Validation failed";
    pub const CAPACITY_FULL: &str = "CAPACITY_FULL";
    pub const ALREADY_IN_TRANSIT: &str = "ALREADY_IN_TRANSIT";
    pub const ROUTE_NOT_FOUND: &str = "ROUTE_NOT_FOUND";
    pub const SERVICE_ERROR: &str = "SERVICE_ERROR";
    pub const NOT_IN_PARTY: &str = "NOT_IN_PARTY";
    pub const NOT_LEADER: &str = "NOT_LEADER";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStatusEvent {
    pub transaction_id: Uuid,
    #[serde(flatten)]
    pub body: SagaStatusBody,
}

impl SagaStatusEvent {
    pub fn completed(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            body: SagaStatusBody::Completed(CompletedBody {}),
        }
    }

    pub fn failed(
        transaction_id: Uuid,
        reason: impl Into<String>,
        failed_step: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            body: SagaStatusBody::Failed(FailedBody {
                reason: reason.into(),
                failed_step: failed_step.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatusBody {
    Completed(CompletedBody),
    Failed(FailedBody),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletedBody {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBody {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub failed_step: String,
}
