//! Character-state conditions checked by the validation service.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const CONDITION_JOB: &str = "jobId";
pub const CONDITION_MESO: &str = "meso";
pub const CONDITION_MAP: &str = "mapId";
pub const CONDITION_FAME: &str = "fame";
pub const CONDITION_ITEM: &str = "item";
pub const CONDITION_BUDDY_CAPACITY: &str = "buddyCapacity";
pub const CONDITION_QUEST_STATUS: &str = "questStatus";

/// A fully resolved condition: placeholders and arithmetic are already
/// evaluated into plain numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionInput {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub operator: String,
    pub value: i32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub reference_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step: String,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub world_id: u8,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub channel_id: u8,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_equipped: bool,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_u8(v: &u8) -> bool {
    *v == 0
}

impl ConditionInput {
    pub fn new(condition_type: impl Into<String>, operator: impl Into<String>, value: i32) -> Self {
        Self {
            condition_type: condition_type.into(),
            operator: operator.into(),
            value,
            ..Self::default()
        }
    }

    pub fn with_reference_id(mut self, reference_id: u32) -> Self {
        self.reference_id = reference_id;
        self
    }

    /// Item and quest-status conditions are meaningless without a reference.
    pub fn ensure_well_formed(&self) -> Result<(), DomainError> {
        if self.condition_type.is_empty() {
            return Err(DomainError::validation("condition type is required"));
        }
        if self.operator.is_empty() {
            return Err(DomainError::validation("operator is required"));
        }
        if self.reference_id == 0 {
            if self.condition_type == CONDITION_ITEM {
                return Err(DomainError::validation(
                    "referenceId is required for item conditions",
                ));
            }
            if self.condition_type == CONDITION_QUEST_STATUS {
                return Err(DomainError::validation(
                    "referenceId is required for quest status conditions",
                ));
            }
        }
        Ok(())
    }
}

/// Pass/fail answer for one group of conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub passed: bool,
    #[serde(default)]
    pub details: Vec<String>,
}

impl ValidationVerdict {
    pub fn passed() -> Self {
        Self {
            passed: true,
            details: Vec::new(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: vec![detail.into()],
        }
    }
}
