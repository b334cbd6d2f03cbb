//! Sagas: ordered, compensable cross-service transactions.
//!
//! This crate only builds sagas. Orchestration happens elsewhere; the engine
//! hands the built value to a saga port and later reacts to status events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, CharacterId, MapId, TransactionId, WorldId};
use crate::validation::ConditionInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaType {
    InventoryTransaction,
    QuestReward,
    TradeTransaction,
    GachaponTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    #[serde(rename = "completed")]
    Succeeded,
    Failed,
    Compensating,
    Compensated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Saga {
    pub transaction_id: TransactionId,
    pub saga_type: SagaType,
    pub initiated_by: String,
    pub steps: Vec<Step>,
}

impl Saga {
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn is_failing(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// The first step still waiting to run.
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status == StepStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(flatten)]
    pub action: Action,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Step action and its payload, encoded as `"action"` + `"payload"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Action {
    AwardInventory(AwardItemPayload),
    AwardMesos(AwardMesosPayload),
    AwardExperience(AwardExperiencePayload),
    AwardLevel(AwardLevelPayload),
    AwardFame(AwardFamePayload),
    WarpToPortal(WarpToPortalPayload),
    WarpToRandomPortal(WarpToRandomPortalPayload),
    ChangeJob(ChangeJobPayload),
    ChangeHair(ChangeStylePayload),
    ChangeFace(ChangeStylePayload),
    ChangeSkin(ChangeStylePayload),
    CreateSkill(SkillPayload),
    UpdateSkill(SkillPayload),
    DestroyAsset(DestroyAssetPayload),
    ValidateCharacterState(ValidateCharacterStatePayload),
    RegisterPartyQuest(RegisterPartyQuestPayload),
    EnterPartyQuestBonus(EnterPartyQuestBonusPayload),
    StartInstanceTransport(StartInstanceTransportPayload),
    SelectGachaponReward(SelectGachaponRewardPayload),
    CompleteQuest(CompleteQuestPayload),
    StartQuest(StartQuestPayload),
    SendMessage(SendMessagePayload),
    ApplyConsumableEffect(ApplyConsumableEffectPayload),
    ShowStorage(ShowStoragePayload),
    GainCloseness(GainClosenessPayload),
    SpawnMonster(SpawnMonsterPayload),
    IncreaseBuddyCapacity(IncreaseBuddyCapacityPayload),
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub template_id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardItemPayload {
    pub character_id: CharacterId,
    pub item: ItemPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardMesosPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub actor_id: u32,
    pub actor_type: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDistribution {
    pub experience_type: String,
    pub amount: u32,
    #[serde(default)]
    pub attr1: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardExperiencePayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub distributions: Vec<ExperienceDistribution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardLevelPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub amount: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardFamePayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub amount: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpToPortalPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub field_id: MapId,
    pub portal_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub portal_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpToRandomPortalPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub field_id: MapId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeJobPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub job_id: u16,
}

/// Shared by hair, face and skin changes; skin colors fit in the low byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStylePayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub style_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPayload {
    pub character_id: CharacterId,
    pub skill_id: u32,
    pub level: u8,
    pub master_level: u8,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyAssetPayload {
    pub character_id: CharacterId,
    pub template_id: u32,
    pub quantity: u32,
    #[serde(default)]
    pub remove_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCharacterStatePayload {
    pub character_id: CharacterId,
    pub conditions: Vec<ConditionInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPartyQuestPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub map_id: MapId,
    pub quest_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterPartyQuestBonusPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInstanceTransportPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub route_name: String,
}

/// The orchestrator expands this into an asset award plus a win broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectGachaponRewardPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub gachapon_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteQuestPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub quest_id: u32,
    pub npc_id: u32,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuestPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub quest_id: u32,
    pub npc_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub message_type: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyConsumableEffectPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub item_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowStoragePayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub npc_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainClosenessPayload {
    pub pet_id: u32,
    pub amount: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnMonsterPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub map_id: MapId,
    pub monster_id: u32,
    pub x: i16,
    pub y: i16,
    #[serde(default)]
    pub team: i8,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseBuddyCapacityPayload {
    pub character_id: CharacterId,
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub amount: u8,
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent saga construction. Steps keep insertion order.
///
/// ```
/// use atlas_domain::saga::{Action, DestroyAssetPayload, SagaBuilder, SagaType, StepStatus};
/// use atlas_domain::CharacterId;
///
/// let saga = SagaBuilder::new(SagaType::InventoryTransaction, "NPC_9010000")
///     .add_step(
///         "destroy_ticket",
///         StepStatus::Pending,
///         Action::DestroyAsset(DestroyAssetPayload {
///             character_id: CharacterId::from_raw(1),
///             template_id: 5220000,
///             quantity: 1,
///             remove_all: false,
///         }),
///     )
///     .build(chrono::Utc::now());
/// assert_eq!(saga.steps.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SagaBuilder {
    transaction_id: TransactionId,
    saga_type: SagaType,
    initiated_by: String,
    steps: Vec<(String, StepStatus, Action)>,
}

impl SagaBuilder {
    pub fn new(saga_type: SagaType, initiated_by: impl Into<String>) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            saga_type,
            initiated_by: initiated_by.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn add_step(mut self, step_id: impl Into<String>, status: StepStatus, action: Action) -> Self {
        self.steps.push((step_id.into(), status, action));
        self
    }

    pub fn push_step(&mut self, step_id: impl Into<String>, status: StepStatus, action: Action) {
        self.steps.push((step_id.into(), status, action));
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stamps every step with `now`.
    pub fn build(self, now: DateTime<Utc>) -> Saga {
        Saga {
            transaction_id: self.transaction_id,
            saga_type: self.saga_type,
            initiated_by: self.initiated_by,
            steps: self
                .steps
                .into_iter()
                .map(|(step_id, status, action)| Step {
                    step_id,
                    status,
                    action,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character() -> CharacterId {
        CharacterId::from_raw(42)
    }

    #[test]
    fn builder_keeps_step_order_and_ids() {
        let id = TransactionId::new();
        let saga = SagaBuilder::new(SagaType::InventoryTransaction, "NPC_9010000")
            .with_transaction_id(id)
            .add_step(
                "destroy_material_4000313",
                StepStatus::Pending,
                Action::DestroyAsset(DestroyAssetPayload {
                    character_id: character(),
                    template_id: 4000313,
                    quantity: 6,
                    remove_all: false,
                }),
            )
            .add_step(
                "award_crafted_item",
                StepStatus::Pending,
                Action::AwardInventory(AwardItemPayload {
                    character_id: character(),
                    item: ItemPayload {
                        template_id: 1002000,
                        quantity: 3,
                    },
                }),
            )
            .build(Utc::now());

        assert_eq!(saga.transaction_id, id);
        let ids: Vec<&str> = saga.steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["destroy_material_4000313", "award_crafted_item"]);
        assert_eq!(saga.current_step().map(|s| s.step_id.as_str()), Some("destroy_material_4000313"));
        assert!(!saga.is_failing());
    }

    #[test]
    fn step_serializes_action_and_payload_side_by_side() {
        let saga = SagaBuilder::new(SagaType::GachaponTransaction, "NPC_1_gachapon")
            .add_step(
                "select_gachapon_reward",
                StepStatus::Pending,
                Action::SelectGachaponReward(SelectGachaponRewardPayload {
                    character_id: character(),
                    world_id: WorldId::from_raw(0),
                    gachapon_id: "henesys".into(),
                }),
            )
            .build(Utc::now());

        let value = serde_json::to_value(&saga).expect("serialize");
        assert_eq!(value["sagaType"], "gachapon_transaction");
        let step = &value["steps"][0];
        assert_eq!(step["action"], "select_gachapon_reward");
        assert_eq!(step["status"], "pending");
        assert_eq!(step["payload"]["gachaponId"], "henesys");

        let back: Saga = serde_json::from_value(value).expect("parse");
        assert_eq!(back, saga);
    }

    #[test]
    fn succeeded_uses_orchestrator_wording() {
        let json = serde_json::to_string(&StepStatus::Succeeded).expect("serialize");
        assert_eq!(json, "\"completed\"");
    }
}
