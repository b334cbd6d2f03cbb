//! Quest definitions as served by the data endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestItem {
    pub id: u32,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestState {
    pub id: u32,
    pub state: u8,
}

/// What a character must satisfy to start or complete the quest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRequirements {
    #[serde(default)]
    pub npc_id: u32,
    #[serde(default)]
    pub level_min: u16,
    #[serde(default)]
    pub level_max: u16,
    #[serde(default)]
    pub fame_min: i16,
    #[serde(default)]
    pub meso_min: u32,
    #[serde(default)]
    pub meso_max: u32,
    #[serde(default)]
    pub jobs: Vec<u16>,
    #[serde(default)]
    pub quests: Vec<QuestState>,
    #[serde(default)]
    pub items: Vec<QuestItem>,
    #[serde(default)]
    pub mobs: Vec<QuestItem>,
    #[serde(default)]
    pub field_enter: Vec<u32>,
}

/// Rewards and side effects applied on start or completion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestActions {
    #[serde(default)]
    pub npc_id: u32,
    #[serde(default)]
    pub exp: u32,
    #[serde(default)]
    pub money: i32,
    #[serde(default)]
    pub fame: i16,
    #[serde(default)]
    pub items: Vec<QuestItem>,
    #[serde(default)]
    pub next_quest: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub area: u32,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_pre_complete: bool,
    #[serde(default)]
    pub auto_complete: bool,
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub time_limit2: u32,
    #[serde(default)]
    pub selected_mob: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub demand_summary: String,
    #[serde(default)]
    pub reward_summary: String,
    #[serde(default)]
    pub start_requirements: QuestRequirements,
    #[serde(default)]
    pub end_requirements: QuestRequirements,
    #[serde(default)]
    pub start_actions: QuestActions,
    #[serde(default)]
    pub end_actions: QuestActions,
}

impl Quest {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// A quest runs on a timer when either limit is set.
    pub fn is_timed(&self) -> bool {
        self.time_limit > 0 || self.time_limit2 > 0
    }
}
