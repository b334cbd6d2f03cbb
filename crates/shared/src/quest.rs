//! Quest JSON:API attributes for the data endpoints.

use atlas_domain::quest::{Quest, QuestActions, QuestRequirements};
use serde::{Deserialize, Serialize};

pub const QUEST_RESOURCE: &str = "quests";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestRestModel {
    pub name: String,
    pub parent: String,
    pub area: u32,
    pub order: u32,
    pub auto_start: bool,
    pub auto_pre_complete: bool,
    pub auto_complete: bool,
    pub time_limit: u32,
    pub time_limit2: u32,
    pub selected_mob: bool,
    pub summary: String,
    pub demand_summary: String,
    pub reward_summary: String,
    pub start_requirements: QuestRequirements,
    pub end_requirements: QuestRequirements,
    pub start_actions: QuestActions,
    pub end_actions: QuestActions,
}

impl From<&Quest> for QuestRestModel {
    fn from(quest: &Quest) -> Self {
        Self {
            name: quest.name.clone(),
            parent: quest.parent.clone(),
            area: quest.area,
            order: quest.order,
            auto_start: quest.auto_start,
            auto_pre_complete: quest.auto_pre_complete,
            auto_complete: quest.auto_complete,
            time_limit: quest.time_limit,
            time_limit2: quest.time_limit2,
            selected_mob: quest.selected_mob,
            summary: quest.summary.clone(),
            demand_summary: quest.demand_summary.clone(),
            reward_summary: quest.reward_summary.clone(),
            start_requirements: quest.start_requirements.clone(),
            end_requirements: quest.end_requirements.clone(),
            start_actions: quest.start_actions.clone(),
            end_actions: quest.end_actions.clone(),
        }
    }
}
