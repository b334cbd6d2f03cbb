//! Learned skills and the skill ids the growth tables consult.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WARRIOR_IMPROVED_MAX_HP_INCREASE: u32 = 1_000_001;
pub const WHITE_KNIGHT_IMPROVING_MP_RECOVERY: u32 = 1_210_000;
pub const MAGICIAN_IMPROVED_MAX_MP_INCREASE: u32 = 2_000_001;
pub const BRAWLER_IMPROVE_MAX_HP: u32 = 5_100_000;
pub const DAWN_WARRIOR_1_IMPROVED_MAX_HP_INCREASE: u32 = 11_000_000;
pub const DAWN_WARRIOR_3_IMPROVED_MP_RECOVERY: u32 = 11_110_000;
pub const BLAZE_WIZARD_1_IMPROVED_MAX_MP_INCREASE: u32 = 12_000_000;
pub const THUNDER_BREAKER_2_IMPROVED_MAX_HP_INCREASE: u32 = 15_100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: u32,
    pub level: u8,
    pub master_level: u8,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl Skill {
    pub fn new(id: u32, level: u8) -> Self {
        Self {
            id,
            level,
            master_level: 0,
            expiration: None,
        }
    }

    pub fn with_master_level(mut self, master_level: u8) -> Self {
        self.master_level = master_level;
        self
    }
}

/// Numeric effect values of a skill at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillEffect {
    pub x: i16,
    pub y: i16,
}
