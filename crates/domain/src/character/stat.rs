//! Stat names carried by `STAT_CHANGED` events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stat {
    Skin,
    Face,
    Hair,
    Level,
    Job,
    Strength,
    Dexterity,
    Intelligence,
    Luck,
    Hp,
    MaxHp,
    Mp,
    MaxMp,
    AvailableAp,
    AvailableSp,
    Experience,
    Fame,
    Meso,
    GachaponExperience,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Skin => "SKIN",
            Stat::Face => "FACE",
            Stat::Hair => "HAIR",
            Stat::Level => "LEVEL",
            Stat::Job => "JOB",
            Stat::Strength => "STRENGTH",
            Stat::Dexterity => "DEXTERITY",
            Stat::Intelligence => "INTELLIGENCE",
            Stat::Luck => "LUCK",
            Stat::Hp => "HP",
            Stat::MaxHp => "MAX_HP",
            Stat::Mp => "MP",
            Stat::MaxMp => "MAX_MP",
            Stat::AvailableAp => "AVAILABLE_AP",
            Stat::AvailableSp => "AVAILABLE_SP",
            Stat::Experience => "EXPERIENCE",
            Stat::Fame => "FAME",
            Stat::Meso => "MESO",
            Stat::GachaponExperience => "GACHAPON_EXPERIENCE",
        }
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
