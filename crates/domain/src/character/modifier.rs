//! Column-level change sets for characters.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::skill::Skill;
use crate::ids::MapId;

/// One persisted column of a character row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Name,
    Level,
    Experience,
    GachaponExperience,
    JobId,
    Ap,
    Sp,
    Strength,
    Dexterity,
    Intelligence,
    Luck,
    Hp,
    MaxHp,
    Mp,
    MaxMp,
    HpMpUsed,
    Meso,
    Fame,
    Gm,
    SkinColor,
    Gender,
    Hair,
    Face,
    MapId,
    SpawnPoint,
    Skills,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single column assignment. A change set is a slice of these, applied in
/// order against the current record.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Name(String),
    Level(u8),
    Experience(u32),
    GachaponExperience(u32),
    Job(JobId),
    Ap(u16),
    Sp { book: usize, amount: u32 },
    Strength(u16),
    Dexterity(u16),
    Intelligence(u16),
    Luck(u16),
    Hp(u16),
    MaxHp(u16),
    Mp(u16),
    MaxMp(u16),
    HpMpUsed(u16),
    Meso(u32),
    Fame(i16),
    Gm(i32),
    SkinColor(u8),
    Gender(u8),
    Hair(u32),
    Face(u32),
    Map(MapId),
    SpawnPoint(u32),
    Skill(Skill),
}

impl Modifier {
    pub fn column(&self) -> Column {
        match self {
            Modifier::Name(_) => Column::Name,
            Modifier::Level(_) => Column::Level,
            Modifier::Experience(_) => Column::Experience,
            Modifier::GachaponExperience(_) => Column::GachaponExperience,
            Modifier::Job(_) => Column::JobId,
            Modifier::Ap(_) => Column::Ap,
            Modifier::Sp { .. } => Column::Sp,
            Modifier::Strength(_) => Column::Strength,
            Modifier::Dexterity(_) => Column::Dexterity,
            Modifier::Intelligence(_) => Column::Intelligence,
            Modifier::Luck(_) => Column::Luck,
            Modifier::Hp(_) => Column::Hp,
            Modifier::MaxHp(_) => Column::MaxHp,
            Modifier::Mp(_) => Column::Mp,
            Modifier::MaxMp(_) => Column::MaxMp,
            Modifier::HpMpUsed(_) => Column::HpMpUsed,
            Modifier::Meso(_) => Column::Meso,
            Modifier::Fame(_) => Column::Fame,
            Modifier::Gm(_) => Column::Gm,
            Modifier::SkinColor(_) => Column::SkinColor,
            Modifier::Gender(_) => Column::Gender,
            Modifier::Hair(_) => Column::Hair,
            Modifier::Face(_) => Column::Face,
            Modifier::Map(_) => Column::MapId,
            Modifier::SpawnPoint(_) => Column::SpawnPoint,
            Modifier::Skill(_) => Column::Skills,
        }
    }
}
