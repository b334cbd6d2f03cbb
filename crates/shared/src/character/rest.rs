//! Character JSON:API attributes.

use serde::{Deserialize, Serialize};

pub const CHARACTER_RESOURCE: &str = "characters";

/// Attributes of a `characters` resource. The id travels on the resource.
///
/// Every field defaults to zero when absent; PATCH treats zero values as
/// "leave unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterRestModel {
    pub account_id: u32,
    pub world_id: u8,
    pub name: String,
    pub level: u8,
    pub experience: u32,
    pub gachapon_experience: u32,
    pub strength: u16,
    pub dexterity: u16,
    pub intelligence: u16,
    pub luck: u16,
    pub hp: u16,
    pub max_hp: u16,
    pub mp: u16,
    pub max_mp: u16,
    pub meso: u32,
    pub hp_mp_used: u16,
    pub job_id: u16,
    pub skin_color: u8,
    pub gender: u8,
    pub fame: i16,
    pub hair: u32,
    pub face: u32,
    pub ap: u16,
    pub sp: String,
    pub map_id: u32,
    pub spawn_point: u32,
    pub gm: i32,
    pub x: i16,
    pub y: i16,
    pub stance: u8,
}
