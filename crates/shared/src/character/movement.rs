//! Movement messages and their position summary.

use serde::{Deserialize, Serialize};

pub const ELEMENT_NORMAL: &str = "NORMAL";
pub const ELEMENT_TELEPORT: &str = "TELEPORT";
pub const ELEMENT_START_FALL_DOWN: &str = "START_FALL_DOWN";
pub const ELEMENT_FLYING_BLOCK: &str = "FLYING_BLOCK";
pub const ELEMENT_JUMP: &str = "JUMP";
pub const ELEMENT_STAT_CHANGE: &str = "STAT_CHANGE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementCommand {
    pub world_id: u8,
    pub channel_id: u8,
    pub map_id: u32,
    pub character_id: u32,
    pub movement: Movement,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub start_x: i16,
    pub start_y: i16,
    #[serde(default)]
    pub elements: Vec<MovementElement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementElement {
    pub type_str: String,
    #[serde(default)]
    pub type_val: u8,
    #[serde(default)]
    pub start_x: i16,
    #[serde(default)]
    pub start_y: i16,
    #[serde(default)]
    pub move_action: u8,
    #[serde(default)]
    pub stat: u8,
    #[serde(default)]
    pub x: i16,
    #[serde(default)]
    pub y: i16,
    #[serde(default)]
    pub v_x: i16,
    #[serde(default)]
    pub v_y: i16,
    #[serde(default)]
    pub fh: i16,
    #[serde(default)]
    pub fh_fall_start: i16,
    #[serde(default)]
    pub x_offset: i16,
    #[serde(default)]
    pub y_offset: i16,
    #[serde(default)]
    pub time_elapsed: i16,
}

/// Where a movement left the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementSummary {
    pub x: i16,
    pub y: i16,
    pub stance: u8,
}

impl Movement {
    /// Folds the elements over a starting summary. Normal moves update the
    /// position and stance; jumps, teleports and fall starts only the stance.
    pub fn summarize(&self, from: MovementSummary) -> MovementSummary {
        self.elements.iter().fold(from, |mut acc, element| {
            match element.type_str.as_str() {
                ELEMENT_NORMAL => {
                    acc.x = element.x;
                    acc.y = element.y;
                    acc.stance = element.move_action;
                }
                ELEMENT_JUMP | ELEMENT_TELEPORT | ELEMENT_START_FALL_DOWN => {
                    acc.stance = element.move_action;
                }
                _ => {}
            }
            acc
        })
    }

    /// Summary starting from the movement's own start coordinates.
    pub fn summary(&self, stance: u8) -> MovementSummary {
        self.summarize(MovementSummary {
            x: self.start_x,
            y: self.start_y,
            stance,
        })
    }
}
