//! Commands to the drop service for meso drops and pick-ups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Drop type for mesos spawned by a character.
pub const DROP_TYPE_MESO: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropCommand {
    #[serde(default)]
    pub transaction_id: Uuid,
    pub world_id: u8,
    pub channel_id: u8,
    pub map_id: u32,
    #[serde(flatten)]
    pub body: DropCommandBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropCommandBody {
    SpawnFromCharacter(SpawnFromCharacterBody),
    RequestPickUp(RequestPickUpBody),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnFromCharacterBody {
    pub mesos: u32,
    pub drop_type: u8,
    pub x: i16,
    pub y: i16,
    pub owner_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPickUpBody {
    pub drop_id: u32,
    pub character_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_body_is_tagged() {
        let command = DropCommand {
            transaction_id: Uuid::nil(),
            world_id: 0,
            channel_id: 1,
            map_id: 100000000,
            body: DropCommandBody::SpawnFromCharacter(SpawnFromCharacterBody {
                mesos: 50,
                drop_type: DROP_TYPE_MESO,
                x: 10,
                y: -4,
                owner_id: 7,
            }),
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["type"], "SPAWN_FROM_CHARACTER");
        assert_eq!(json["body"]["dropType"], 2);
        assert_eq!(json["mapId"], 100000000);
    }
}
