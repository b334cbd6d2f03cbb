//! Commands accepted on the character command topic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::ExperienceDistribution;

/// `{transactionId, characterId, worldId, type, body}`. Creation carries a
/// zero character id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCommand {
    #[serde(default)]
    pub transaction_id: Uuid,
    #[serde(default)]
    pub character_id: u32,
    pub world_id: u8,
    #[serde(flatten)]
    pub body: CommandBody,
}

impl CharacterCommand {
    pub fn new(character_id: u32, world_id: u8, body: CommandBody) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            character_id,
            world_id,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandBody {
    CreateCharacter(CreateCharacterBody),
    RequestChangeMeso(RequestChangeMesoBody),
    RequestDropMeso(RequestDropMesoBody),
    RequestPickUpMeso(RequestPickUpMesoBody),
    RequestChangeFame(RequestChangeFameBody),
    RequestDistributeAp(RequestDistributeApBody),
    RequestDistributeSp(RequestDistributeSpBody),
    #[serde(rename = "CHANGE_HP")]
    ChangeHp(ChangeHpMpBody),
    #[serde(rename = "CHANGE_MP")]
    ChangeMp(ChangeHpMpBody),
    AwardExperience(AwardExperienceBody),
    AwardLevel(AwardLevelBody),
    ChangeJob(ChangeJobBody),
    ChangeHair(ChangeStyleBody),
    ChangeFace(ChangeStyleBody),
    ChangeSkin(ChangeStyleBody),
    ChangeMap(ChangeMapBody),
    ChangeChannel(ChangeChannelBody),
    Login(FieldBody),
    Logout(FieldBody),
}

impl CommandBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            CommandBody::CreateCharacter(_) => "CREATE_CHARACTER",
            CommandBody::RequestChangeMeso(_) => "REQUEST_CHANGE_MESO",
            CommandBody::RequestDropMeso(_) => "REQUEST_DROP_MESO",
            CommandBody::RequestPickUpMeso(_) => "REQUEST_PICK_UP_MESO",
            CommandBody::RequestChangeFame(_) => "REQUEST_CHANGE_FAME",
            CommandBody::RequestDistributeAp(_) => "REQUEST_DISTRIBUTE_AP",
            CommandBody::RequestDistributeSp(_) => "REQUEST_DISTRIBUTE_SP",
            CommandBody::ChangeHp(_) => "CHANGE_HP",
            CommandBody::ChangeMp(_) => "CHANGE_MP",
            CommandBody::AwardExperience(_) => "AWARD_EXPERIENCE",
            CommandBody::AwardLevel(_) => "AWARD_LEVEL",
            CommandBody::ChangeJob(_) => "CHANGE_JOB",
            CommandBody::ChangeHair(_) => "CHANGE_HAIR",
            CommandBody::ChangeFace(_) => "CHANGE_FACE",
            CommandBody::ChangeSkin(_) => "CHANGE_SKIN",
            CommandBody::ChangeMap(_) => "CHANGE_MAP",
            CommandBody::ChangeChannel(_) => "CHANGE_CHANNEL",
            CommandBody::Login(_) => "LOGIN",
            CommandBody::Logout(_) => "LOGOUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharacterBody {
    pub account_id: u32,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u8,
    pub strength: u16,
    pub dexterity: u16,
    pub intelligence: u16,
    pub luck: u16,
    pub max_hp: u16,
    pub max_mp: u16,
    #[serde(default)]
    pub job_id: u16,
    #[serde(default)]
    pub gender: u8,
    pub hair: u32,
    pub face: u32,
    #[serde(default)]
    pub skin_color: u8,
    pub map_id: u32,
    #[serde(default)]
    pub gm: i32,
}

fn default_level() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChangeMesoBody {
    #[serde(default)]
    pub actor_id: u32,
    #[serde(default)]
    pub actor_type: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDropMesoBody {
    pub channel_id: u8,
    pub map_id: u32,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPickUpMesoBody {
    pub channel_id: u8,
    pub map_id: u32,
    pub drop_id: u32,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChangeFameBody {
    #[serde(default)]
    pub actor_id: u32,
    #[serde(default)]
    pub actor_type: String,
    pub amount: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApDistribution {
    pub ability: String,
    pub amount: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDistributeApBody {
    pub distributions: Vec<ApDistribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDistributeSpBody {
    pub skill_id: u32,
    pub amount: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHpMpBody {
    pub channel_id: u8,
    pub amount: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardExperienceBody {
    pub channel_id: u8,
    pub distributions: Vec<ExperienceDistribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardLevelBody {
    pub channel_id: u8,
    pub amount: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeJobBody {
    pub channel_id: u8,
    pub job_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStyleBody {
    pub channel_id: u8,
    pub style_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMapBody {
    pub channel_id: u8,
    pub map_id: u32,
    #[serde(default)]
    pub portal_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeChannelBody {
    pub channel_id: u8,
    pub old_channel_id: u8,
    pub map_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldBody {
    pub channel_id: u8,
    pub map_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_level_parses_from_peer_json() {
        let raw = r#"{
            "transactionId": "00000000-0000-0000-0000-000000000000",
            "characterId": 12,
            "worldId": 0,
            "type": "AWARD_LEVEL",
            "body": {"channelId": 3, "amount": 2}
        }"#;
        let command: CharacterCommand = serde_json::from_str(raw).expect("parse");
        assert_eq!(command.character_id, 12);
        assert_eq!(
            command.body,
            CommandBody::AwardLevel(AwardLevelBody {
                channel_id: 3,
                amount: 2
            })
        );
    }

    #[test]
    fn hp_change_keeps_short_type_name() {
        let body = CommandBody::ChangeHp(ChangeHpMpBody {
            channel_id: 1,
            amount: -30,
        });
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["type"], "CHANGE_HP");
        assert_eq!(body.type_name(), "CHANGE_HP");
    }

    #[test]
    fn create_defaults_to_level_one() {
        let raw = r#"{
            "worldId": 0,
            "type": "CREATE_CHARACTER",
            "body": {
                "accountId": 1000, "name": "Hero", "strength": 4, "dexterity": 4,
                "intelligence": 4, "luck": 4, "maxHp": 50, "maxMp": 5,
                "hair": 30000, "face": 20000, "mapId": 10000
            }
        }"#;
        let command: CharacterCommand = serde_json::from_str(raw).expect("parse");
        match command.body {
            CommandBody::CreateCharacter(body) => {
                assert_eq!(body.level, 1);
                assert_eq!(body.job_id, 0);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(command.character_id, 0);
    }
}
