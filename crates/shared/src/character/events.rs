//! Character status events.
//!
//! Every event is keyed by the character id and wrapped in the same envelope:
//! `{transactionId, characterId, worldId, type, body}`.

use atlas_domain::Stat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ERROR_NOT_ENOUGH_MESO: &str = "NOT_ENOUGH_MESO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[serde(default)]
    pub transaction_id: Uuid,
    pub character_id: u32,
    pub world_id: u8,
    #[serde(flatten)]
    pub body: StatusEventBody,
}

impl StatusEvent {
    pub fn new(transaction_id: Uuid, character_id: u32, world_id: u8, body: StatusEventBody) -> Self {
        Self {
            transaction_id,
            character_id,
            world_id,
            body,
        }
    }

    /// The `type` discriminator as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        self.body.type_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusEventBody {
    Created(CreatedBody),
    CreationFailed(CreationFailedBody),
    Login(FieldEventBody),
    Logout(FieldEventBody),
    ChannelChanged(ChannelChangedBody),
    MapChanged(MapChangedBody),
    JobChanged(JobChangedBody),
    ExperienceChanged(ExperienceChangedBody),
    LevelChanged(LevelChangedBody),
    MesoChanged(ActorChangedBody),
    FameChanged(ActorChangedBody),
    NameChanged(NameChangedBody),
    HairChanged(HairChangedBody),
    FaceChanged(FaceChangedBody),
    GenderChanged(GenderChangedBody),
    SkinColorChanged(SkinColorChangedBody),
    GmChanged(GmChangedBody),
    StatChanged(StatChangedBody),
    Deleted(DeletedBody),
    Error(ErrorBody),
}

impl StatusEventBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            StatusEventBody::Created(_) => "CREATED",
            StatusEventBody::CreationFailed(_) => "CREATION_FAILED",
            StatusEventBody::Login(_) => "LOGIN",
            StatusEventBody::Logout(_) => "LOGOUT",
            StatusEventBody::ChannelChanged(_) => "CHANNEL_CHANGED",
            StatusEventBody::MapChanged(_) => "MAP_CHANGED",
            StatusEventBody::JobChanged(_) => "JOB_CHANGED",
            StatusEventBody::ExperienceChanged(_) => "EXPERIENCE_CHANGED",
            StatusEventBody::LevelChanged(_) => "LEVEL_CHANGED",
            StatusEventBody::MesoChanged(_) => "MESO_CHANGED",
            StatusEventBody::FameChanged(_) => "FAME_CHANGED",
            StatusEventBody::NameChanged(_) => "NAME_CHANGED",
            StatusEventBody::HairChanged(_) => "HAIR_CHANGED",
            StatusEventBody::FaceChanged(_) => "FACE_CHANGED",
            StatusEventBody::GenderChanged(_) => "GENDER_CHANGED",
            StatusEventBody::SkinColorChanged(_) => "SKIN_COLOR_CHANGED",
            StatusEventBody::GmChanged(_) => "GM_CHANGED",
            StatusEventBody::StatChanged(_) => "STAT_CHANGED",
            StatusEventBody::Deleted(_) => "DELETED",
            StatusEventBody::Error(_) => "ERROR",
        }
    }
}

// =============================================================================
// Bodies
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBody {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationFailedBody {
    pub name: String,
    pub message: String,
}

/// Login and logout carry where the character was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEventBody {
    pub channel_id: u8,
    pub map_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelChangedBody {
    pub channel_id: u8,
    pub old_channel_id: u8,
    pub map_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapChangedBody {
    pub channel_id: u8,
    pub old_map_id: u32,
    pub target_map_id: u32,
    pub target_portal_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobChangedBody {
    pub channel_id: u8,
    pub job_id: u16,
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
pub struct ExperienceChangedBody {
    pub channel_id: u8,
    pub current: u32,
    pub distributions: Vec<ExperienceDistribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChangedBody {
    pub channel_id: u8,
    pub amount: u8,
    pub current: u8,
}

/// Meso and fame changes name who caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorChangedBody {
    pub actor_id: u32,
    pub actor_type: String,
    pub amount: i32,
}

/// Defines a before/after body whose wire fields are `old<Field>`/`new<Field>`.
macro_rules! changed_body {
    ($name:ident, $ty:ty, $old:ident, $new:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            pub $old: $ty,
            pub $new: $ty,
        }

        impl $name {
            pub fn new($old: $ty, $new: $ty) -> Self {
                Self { $old, $new }
            }
        }
    };
}

changed_body!(NameChangedBody, String, old_name, new_name);
changed_body!(HairChangedBody, u32, old_hair, new_hair);
changed_body!(FaceChangedBody, u32, old_face, new_face);
changed_body!(GenderChangedBody, u8, old_gender, new_gender);
changed_body!(SkinColorChangedBody, u8, old_skin_color, new_skin_color);
changed_body!(GmChangedBody, bool, old_gm, new_gm);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatChangedBody {
    pub channel_id: u8,
    pub excl_request_sent: bool,
    pub updates: Vec<Stat>,
}

impl StatChangedBody {
    pub fn new(channel_id: u8, updates: Vec<Stat>) -> Self {
        Self {
            channel_id,
            excl_request_sent: true,
            updates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletedBody {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub body: ErrorDetail,
}

impl ErrorBody {
    pub fn not_enough_meso(amount: i32) -> Self {
        Self {
            error: ERROR_NOT_ENOUGH_MESO.to_string(),
            body: ErrorDetail { amount },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_places_type_beside_body() {
        let event = StatusEvent::new(
            Uuid::nil(),
            7,
            1,
            StatusEventBody::LevelChanged(LevelChangedBody {
                channel_id: 2,
                amount: 1,
                current: 25,
            }),
        );
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["characterId"], 7);
        assert_eq!(json["type"], "LEVEL_CHANGED");
        assert_eq!(json["body"]["current"], 25);
        assert_eq!(event.event_type(), "LEVEL_CHANGED");

        let back: StatusEvent = serde_json::from_value(json).expect("parse");
        assert_eq!(back, event);
    }

    #[test]
    fn not_enough_meso_nests_amount() {
        let body = StatusEventBody::Error(ErrorBody::not_enough_meso(-200));
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["body"]["error"], "NOT_ENOUGH_MESO");
        assert_eq!(json["body"]["body"]["amount"], -200);
    }

    #[test]
    fn stat_changed_uses_stat_names() {
        let body = StatChangedBody::new(0, vec![Stat::Level, Stat::MaxHp]);
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["updates"][0], "LEVEL");
        assert_eq!(json["updates"][1], "MAX_HP");
        assert_eq!(json["exclRequestSent"], true);
    }

    #[test]
    fn gm_change_is_reported_as_flags() {
        let body = StatusEventBody::GmChanged(GmChangedBody::new(false, true));
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["type"], "GM_CHANGED");
        assert_eq!(json["body"]["oldGm"], false);
        assert_eq!(json["body"]["newGm"], true);
    }

    #[test]
    fn deleted_body_is_an_empty_object() {
        let json = serde_json::to_value(StatusEventBody::Deleted(DeletedBody {})).expect("serialize");
        assert_eq!(json["body"], serde_json::json!({}));
    }
}
