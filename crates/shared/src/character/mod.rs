//! Character service messages and documents.

mod commands;
mod events;
mod movement;
mod rest;

pub use commands::{
    ApDistribution, AwardExperienceBody, AwardLevelBody, ChangeChannelBody, ChangeHpMpBody,
    ChangeJobBody, ChangeMapBody, ChangeStyleBody, CharacterCommand, CommandBody,
    CreateCharacterBody, FieldBody, RequestChangeFameBody, RequestChangeMesoBody,
    RequestDistributeApBody, RequestDistributeSpBody, RequestDropMesoBody,
    RequestPickUpMesoBody,
};
pub use events::{
    ActorChangedBody, ChannelChangedBody, CreatedBody, CreationFailedBody, DeletedBody,
    ErrorBody, ErrorDetail, ExperienceChangedBody, ExperienceDistribution, FaceChangedBody,
    FieldEventBody, GenderChangedBody, GmChangedBody, HairChangedBody, JobChangedBody,
    LevelChangedBody, MapChangedBody, NameChangedBody, SkinColorChangedBody, StatChangedBody,
    StatusEvent, StatusEventBody, ERROR_NOT_ENOUGH_MESO,
};
pub use movement::{Movement, MovementCommand, MovementElement, MovementSummary};
pub use rest::{CharacterRestModel, CHARACTER_RESOURCE};
