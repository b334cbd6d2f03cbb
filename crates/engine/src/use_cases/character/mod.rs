//! Character use cases.
//!
//! Every mutation follows the same shape:
//! 1. Load the character for the tenant
//! 2. Compute a change set and persist it
//! 3. Stage status events in a [`MessageBuffer`]
//! 4. Flush the buffer only after the write succeeded
//!
//! Growth (stat gains on level up and job advancement, AP and SP spending)
//! lives in [`CharacterGrowth`]; movement folding in [`MoveCharacter`].

use std::sync::Arc;

use atlas_domain::{Character, CharacterId, DomainError, Stat};
use atlas_shared::character::StatChangedBody;
use atlas_shared::{StatusEvent, StatusEventBody, Topic};
use uuid::Uuid;

use crate::infrastructure::message_buffer::MessageBuffer;
use crate::infrastructure::ports::{PeerError, ProducerError, RepoError};

mod growth;
mod movement;
mod processor;

pub use growth::{ability, CharacterGrowth};
pub use movement::MoveCharacter;
pub use processor::{is_valid_name_format, CharacterPatch, CharacterProcessor};

/// Character use case errors.
///
/// The validation variants render as short stable strings that HTTP callers
/// match on.
#[derive(Debug, thiserror::Error)]
pub enum CharacterError {
    #[error("invalid or duplicate name")]
    InvalidName,
    #[error("invalid hair ID")]
    InvalidHair,
    #[error("invalid face ID")]
    InvalidFace,
    #[error("invalid gender value")]
    InvalidGender,
    #[error("invalid skin color value")]
    InvalidSkinColor,
    #[error("invalid GM value")]
    InvalidGm,
    #[error("invalid map ID or character cannot access this map")]
    InvalidMap,
    #[error("blocked name")]
    BlockedName,
    #[error("invalid level")]
    InvalidLevel,
    #[error("not enough ap")]
    NotEnoughAp,
    #[error("invalid ability")]
    InvalidAbility,
    #[error("not enough sp")]
    NotEnoughSp,
    #[error("unable to locate job from skill {0}")]
    UnknownSkillJob(u32),
    #[error("character {0} not found")]
    NotFound(CharacterId),
    #[error("meso change for character {0} would overflow")]
    MesoOverflow(CharacterId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Producer(#[from] ProducerError),
}

impl CharacterError {
    /// Errors caused by the caller's input rather than by the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CharacterError::InvalidName
                | CharacterError::InvalidHair
                | CharacterError::InvalidFace
                | CharacterError::InvalidGender
                | CharacterError::InvalidSkinColor
                | CharacterError::InvalidGm
                | CharacterError::InvalidMap
                | CharacterError::BlockedName
                | CharacterError::InvalidLevel
        )
    }
}

/// Stages one status event keyed by the character id.
pub(crate) fn stage_status(
    buffer: &mut MessageBuffer,
    transaction_id: Uuid,
    character: &Character,
    body: StatusEventBody,
) -> Result<(), ProducerError> {
    let event = StatusEvent::new(
        transaction_id,
        character.id().value(),
        character.world_id().value(),
        body,
    );
    buffer.put_json(Topic::CharacterStatus, character.id(), &event)
}

pub(crate) fn stage_stats(
    buffer: &mut MessageBuffer,
    transaction_id: Uuid,
    character: &Character,
    channel_id: u8,
    stats: Vec<Stat>,
) -> Result<(), ProducerError> {
    stage_status(
        buffer,
        transaction_id,
        character,
        StatusEventBody::StatChanged(StatChangedBody::new(channel_id, stats)),
    )
}

/// Container for character use cases.
pub struct CharacterUseCases {
    pub processor: Arc<CharacterProcessor>,
    pub growth: Arc<CharacterGrowth>,
    pub movement: Arc<MoveCharacter>,
}

impl CharacterUseCases {
    pub fn new(
        processor: Arc<CharacterProcessor>,
        growth: Arc<CharacterGrowth>,
        movement: Arc<MoveCharacter>,
    ) -> Self {
        Self {
            processor,
            growth,
            movement,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::{Arc, Mutex};

    use atlas_domain::{Tenant, TenantId};
    use atlas_shared::{CharacterCommand, DropCommand, StatusEvent, Topic};
    use serde::de::DeserializeOwned;

    use crate::infrastructure::ports::{Message, MockProducerPort};

    pub type Sent = Arc<Mutex<Vec<(Topic, Message)>>>;

    pub fn tenant() -> Tenant {
        Tenant::new(TenantId::new(), "GMS", 83, 1)
    }

    /// A producer that records every message it is handed.
    pub fn recording_producer() -> (MockProducerPort, Sent) {
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let mut producer = MockProducerPort::new();
        producer.expect_send().returning(move |_, topic, messages| {
            let mut sink = sink.lock().expect("sent");
            sink.extend(messages.into_iter().map(|m| (topic, m)));
            Ok(())
        });
        (producer, sent)
    }

    fn decode<T: DeserializeOwned>(sent: &Sent, topic: Topic) -> Vec<T> {
        sent.lock()
            .expect("sent")
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, m)| serde_json::from_slice(&m.value).expect("decode"))
            .collect()
    }

    pub fn statuses(sent: &Sent) -> Vec<StatusEvent> {
        decode(sent, Topic::CharacterStatus)
    }

    pub fn commands(sent: &Sent) -> Vec<CharacterCommand> {
        decode(sent, Topic::CharacterCommand)
    }

    pub fn drops(sent: &Sent) -> Vec<DropCommand> {
        decode(sent, Topic::DropCommand)
    }
}
