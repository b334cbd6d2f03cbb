//! Ports to collaborators outside the engine: the saga orchestrator, peer
//! services and the message transport.

use async_trait::async_trait;
use atlas_domain::conversation::cosmetic::{Appearance, CosmeticKind};
use atlas_domain::{
    CharacterId, ConditionInput, Field, MapId, Saga, SkillEffect, Tenant, ValidationVerdict,
};
use atlas_shared::{NpcTalkCommand, Topic};

use super::error::{PeerError, ProducerError, SagaError};

// =============================================================================
// Messaging
// =============================================================================

/// A keyed message ready for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: String,
    pub value: Vec<u8>,
}

impl Message {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Encodes `value` as JSON.
    pub fn json<T: serde::Serialize>(key: impl ToString, value: &T) -> Result<Self, ProducerError> {
        Ok(Self {
            key: key.to_string(),
            value: serde_json::to_vec(value)?,
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProducerPort: Send + Sync {
    /// Hands the messages to `topic` in order. Tenant headers travel with them.
    async fn send(
        &self,
        tenant: &Tenant,
        topic: Topic,
        messages: Vec<Message>,
    ) -> Result<(), ProducerError>;
}

// =============================================================================
// Saga orchestrator
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SagaPort: Send + Sync {
    async fn submit(&self, tenant: &Tenant, saga: Saga) -> Result<(), SagaError>;
}

// =============================================================================
// NPC talk
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NpcTalkPort: Send + Sync {
    async fn send(&self, tenant: &Tenant, command: NpcTalkCommand) -> Result<(), PeerError>;
}

// =============================================================================
// Peer services
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ValidationPort: Send + Sync {
    async fn validate(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        conditions: Vec<ConditionInput>,
    ) -> Result<ValidationVerdict, PeerError>;
}

/// Appearance reads and immediate style changes on the character service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppearancePort: Send + Sync {
    async fn appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
    ) -> Result<Appearance, PeerError>;

    async fn change_appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        field: Field,
        kind: CosmeticKind,
        style_id: u32,
    ) -> Result<(), PeerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryPort: Send + Sync {
    async fn has_item(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        item_id: u32,
    ) -> Result<bool, PeerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PetPort: Send + Sync {
    /// Id of the pet in spawn slot `slot`.
    async fn pet_id_by_slot(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        slot: i8,
    ) -> Result<u32, PeerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MapPort: Send + Sync {
    async fn player_count(&self, tenant: &Tenant, field: Field) -> Result<u32, PeerError>;

    /// Whether the map exists and a character of `level` may enter it.
    async fn can_enter(&self, tenant: &Tenant, map_id: MapId, level: u8) -> Result<bool, PeerError>;
}

/// Skill effect data from the game data service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkillDataPort: Send + Sync {
    async fn effect(&self, tenant: &Tenant, skill_id: u32, level: u8) -> Result<SkillEffect, PeerError>;
}
