// Port traits define the full contract - some methods only serve one adapter
#![allow(dead_code)]

//! Port traits for infrastructure boundaries.
//!
//! Use cases depend on these traits, never on adapters. Ports exist for:
//! - Tenant-scoped storage (characters, conversations, quests, key-value)
//! - The saga orchestrator and NPC talk channel
//! - Peer services (validation, appearance, inventory, pets, maps, skill data)
//! - Topic producers
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{
    CharacterQuery, CharacterRepo, ConversationRepo, KeyValueStore, MesoAdjustment, QuestRepo,
};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    AppearancePort, InventoryPort, MapPort, Message, NpcTalkPort, PetPort, ProducerPort,
    SagaPort, SkillDataPort, ValidationPort,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{MockCharacterRepo, MockConversationRepo, MockKeyValueStore, MockQuestRepo};

#[cfg(test)]
pub use external::{
    MockAppearancePort, MockInventoryPort, MockMapPort, MockNpcTalkPort, MockPetPort,
    MockProducerPort, MockSagaPort, MockSkillDataPort, MockValidationPort,
};

#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{PeerError, ProducerError, RepoError, SagaError};
