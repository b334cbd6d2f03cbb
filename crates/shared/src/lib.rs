//! Atlas wire contracts.
//!
//! Every message the engine produces or consumes, and every HTTP document it
//! serves, is defined here:
//! - Topic names and their environment overrides
//! - Character status events, commands and movement messages
//! - Saga status events, NPC talk and conversation commands, drop requests
//! - JSON:API documents for characters and quests
//! - Tenant header names
//!
//! # Design Principles
//!
//! 1. **No business logic** - pure data types and serialization
//! 2. **Raw primitives** - ids are plain numbers on the wire
//! 3. **camelCase JSON** - every body matches the peers' field names

pub mod character;
pub mod drop;
pub mod headers;
pub mod jsonapi;
pub mod npc;
pub mod quest;
pub mod saga;
pub mod topics;

pub use character::{
    CharacterCommand, CharacterRestModel, CommandBody, MovementCommand, StatusEvent,
    StatusEventBody,
};
pub use drop::{DropCommand, DropCommandBody};
pub use jsonapi::{Document, JsonApiError, ListDocument, Resource};
pub use npc::{ConversationCommand, ConversationCommandBody, NpcTalkCommand, TalkBody};
pub use quest::QuestRestModel;
pub use saga::{SagaStatusBody, SagaStatusEvent};
pub use topics::Topic;
