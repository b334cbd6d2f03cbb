//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area. Use cases
//! depend on port traits only; the composition root picks the adapters.

pub mod character;
pub mod conversation;

pub use character::CharacterUseCases;
pub use conversation::ConversationUseCases;
