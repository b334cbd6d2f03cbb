//! In-process adapters for the storage ports.
//!
//! Rows live in tenant-partitioned maps; nothing survives a restart.

mod characters;
mod conversations;
mod key_value;
mod quests;

pub use characters::MemoryCharacterRepo;
pub use conversations::MemoryConversationRepo;
pub use key_value::MemoryKeyValueStore;
pub use quests::MemoryQuestRepo;
