//! API layer - HTTP routes and topic consumers.

pub mod characters;
pub mod consumers;
pub mod conversations;
pub mod http;
pub mod quests;
