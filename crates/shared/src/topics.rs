//! Topic names.
//!
//! Each topic is addressed by the environment variable that names it. When the
//! variable is unset the variable name itself is used as the topic.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    CharacterStatus,
    CharacterMovement,
    CharacterCommand,
    SagaCommand,
    SagaStatus,
    NpcCommand,
    NpcConversationCommand,
    DropCommand,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::CharacterStatus,
        Topic::CharacterMovement,
        Topic::CharacterCommand,
        Topic::SagaCommand,
        Topic::SagaStatus,
        Topic::NpcCommand,
        Topic::NpcConversationCommand,
        Topic::DropCommand,
    ];

    /// Environment variable holding the topic name.
    pub fn env_name(&self) -> &'static str {
        match self {
            Topic::CharacterStatus => "EVENT_TOPIC_CHARACTER_STATUS",
            Topic::CharacterMovement => "EVENT_TOPIC_CHARACTER_MOVEMENT",
            Topic::CharacterCommand => "COMMAND_TOPIC_CHARACTER",
            Topic::SagaCommand => "COMMAND_TOPIC_SAGA",
            Topic::SagaStatus => "EVENT_TOPIC_SAGA_STATUS",
            Topic::NpcCommand => "COMMAND_TOPIC_NPC",
            Topic::NpcConversationCommand => "COMMAND_TOPIC_NPC_CONVERSATION",
            Topic::DropCommand => "COMMAND_TOPIC_DROP",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_name())
    }
}
