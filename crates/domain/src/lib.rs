extern crate self as atlas_domain;

pub mod character;
pub mod conversation;
pub mod error;
pub mod field;
pub mod ids;
pub mod quest;
pub mod saga;
pub mod tenant;
pub mod validation;

pub use character::{
    experience_for_level, Character, Column, JobId, Modifier, Skill, SkillEffect, SkillPoints,
    Stat, MAX_HP_MP, MAX_HP_MP_USED, MAX_LEVEL, MIN_LEVEL,
};
pub use conversation::{
    Choice, Condition, ContextMap, Conversation, ConversationContext, ConversationType, Operation,
    Outcome, State, StateKind,
};
pub use error::DomainError;
pub use field::{Channel, Field};
pub use ids::{AccountId, ChannelId, CharacterId, MapId, NpcId, TenantId, TransactionId, WorldId};
pub use quest::Quest;
pub use saga::{Action, Saga, SagaBuilder, SagaType, Step, StepStatus};
pub use tenant::Tenant;
pub use validation::{ConditionInput, ValidationVerdict};
