//! NPC and quest conversations.

mod context;
pub mod cosmetic;
mod model;
pub mod validator;

pub use context::{ConversationContext, ConversationType};
pub use model::{
    AskNumber, AskSlideMenu, AskStyle, Choice, Condition, ContextMap, Conversation, CraftAction,
    Dialogue, DialogueType, GachaponAction, GenericAction, ListSelection, Operation, Outcome,
    PartyQuestAction, PartyQuestBonusAction, Speaker, State, StateKind, StateRepr,
    TransportAction, EXIT_CHOICE_TEXT,
};
pub use validator::{validate, IssueKind, ValidationIssue, ValidationReport};
