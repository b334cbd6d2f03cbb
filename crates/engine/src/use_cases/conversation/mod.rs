//! Conversation use cases.
//!
//! Walks an NPC's conversation graph for one character at a time:
//! 1. The client talks to an NPC (`processor.start`)
//! 2. Prompt states are rendered as NPC talk commands and wait for input
//! 3. Client answers pick the next state (`processor.continue_conversation`)
//! 4. Action states run operations or park on a saga
//! 5. Saga outcomes resume the parked conversation (`resume`)

use std::sync::Arc;

mod evaluator;
mod operations;
mod placeholder;
mod processor;
mod saga_status;

pub use evaluator::ConditionEvaluator;
pub use operations::{pick_weighted, OperationError, OperationExecutor};
pub use placeholder::PlaceholderError;
pub use processor::{parked, ConversationError, ConversationProcessor};
pub use saga_status::ResumeConversation;

/// Container for conversation use cases.
pub struct ConversationUseCases {
    pub processor: Arc<ConversationProcessor>,
    pub resume: Arc<ResumeConversation>,
}

impl ConversationUseCases {
    pub fn new(processor: Arc<ConversationProcessor>, resume: Arc<ResumeConversation>) -> Self {
        Self { processor, resume }
    }
}
