//! Per-character conversation progress.

use serde::{Deserialize, Serialize};

use super::model::{ContextMap, Conversation};
use crate::field::Field;
use crate::ids::{CharacterId, NpcId, TransactionId};

/// What started the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    #[default]
    Npc,
    Quest,
}

/// The live state of one character's conversation.
///
/// Holds a snapshot of the conversation graph so an edit to the stored
/// conversation never changes a conversation already in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    character_id: CharacterId,
    npc_id: NpcId,
    field: Field,
    current_state: String,
    #[serde(default)]
    variables: ContextMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_saga_id: Option<TransactionId>,
    conversation: Conversation,
    #[serde(default)]
    conversation_type: ConversationType,
    #[serde(default)]
    source_id: u32,
}

impl ConversationContext {
    /// Seeds a context positioned at the conversation's start state.
    pub fn start(
        character_id: CharacterId,
        npc_id: NpcId,
        field: Field,
        conversation: Conversation,
    ) -> Self {
        Self {
            character_id,
            npc_id,
            field,
            current_state: conversation.start_state().to_string(),
            variables: conversation.variables().clone(),
            pending_saga_id: None,
            conversation,
            conversation_type: ConversationType::Npc,
            source_id: npc_id.value(),
        }
    }

    pub fn for_quest(mut self, quest_id: u32) -> Self {
        self.conversation_type = ConversationType::Quest;
        self.source_id = quest_id;
        self
    }

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    pub fn npc_id(&self) -> NpcId {
        self.npc_id
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub fn variables(&self) -> &ContextMap {
        &self.variables
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn pending_saga_id(&self) -> Option<TransactionId> {
        self.pending_saga_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_type(&self) -> ConversationType {
        self.conversation_type
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn set_current_state(&mut self, state_id: impl Into<String>) {
        self.current_state = state_id.into();
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn remove_variable(&mut self, key: &str) -> Option<String> {
        self.variables.remove(key)
    }

    /// Merges `values` into the variables; incoming keys win.
    pub fn merge_variables(&mut self, values: &ContextMap) {
        for (k, v) in values {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    pub fn park_on(&mut self, saga_id: TransactionId) {
        self.pending_saga_id = Some(saga_id);
    }

    pub fn clear_pending_saga(&mut self) -> Option<TransactionId> {
        self.pending_saga_id.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::{Choice, Dialogue, DialogueType, Speaker, State, StateKind};
    use crate::ids::{ChannelId, MapId, WorldId};

    fn conversation() -> Conversation {
        Conversation::new(
            NpcId::from_raw(9010000),
            "start",
            vec![State::new(
                "start",
                StateKind::Dialogue(Dialogue {
                    dialogue_type: DialogueType::SendOk,
                    text: "Hi".into(),
                    speaker: Speaker::Npc,
                    end_chat: true,
                    secondary_npc_id: None,
                    choices: vec![Choice::new("Ok", ""), Choice::new("Exit", "")],
                }),
            )],
        )
    }

    fn field() -> Field {
        Field::new(WorldId::from_raw(0), ChannelId::from_raw(1), MapId::from_raw(100000000))
    }

    #[test]
    fn start_copies_conversation_variables() {
        let ctx = ConversationContext::start(
            CharacterId::from_raw(1),
            NpcId::from_raw(9010000),
            field(),
            conversation().with_variable("npcName", "Shanks"),
        );
        assert_eq!(ctx.variable("npcName"), Some("Shanks"));
    }

    #[test]
    fn start_positions_at_start_state() {
        let ctx = ConversationContext::start(
            CharacterId::from_raw(1),
            NpcId::from_raw(9010000),
            field(),
            conversation(),
        );
        assert_eq!(ctx.current_state(), "start");
        assert_eq!(ctx.conversation_type(), ConversationType::Npc);
        assert_eq!(ctx.source_id(), 9010000);
        assert!(ctx.pending_saga_id().is_none());
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut ctx = ConversationContext::start(
            CharacterId::from_raw(1),
            NpcId::from_raw(9010000),
            field(),
            conversation(),
        );
        ctx.set_variable("quantity", "1");
        ctx.set_variable("price", "10");

        let mut incoming = ContextMap::new();
        incoming.insert("quantity".into(), "5".into());
        ctx.merge_variables(&incoming);

        assert_eq!(ctx.variable("quantity"), Some("5"));
        assert_eq!(ctx.variable("price"), Some("10"));
    }

    #[test]
    fn parking_is_cleared_once() {
        let mut ctx = ConversationContext::start(
            CharacterId::from_raw(1),
            NpcId::from_raw(9010000),
            field(),
            conversation(),
        )
        .for_quest(2000);
        let saga = TransactionId::new();
        ctx.park_on(saga);
        assert_eq!(ctx.clear_pending_saga(), Some(saga));
        assert_eq!(ctx.clear_pending_saga(), None);
        assert_eq!(ctx.conversation_type(), ConversationType::Quest);
    }

    #[test]
    fn survives_serialization() {
        let ctx = ConversationContext::start(
            CharacterId::from_raw(7),
            NpcId::from_raw(9010000),
            field(),
            conversation(),
        );
        let json = serde_json::to_string(&ctx).expect("serialize");
        let back: ConversationContext = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, ctx);
    }
}
