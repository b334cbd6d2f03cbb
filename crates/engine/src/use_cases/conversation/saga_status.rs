//! Resumes conversations parked on a saga.

use std::sync::Arc;

use atlas_domain::{ConversationContext, Tenant, TransactionId};
use atlas_shared::saga::reason;
use atlas_shared::{SagaStatusBody, SagaStatusEvent};

use super::processor::{parked, ConversationError, ConversationProcessor};
use crate::infrastructure::contexts::ConversationContexts;

/// Failure reasons with a dedicated branch, and the key holding it.
const REASON_ROUTES: [(&str, &str); 7] = [
    (reason::VALIDATION_FAILED, parked::CRAFT_MISSING_MATERIALS),
    (reason::CAPACITY_FULL, parked::TRANSPORT_CAPACITY_FULL),
    (reason::ALREADY_IN_TRANSIT, parked::TRANSPORT_ALREADY_IN_TRANSIT),
    (reason::ROUTE_NOT_FOUND, parked::TRANSPORT_ROUTE_NOT_FOUND),
    (reason::SERVICE_ERROR, parked::TRANSPORT_SERVICE_ERROR),
    (reason::NOT_IN_PARTY, parked::PARTY_QUEST_NOT_IN_PARTY),
    (reason::NOT_LEADER, parked::PARTY_QUEST_NOT_LEADER),
];

/// Generic failure branches, in lookup order. Only the action that parked
/// the conversation has written its key.
const FAILURE_KEYS: [&str; 5] = [
    parked::CRAFT_FAILURE,
    parked::TRANSPORT_FAILURE,
    parked::PARTY_QUEST_FAILURE,
    parked::PARTY_QUEST_BONUS_FAILURE,
    parked::GACHAPON_FAILURE,
];

pub struct ResumeConversation {
    contexts: Arc<ConversationContexts>,
    processor: Arc<ConversationProcessor>,
}

impl ResumeConversation {
    pub fn new(contexts: Arc<ConversationContexts>, processor: Arc<ConversationProcessor>) -> Self {
        Self { contexts, processor }
    }

    /// Routes a saga outcome into the conversation waiting on it. Events for
    /// sagas no conversation is parked on are ignored.
    pub async fn execute(&self, tenant: &Tenant, event: &SagaStatusEvent) -> Result<(), ConversationError> {
        let transaction_id = TransactionId::from_uuid(event.transaction_id);
        let Some(mut context) = self.contexts.find_by_pending_saga(tenant, transaction_id).await else {
            tracing::debug!(transaction_id = %transaction_id, "No conversation parked on saga");
            return Ok(());
        };
        let character_id = context.character_id();

        // 1. Pick the branch
        let next_state = match &event.body {
            SagaStatusBody::Completed(_) => {
                tracing::info!(
                    character_id = %character_id,
                    transaction_id = %transaction_id,
                    "Saga completed, resuming conversation"
                );
                branch(&context, parked::CRAFT_SUCCESS)
            }
            SagaStatusBody::Failed(failed) => {
                tracing::warn!(
                    character_id = %character_id,
                    transaction_id = %transaction_id,
                    reason = %failed.reason,
                    failed_step = %failed.failed_step,
                    "Saga failed, resuming conversation"
                );
                failure_branch(&context, &failed.reason)
            }
        };

        // 2. Unpark
        for key in parked::ALL {
            context.remove_variable(key);
        }
        context.clear_pending_saga();

        // 3. Continue or end
        match next_state {
            Some(state) => {
                context.set_current_state(state);
                self.contexts.save(tenant, context).await;
                self.processor.drive(tenant, character_id).await
            }
            None => {
                self.contexts.clear(tenant, character_id).await;
                tracing::info!(character_id = %character_id, "Conversation ended after saga");
                Ok(())
            }
        }
    }
}

fn branch(context: &ConversationContext, key: &str) -> Option<String> {
    context
        .variable(key)
        .filter(|state| !state.is_empty())
        .map(str::to_string)
}

fn failure_branch(context: &ConversationContext, failure_reason: &str) -> Option<String> {
    REASON_ROUTES
        .iter()
        .filter(|(r, _)| *r == failure_reason)
        .find_map(|(_, key)| branch(context, key))
        .or_else(|| FAILURE_KEYS.iter().find_map(|key| branch(context, key)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use atlas_domain::conversation::{Dialogue, DialogueType, Speaker};
    use atlas_domain::{
        ChannelId, CharacterId, Conversation, Field, MapId, NpcId, State, StateKind, TenantId,
        WorldId,
    };
    use atlas_shared::NpcTalkCommand;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::ports::{
        MockAppearancePort, MockConversationRepo, MockInventoryPort, MockMapPort,
        MockNpcTalkPort, MockPetPort, MockSagaPort, MockValidationPort,
    };
    use crate::use_cases::conversation::evaluator::ConditionEvaluator;
    use crate::use_cases::conversation::operations::OperationExecutor;

    fn say(text: &str) -> StateKind {
        StateKind::Dialogue(Dialogue {
            dialogue_type: DialogueType::SendOk,
            text: text.into(),
            speaker: Speaker::Npc,
            end_chat: false,
            secondary_npc_id: None,
            choices: vec![],
        })
    }

    fn conversation() -> Conversation {
        Conversation::new(
            NpcId::from_raw(9_000_001),
            "parked",
            ["parked", "ok", "fail", "nomat", "full", "pqfail"]
                .into_iter()
                .map(|id| State::new(id, say(id)))
                .collect(),
        )
    }

    struct Harness {
        tenant: Tenant,
        resume: ResumeConversation,
        contexts: Arc<ConversationContexts>,
        talk: Arc<Mutex<Vec<NpcTalkCommand>>>,
    }

    fn harness() -> Harness {
        let talk_log = Arc::new(Mutex::new(Vec::new()));
        let mut talk = MockNpcTalkPort::new();
        let sink = talk_log.clone();
        talk.expect_send().returning(move |_, command| {
            sink.lock().expect("lock").push(command);
            Ok(())
        });

        let saga: Arc<MockSagaPort> = Arc::new(MockSagaPort::new());
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid time")));
        let executor = OperationExecutor::new(
            saga.clone(),
            Arc::new(MockAppearancePort::new()),
            Arc::new(MockInventoryPort::new()),
            Arc::new(MockPetPort::new()),
            Arc::new(MockMapPort::new()),
            clock.clone(),
            Arc::new(FixedRandom(0)),
        );
        let contexts = Arc::new(ConversationContexts::new());
        let processor = ConversationProcessor::new(
            Arc::new(MockConversationRepo::new()),
            contexts.clone(),
            Arc::new(talk),
            saga,
            Arc::new(executor),
            Arc::new(ConditionEvaluator::new(Arc::new(MockValidationPort::new()))),
            clock,
        );
        Harness {
            tenant: Tenant::new(TenantId::new(), "GMS", 83, 1),
            resume: ResumeConversation::new(contexts.clone(), Arc::new(processor)),
            contexts,
            talk: talk_log,
        }
    }

    fn character() -> CharacterId {
        CharacterId::from_raw(42)
    }

    async fn park(h: &Harness, keys: &[(&str, &str)]) -> Uuid {
        let mut ctx = ConversationContext::start(
            character(),
            NpcId::from_raw(9_000_001),
            Field::new(WorldId::from_raw(0), ChannelId::from_raw(1), MapId::from_raw(101_000_000)),
            conversation(),
        );
        for (key, state) in keys {
            ctx.set_variable(*key, *state);
        }
        let id = TransactionId::new();
        ctx.park_on(id);
        h.contexts.save(&h.tenant, ctx).await;
        id.to_uuid()
    }

    fn craft_keys() -> Vec<(&'static str, &'static str)> {
        vec![
            (parked::CRAFT_SUCCESS, "ok"),
            (parked::CRAFT_FAILURE, "fail"),
            (parked::CRAFT_MISSING_MATERIALS, "nomat"),
        ]
    }

    fn last_message(h: &Harness) -> String {
        h.talk.lock().expect("lock").last().map(|c| c.message.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn craft_success_resumes_at_success_state() {
        let h = harness();
        let id = park(&h, &craft_keys()).await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::completed(id))
            .await
            .expect("resume");
        assert_eq!(last_message(&h), "ok");
        // "ok" has no choices, so the conversation is over.
        assert!(h.contexts.get(&h.tenant, character()).await.is_none());
    }

    #[tokio::test]
    async fn validation_failure_routes_to_missing_materials() {
        let h = harness();
        let id = park(&h, &craft_keys()).await;
        h.resume
            .execute(
                &h.tenant,
                &SagaStatusEvent::failed(id, reason::VALIDATION_FAILED, "validate_resources"),
            )
            .await
            .expect("resume");
        assert_eq!(last_message(&h), "nomat");
    }

    #[tokio::test]
    async fn other_failures_use_the_parking_action_failure_state() {
        let h = harness();
        let id = park(&h, &craft_keys()).await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::failed(id, "inventory full", "award_crafted_item"))
            .await
            .expect("resume");
        assert_eq!(last_message(&h), "fail");
    }

    #[tokio::test]
    async fn transport_reason_with_blank_branch_falls_back() {
        let h = harness();
        let id = park(
            &h,
            &[
                (parked::TRANSPORT_FAILURE, "fail"),
                (parked::TRANSPORT_CAPACITY_FULL, "full"),
                (parked::TRANSPORT_ROUTE_NOT_FOUND, ""),
            ],
        )
        .await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::failed(id, reason::CAPACITY_FULL, "start_instance_transport"))
            .await
            .expect("resume");
        assert_eq!(last_message(&h), "full");

        let id = park(
            &h,
            &[
                (parked::TRANSPORT_FAILURE, "fail"),
                (parked::TRANSPORT_ROUTE_NOT_FOUND, ""),
            ],
        )
        .await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::failed(id, reason::ROUTE_NOT_FOUND, "start_instance_transport"))
            .await
            .expect("resume");
        assert_eq!(last_message(&h), "fail");
    }

    #[tokio::test]
    async fn success_without_branch_ends_conversation() {
        let h = harness();
        let id = park(&h, &[(parked::PARTY_QUEST_FAILURE, "pqfail")]).await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::completed(id))
            .await
            .expect("resume");
        assert!(h.talk.lock().expect("lock").is_empty());
        assert!(h.contexts.get(&h.tenant, character()).await.is_none());
    }

    #[tokio::test]
    async fn unparked_keys_are_removed_before_driving() {
        let h = harness();
        // A state with choices keeps the conversation alive after resuming.
        let base = conversation();
        let mut states = base.states().to_vec();
        states.push(State::new(
            "menu",
            StateKind::Dialogue(Dialogue {
                dialogue_type: DialogueType::SendYesNo,
                text: "Again?".into(),
                speaker: Speaker::Npc,
                end_chat: false,
                secondary_npc_id: None,
                choices: vec![
                    atlas_domain::Choice::new("Yes", "parked"),
                    atlas_domain::Choice::new("No", ""),
                    atlas_domain::Choice::new("Exit", ""),
                ],
            }),
        ));
        let mut ctx = ConversationContext::start(
            character(),
            NpcId::from_raw(9_000_001),
            Field::new(WorldId::from_raw(0), ChannelId::from_raw(1), MapId::from_raw(101_000_000)),
            Conversation::new(base.npc_id(), "parked", states),
        );
        ctx.set_variable(parked::GACHAPON_FAILURE, "menu");
        ctx.set_variable("keep", "me");
        let id = TransactionId::new();
        ctx.park_on(id);
        h.contexts.save(&h.tenant, ctx).await;

        h.resume
            .execute(&h.tenant, &SagaStatusEvent::failed(id.to_uuid(), "no rewards", "select_gachapon_reward"))
            .await
            .expect("resume");

        let ctx = h.contexts.get(&h.tenant, character()).await.expect("waiting on menu");
        assert_eq!(ctx.current_state(), "menu");
        assert_eq!(ctx.pending_saga_id(), None);
        assert_eq!(ctx.variable(parked::GACHAPON_FAILURE), None);
        assert_eq!(ctx.variable("keep"), Some("me"));
    }

    #[tokio::test]
    async fn unknown_saga_is_ignored() {
        let h = harness();
        park(&h, &craft_keys()).await;
        h.resume
            .execute(&h.tenant, &SagaStatusEvent::completed(Uuid::new_v4()))
            .await
            .expect("ignored");
        let ctx = h.contexts.get(&h.tenant, character()).await.expect("still parked");
        assert!(ctx.pending_saga_id().is_some());
    }
}
