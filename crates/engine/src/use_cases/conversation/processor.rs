//! NPC conversation processor.
//!
//! Owns the Start/Continue/End entrypoints and the drive loop that walks the
//! conversation graph. The loop runs until a state needs client input, the
//! conversation reaches an empty next state, or an action state parks the
//! conversation on a saga. Parked conversations are resumed by
//! [`super::ResumeConversation`] when the saga reports back.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use atlas_domain::conversation::cosmetic::decode_u32_list;
use atlas_domain::conversation::{
    AskNumber, AskSlideMenu, AskStyle, Choice, CraftAction, Dialogue, DialogueType,
    GachaponAction, GenericAction, ListSelection, PartyQuestAction, PartyQuestBonusAction,
    Speaker, TransportAction,
};
use atlas_domain::saga::{
    AwardItemPayload, AwardMesosPayload, DestroyAssetPayload, EnterPartyQuestBonusPayload,
    ItemPayload, RegisterPartyQuestPayload, SelectGachaponRewardPayload,
    StartInstanceTransportPayload, ValidateCharacterStatePayload,
};
use atlas_domain::validation::{CONDITION_ITEM, CONDITION_MESO};
use atlas_domain::{
    AccountId, Action, CharacterId, ConditionInput, ContextMap, Conversation,
    ConversationContext, DomainError, Field, NpcId, Saga, SagaBuilder, SagaType, State,
    StateKind, StepStatus, Tenant,
};
use atlas_shared::npc::{NumBody, SlideMenuBody, StyleBody, SPEAKER_CHARACTER};
use atlas_shared::{NpcTalkCommand, TalkBody};
use futures_util::FutureExt;

use super::evaluator::ConditionEvaluator;
use super::operations::{OperationError, OperationExecutor};
use super::placeholder::{replace_placeholders, resolve};
use crate::infrastructure::contexts::ConversationContexts;
use crate::infrastructure::ports::{
    ClockPort, ConversationRepo, NpcTalkPort, PeerError, RepoError, SagaPort,
};

/// Context keys an action state writes before parking. All of them are
/// removed again when the conversation resumes.
pub mod parked {
    pub const CRAFT_SUCCESS: &str = "craftAction_successState";
    pub const CRAFT_FAILURE: &str = "craftAction_failureState";
    pub const CRAFT_MISSING_MATERIALS: &str = "craftAction_missingMaterialsState";
    pub const TRANSPORT_FAILURE: &str = "transportAction_failureState";
    pub const TRANSPORT_CAPACITY_FULL: &str = "transportAction_capacityFullState";
    pub const TRANSPORT_ALREADY_IN_TRANSIT: &str = "transportAction_alreadyInTransitState";
    pub const TRANSPORT_ROUTE_NOT_FOUND: &str = "transportAction_routeNotFoundState";
    pub const TRANSPORT_SERVICE_ERROR: &str = "transportAction_serviceErrorState";
    pub const PARTY_QUEST_FAILURE: &str = "partyQuestAction_failureState";
    pub const PARTY_QUEST_NOT_IN_PARTY: &str = "partyQuestAction_notInPartyState";
    pub const PARTY_QUEST_NOT_LEADER: &str = "partyQuestAction_notLeaderState";
    pub const PARTY_QUEST_BONUS_FAILURE: &str = "partyQuestBonusAction_failureState";
    pub const GACHAPON_FAILURE: &str = "gachaponAction_failureState";

    pub const ALL: [&str; 13] = [
        CRAFT_SUCCESS,
        CRAFT_FAILURE,
        CRAFT_MISSING_MATERIALS,
        TRANSPORT_FAILURE,
        TRANSPORT_CAPACITY_FULL,
        TRANSPORT_ALREADY_IN_TRANSIT,
        TRANSPORT_ROUTE_NOT_FOUND,
        TRANSPORT_SERVICE_ERROR,
        PARTY_QUEST_FAILURE,
        PARTY_QUEST_NOT_IN_PARTY,
        PARTY_QUEST_NOT_LEADER,
        PARTY_QUEST_BONUS_FAILURE,
        GACHAPON_FAILURE,
    ];
}

const QUANTITY_KEY: &str = "quantity";
const PRICE_KEY: &str = "price";
const TOTAL_COST_KEY: &str = "totalCost";
const ACTOR_TYPE_NPC: &str = "NPC";

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("another conversation exists")]
    AlreadyInConversation,
    #[error("conversation context not found")]
    ContextNotFound,
    #[error("no conversation defined for npc {0}")]
    ConversationNotFound(NpcId),
    #[error("invalid number input: negative value")]
    NegativeNumber,
    #[error("number below minimum value")]
    BelowMinimum,
    #[error("number above maximum value")]
    AboveMaximum,
    #[error("invalid style selection: out of bounds")]
    StyleOutOfBounds,
    #[error("no choice for action {action} and selection {selection} in state {state}")]
    InvalidChoice {
        state: String,
        action: i8,
        selection: i32,
    },
    #[error("unexpected state type for Continue: {0}")]
    UnexpectedState(&'static str),
    #[error("no styles available (neither static nor from context)")]
    NoStyles,
    #[error("styles not found in context: {0}")]
    StylesMissing(String),
    #[error("failed to send npc talk command: {0}")]
    Talk(#[from] PeerError),
    #[error("conversation processing panicked")]
    Panicked,
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What the drive loop does after a state has been processed.
#[derive(Debug, PartialEq, Eq)]
enum Transition {
    /// Keep the context and wait for client input or a saga outcome.
    Wait,
    /// Move to the given state. Empty ends the conversation.
    Goto(String),
}

impl Transition {
    fn end() -> Self {
        Transition::Goto(String::new())
    }
}

pub struct ConversationProcessor {
    conversations: Arc<dyn ConversationRepo>,
    contexts: Arc<ConversationContexts>,
    talk: Arc<dyn NpcTalkPort>,
    saga: Arc<dyn SagaPort>,
    executor: Arc<OperationExecutor>,
    evaluator: Arc<ConditionEvaluator>,
    clock: Arc<dyn ClockPort>,
}

impl ConversationProcessor {
    pub fn new(
        conversations: Arc<dyn ConversationRepo>,
        contexts: Arc<ConversationContexts>,
        talk: Arc<dyn NpcTalkPort>,
        saga: Arc<dyn SagaPort>,
        executor: Arc<OperationExecutor>,
        evaluator: Arc<ConditionEvaluator>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            conversations,
            contexts,
            talk,
            saga,
            executor,
            evaluator,
            clock,
        }
    }

    /// Starts the NPC's conversation for a character.
    pub async fn start(
        &self,
        tenant: &Tenant,
        npc_id: NpcId,
        character_id: CharacterId,
        field: Field,
        account_id: AccountId,
    ) -> Result<(), ConversationError> {
        // 1. One conversation per character
        if self.contexts.get(tenant, character_id).await.is_some() {
            return Err(ConversationError::AlreadyInConversation);
        }

        // 2. Load the graph
        let conversation = self
            .conversations
            .get_for_npc(tenant, npc_id)
            .await?
            .ok_or(ConversationError::ConversationNotFound(npc_id))?;

        // 3. Seed the context
        let mut context = ConversationContext::start(character_id, npc_id, field, conversation);
        seed_field(&mut context, field);
        if account_id.value() > 0 {
            context.set_variable("accountId", account_id.to_string());
        }

        tracing::info!(
            character_id = %character_id,
            npc_id = %npc_id,
            start_state = %context.current_state(),
            "Starting conversation"
        );
        self.begin(tenant, context).await
    }

    /// Starts a quest conversation. Quest graphs are owned by the caller.
    pub async fn start_quest(
        &self,
        tenant: &Tenant,
        quest_id: u32,
        npc_id: NpcId,
        character_id: CharacterId,
        field: Field,
        conversation: Conversation,
    ) -> Result<(), ConversationError> {
        if self.contexts.get(tenant, character_id).await.is_some() {
            return Err(ConversationError::AlreadyInConversation);
        }

        let mut context =
            ConversationContext::start(character_id, npc_id, field, conversation).for_quest(quest_id);
        seed_field(&mut context, field);
        context.set_variable("questId", quest_id.to_string());

        tracing::info!(
            character_id = %character_id,
            npc_id = %npc_id,
            quest_id,
            "Starting quest conversation"
        );
        self.begin(tenant, context).await
    }

    async fn begin(&self, tenant: &Tenant, context: ConversationContext) -> Result<(), ConversationError> {
        let character_id = context.character_id();
        if !self.contexts.begin(tenant, context).await {
            return Err(ConversationError::AlreadyInConversation);
        }
        self.drive(tenant, character_id).await
    }

    /// Applies the client's answer to the state the conversation waits on.
    pub async fn continue_conversation(
        &self,
        tenant: &Tenant,
        npc_id: NpcId,
        character_id: CharacterId,
        action: i8,
        last_message_type: u8,
        selection: i32,
    ) -> Result<(), ConversationError> {
        let mut context = self
            .contexts
            .get(tenant, character_id)
            .await
            .ok_or(ConversationError::ContextNotFound)?;
        let state = context
            .conversation()
            .find_state(context.current_state())?
            .clone();

        tracing::debug!(
            character_id = %character_id,
            npc_id = %npc_id,
            state = %state.id(),
            action,
            last_message_type,
            selection,
            "Continuing conversation"
        );

        let invalid_choice = || ConversationError::InvalidChoice {
            state: state.id().to_string(),
            action,
            selection,
        };
        let (next_state, choice_context) = match state.kind() {
            StateKind::Dialogue(dialogue) => {
                picked(dialogue.choice_from_action(action)).ok_or_else(invalid_choice)?
            }
            StateKind::ListSelection(list) => {
                picked(list.choice_from_selection(action, selection)).ok_or_else(invalid_choice)?
            }
            StateKind::AskSlideMenu(menu) => {
                let choice = menu
                    .choice_from_selection(action, selection)
                    .ok_or_else(invalid_choice)?;
                let mut values = choice.context.clone();
                if !choice.is_exit() {
                    values.insert(menu.context_key.clone(), selection.to_string());
                }
                (choice.next_state.clone(), values)
            }
            StateKind::AskNumber(ask) => number_answer(ask, &context, selection)?,
            StateKind::AskStyle(ask) => {
                // 0 is the client's cancel; anything but 1 is treated the same.
                if action != 1 {
                    tracing::debug!(character_id = %character_id, action, "Style selection cancelled");
                    (String::new(), ContextMap::new())
                } else {
                    let styles = styles_for(ask, &context)?;
                    let style = usize::try_from(selection)
                        .ok()
                        .and_then(|index| styles.get(index))
                        .ok_or(ConversationError::StyleOutOfBounds)?;
                    let mut values = ContextMap::new();
                    values.insert(ask.context_key.clone(), style.to_string());
                    (ask.next_state.clone(), values)
                }
            }
            other => return Err(ConversationError::UnexpectedState(other.type_name())),
        };

        if next_state.is_empty() {
            self.contexts.clear(tenant, character_id).await;
            tracing::info!(character_id = %character_id, "Conversation ended by choice");
            return Ok(());
        }

        context.merge_variables(&choice_context);
        context.set_current_state(next_state);
        self.contexts.save(tenant, context).await;
        self.drive(tenant, character_id).await
    }

    /// Ends the character's conversation. Ending twice is not an error.
    pub async fn end(&self, tenant: &Tenant, character_id: CharacterId) -> Result<(), ConversationError> {
        if self.contexts.clear(tenant, character_id).await {
            tracing::info!(character_id = %character_id, "Conversation ended");
        }
        Ok(())
    }

    pub async fn context(&self, tenant: &Tenant, character_id: CharacterId) -> Option<ConversationContext> {
        self.contexts.get(tenant, character_id).await
    }

    /// Processes states until the conversation waits or ends. The context is
    /// re-read every iteration since a saga outcome may have moved it.
    pub async fn drive(&self, tenant: &Tenant, character_id: CharacterId) -> Result<(), ConversationError> {
        loop {
            let mut context = self
                .contexts
                .get(tenant, character_id)
                .await
                .ok_or(ConversationError::ContextNotFound)?;
            let state = context
                .conversation()
                .find_state(context.current_state())?
                .clone();

            let processed = AssertUnwindSafe(self.process_state(tenant, &mut context, &state))
                .catch_unwind()
                .await;

            let transition = match processed {
                Ok(Ok(transition)) => transition,
                Ok(Err(e)) => {
                    tracing::error!(
                        character_id = %character_id,
                        state = %state.id(),
                        error = %e,
                        "Failed to process conversation state"
                    );
                    if matches!(state.kind(), StateKind::GenericAction(_)) {
                        self.contexts.clear(tenant, character_id).await;
                    }
                    return Err(e);
                }
                Err(_) => {
                    tracing::error!(
                        character_id = %character_id,
                        state = %state.id(),
                        "Conversation state processing panicked, clearing context"
                    );
                    self.contexts.clear(tenant, character_id).await;
                    return Err(ConversationError::Panicked);
                }
            };

            match transition {
                Transition::Wait => {
                    self.contexts.save(tenant, context).await;
                    return Ok(());
                }
                Transition::Goto(next) if next.is_empty() => {
                    self.contexts.clear(tenant, character_id).await;
                    tracing::info!(character_id = %character_id, state = %state.id(), "Conversation complete");
                    return Ok(());
                }
                Transition::Goto(next) => {
                    tracing::debug!(character_id = %character_id, from = %state.id(), to = %next, "Advancing conversation");
                    context.set_current_state(next);
                    self.contexts.save(tenant, context).await;
                }
            }
        }
    }

    async fn process_state(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        state: &State,
    ) -> Result<Transition, ConversationError> {
        match state.kind() {
            StateKind::Dialogue(dialogue) => self.dialogue(tenant, context, dialogue).await,
            StateKind::ListSelection(list) => self.list_selection(tenant, context, list).await,
            StateKind::AskSlideMenu(menu) => self.slide_menu(tenant, context, menu).await,
            StateKind::AskNumber(ask) => self.ask_number(tenant, context, ask).await,
            StateKind::AskStyle(ask) => self.ask_style(tenant, context, ask).await,
            StateKind::GenericAction(action) => self.generic_action(tenant, context, action).await,
            StateKind::CraftAction(action) => self.craft(tenant, context, action).await,
            StateKind::TransportAction(action) => self.transport(tenant, context, action).await,
            StateKind::PartyQuestAction(action) => self.party_quest(tenant, context, action).await,
            StateKind::PartyQuestBonusAction(action) => {
                self.party_quest_bonus(tenant, context, action).await
            }
            StateKind::GachaponAction(action) => self.gachapon(tenant, context, action).await,
        }
    }

    // ------------------------------------------------------------------
    // Prompts
    // ------------------------------------------------------------------

    async fn dialogue(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        dialogue: &Dialogue,
    ) -> Result<Transition, ConversationError> {
        let text = replace_placeholders(&dialogue.text, context.variables());
        let mut command = talk_command(context, text, dialogue_body(dialogue.dialogue_type))
            .with_end_chat(dialogue.end_chat);
        if dialogue.speaker == Speaker::Character {
            command = command.with_speaker(SPEAKER_CHARACTER);
        }
        if let Some(secondary) = dialogue.secondary_npc_id {
            command = command.with_secondary_npc(secondary);
        }
        self.talk.send(tenant, command).await?;

        if dialogue.choices.is_empty() {
            Ok(Transition::end())
        } else {
            Ok(Transition::Wait)
        }
    }

    async fn list_selection(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        list: &ListSelection,
    ) -> Result<Transition, ConversationError> {
        let vars = context.variables();
        let mut message = replace_placeholders(&list.title, vars);
        message.push_str("\r\n");
        for (index, choice) in menu_items(&list.choices) {
            let text = replace_placeholders(&choice.text, vars);
            message.push_str(&format!("#L{index}##b{text}#k#l\r\n"));
        }
        self.talk
            .send(tenant, talk_command(context, message, TalkBody::Simple))
            .await?;
        Ok(Transition::Wait)
    }

    async fn slide_menu(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        menu: &AskSlideMenu,
    ) -> Result<Transition, ConversationError> {
        let vars = context.variables();
        let mut message = replace_placeholders(&menu.title, vars);
        for (index, choice) in menu_items(&menu.choices) {
            let text = replace_placeholders(&choice.text, vars);
            message.push_str(&format!("#{index}#{text}"));
        }
        let body = TalkBody::SlideMenu(SlideMenuBody {
            menu_type: menu.menu_type,
        });
        self.talk
            .send(tenant, talk_command(context, message, body))
            .await?;
        Ok(Transition::Wait)
    }

    async fn ask_number(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        ask: &AskNumber,
    ) -> Result<Transition, ConversationError> {
        let text = replace_placeholders(&ask.text, context.variables());
        let body = TalkBody::Num(NumBody {
            default_value: ask.default_value,
            min_value: ask.min_value,
            max_value: ask.max_value,
        });
        self.talk.send(tenant, talk_command(context, text, body)).await?;
        Ok(Transition::Wait)
    }

    async fn ask_style(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        ask: &AskStyle,
    ) -> Result<Transition, ConversationError> {
        let styles = styles_for(ask, context)?;
        let text = replace_placeholders(&ask.text, context.variables());
        let body = TalkBody::Style(StyleBody { styles });
        self.talk.send(tenant, talk_command(context, text, body)).await?;
        Ok(Transition::Wait)
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    async fn generic_action(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        action: &GenericAction,
    ) -> Result<Transition, ConversationError> {
        if let Some(transaction_id) = self
            .executor
            .execute_all(tenant, context, &action.operations)
            .await?
        {
            tracing::debug!(
                character_id = %context.character_id(),
                transaction_id = %transaction_id,
                "Generic action submitted saga"
            );
        }

        // Only the first condition of an outcome is consulted.
        for outcome in &action.outcomes {
            let Some(condition) = outcome.conditions.first() else {
                return Ok(Transition::Goto(outcome.next_state.clone()));
            };
            if self.evaluator.evaluate(tenant, context, condition).await? {
                return Ok(Transition::Goto(outcome.next_state.clone()));
            }
        }
        Ok(Transition::end())
    }

    async fn craft(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        craft: &CraftAction,
    ) -> Result<Transition, ConversationError> {
        let character_id = context.character_id();
        let field = context.field();
        let quantity: u32 = context
            .variable(QUANTITY_KEY)
            .and_then(|q| q.trim().parse().ok())
            .unwrap_or(1);

        let item_id = match resolve(&craft.item_id, context.variables())
            .ok()
            .and_then(|id| id.trim().parse::<u32>().ok())
        {
            Some(id) => id,
            None => {
                tracing::error!(character_id = %character_id, item_id = %craft.item_id, "Invalid craft item id");
                return Ok(Transition::Goto(craft.failure_state.clone()));
            }
        };

        let Some(totals) = craft_totals(craft, quantity) else {
            tracing::error!(character_id = %character_id, quantity, "Craft totals overflow");
            return Ok(Transition::Goto(craft.failure_state.clone()));
        };

        tracing::debug!(
            character_id = %character_id,
            item_id,
            quantity,
            meso_cost = totals.meso_cost,
            "Crafting item"
        );

        let mut builder = SagaBuilder::new(
            SagaType::InventoryTransaction,
            format!("NPC_{}", context.npc_id()),
        );

        // 1. Validate mesos and materials
        let mut conditions = Vec::new();
        if totals.meso_cost > 0 {
            conditions.push(ConditionInput::new(CONDITION_MESO, ">=", totals.meso_cost));
        }
        for (material, amount) in &totals.materials {
            conditions.push(
                ConditionInput::new(CONDITION_ITEM, ">=", i32::try_from(*amount).unwrap_or(i32::MAX))
                    .with_reference_id(*material),
            );
        }
        if !conditions.is_empty() {
            builder.push_step(
                "validate_resources",
                StepStatus::Pending,
                Action::ValidateCharacterState(ValidateCharacterStatePayload {
                    character_id,
                    conditions,
                }),
            );
        }

        // 2. Consume materials
        for (material, amount) in &totals.materials {
            builder.push_step(
                format!("destroy_material_{material}"),
                StepStatus::Pending,
                Action::DestroyAsset(DestroyAssetPayload {
                    character_id,
                    template_id: *material,
                    quantity: *amount,
                    remove_all: false,
                }),
            );
        }

        // 3. Charge mesos
        if totals.meso_cost > 0 {
            builder.push_step(
                "deduct_mesos",
                StepStatus::Pending,
                Action::AwardMesos(AwardMesosPayload {
                    character_id,
                    world_id: field.world_id,
                    channel_id: field.channel_id,
                    actor_id: context.npc_id().value(),
                    actor_type: ACTOR_TYPE_NPC.to_string(),
                    amount: -totals.meso_cost,
                }),
            );
        }

        // 4. Hand over the product
        builder.push_step(
            "award_crafted_item",
            StepStatus::Pending,
            Action::AwardInventory(AwardItemPayload {
                character_id,
                item: ItemPayload {
                    template_id: item_id,
                    quantity,
                },
            }),
        );

        let saga = builder.build(self.clock.now());
        let keys = [
            (parked::CRAFT_SUCCESS, craft.success_state.as_str()),
            (parked::CRAFT_FAILURE, craft.failure_state.as_str()),
            (parked::CRAFT_MISSING_MATERIALS, craft.missing_materials_state.as_str()),
        ];
        self.park(tenant, context, saga, &keys, &craft.failure_state).await
    }

    async fn transport(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        transport: &TransportAction,
    ) -> Result<Transition, ConversationError> {
        let field = context.field();
        let saga = SagaBuilder::new(
            SagaType::InventoryTransaction,
            format!("NPC_{}_transport", context.npc_id()),
        )
        .add_step(
            "start_instance_transport",
            StepStatus::Pending,
            Action::StartInstanceTransport(StartInstanceTransportPayload {
                character_id: context.character_id(),
                world_id: field.world_id,
                channel_id: field.channel_id,
                route_name: transport.route_name.clone(),
            }),
        )
        .build(self.clock.now());

        let keys = [
            (parked::TRANSPORT_FAILURE, transport.failure_state.as_str()),
            (parked::TRANSPORT_CAPACITY_FULL, transport.capacity_full_state.as_str()),
            (parked::TRANSPORT_ALREADY_IN_TRANSIT, transport.already_in_transit_state.as_str()),
            (parked::TRANSPORT_ROUTE_NOT_FOUND, transport.route_not_found_state.as_str()),
            (parked::TRANSPORT_SERVICE_ERROR, transport.service_error_state.as_str()),
        ];
        let on_failure = if transport.service_error_state.is_empty() {
            &transport.failure_state
        } else {
            &transport.service_error_state
        };
        self.park(tenant, context, saga, &keys, on_failure).await
    }

    async fn party_quest(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        party_quest: &PartyQuestAction,
    ) -> Result<Transition, ConversationError> {
        let field = context.field();
        let saga = SagaBuilder::new(
            SagaType::InventoryTransaction,
            format!("NPC_{}_party_quest", context.npc_id()),
        )
        .add_step(
            "register_party_quest",
            StepStatus::Pending,
            Action::RegisterPartyQuest(RegisterPartyQuestPayload {
                character_id: context.character_id(),
                world_id: field.world_id,
                channel_id: field.channel_id,
                map_id: field.map_id,
                quest_id: party_quest.quest_id.clone(),
            }),
        )
        .build(self.clock.now());

        let keys = [
            (parked::PARTY_QUEST_FAILURE, party_quest.failure_state.as_str()),
            (parked::PARTY_QUEST_NOT_IN_PARTY, party_quest.not_in_party_state.as_str()),
            (parked::PARTY_QUEST_NOT_LEADER, party_quest.not_leader_state.as_str()),
        ];
        self.park(tenant, context, saga, &keys, &party_quest.failure_state)
            .await
    }

    async fn party_quest_bonus(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        bonus: &PartyQuestBonusAction,
    ) -> Result<Transition, ConversationError> {
        let saga = SagaBuilder::new(
            SagaType::InventoryTransaction,
            format!("NPC_{}_pq_bonus", context.npc_id()),
        )
        .add_step(
            "enter_party_quest_bonus",
            StepStatus::Pending,
            Action::EnterPartyQuestBonus(EnterPartyQuestBonusPayload {
                character_id: context.character_id(),
                world_id: context.field().world_id,
            }),
        )
        .build(self.clock.now());

        let keys = [(parked::PARTY_QUEST_BONUS_FAILURE, bonus.failure_state.as_str())];
        self.park(tenant, context, saga, &keys, &bonus.failure_state).await
    }

    async fn gachapon(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        gachapon: &GachaponAction,
    ) -> Result<Transition, ConversationError> {
        let character_id = context.character_id();
        let saga = SagaBuilder::new(
            SagaType::GachaponTransaction,
            format!("NPC_{}_gachapon", context.npc_id()),
        )
        .add_step(
            "destroy_ticket",
            StepStatus::Pending,
            Action::DestroyAsset(DestroyAssetPayload {
                character_id,
                template_id: gachapon.ticket_item_id,
                quantity: 1,
                remove_all: false,
            }),
        )
        .add_step(
            "select_gachapon_reward",
            StepStatus::Pending,
            Action::SelectGachaponReward(SelectGachaponRewardPayload {
                character_id,
                world_id: context.field().world_id,
                gachapon_id: gachapon.gachapon_id.clone(),
            }),
        )
        .build(self.clock.now());

        let keys = [(parked::GACHAPON_FAILURE, gachapon.failure_state.as_str())];
        self.park(tenant, context, saga, &keys, &gachapon.failure_state)
            .await
    }

    /// Parks the conversation on `saga`. The context is stored before the
    /// saga is submitted so a fast status event always finds it. When the
    /// submission fails the conversation moves to `on_failure` instead.
    async fn park(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        saga: Saga,
        keys: &[(&str, &str)],
        on_failure: &str,
    ) -> Result<Transition, ConversationError> {
        let transaction_id = saga.transaction_id;
        context.park_on(transaction_id);
        for (key, state) in keys {
            context.set_variable(*key, *state);
        }
        self.contexts.save(tenant, context.clone()).await;

        if let Err(e) = self.saga.submit(tenant, saga).await {
            tracing::error!(
                character_id = %context.character_id(),
                transaction_id = %transaction_id,
                error = %e,
                "Failed to submit saga, taking failure branch"
            );
            context.clear_pending_saga();
            for (key, _) in keys {
                context.remove_variable(key);
            }
            return Ok(Transition::Goto(on_failure.to_string()));
        }

        tracing::debug!(
            character_id = %context.character_id(),
            npc_id = %context.npc_id(),
            transaction_id = %transaction_id,
            "Saga created, conversation waiting for completion"
        );
        Ok(Transition::Wait)
    }
}

fn seed_field(context: &mut ConversationContext, field: Field) {
    context.set_variable("worldId", field.world_id.to_string());
    context.set_variable("channelId", field.channel_id.to_string());
}

fn talk_command(context: &ConversationContext, message: String, body: TalkBody) -> NpcTalkCommand {
    let field = context.field();
    NpcTalkCommand::new(
        field.world_id.value(),
        field.channel_id.value(),
        context.character_id().value(),
        context.npc_id().value(),
        message,
        body,
    )
}

fn dialogue_body(dialogue_type: DialogueType) -> TalkBody {
    match dialogue_type {
        DialogueType::SendOk => TalkBody::Ok,
        DialogueType::SendNext => TalkBody::Next,
        DialogueType::SendPrev => TalkBody::Previous,
        DialogueType::SendNextPrev => TalkBody::NextPrevious,
        DialogueType::SendYesNo => TalkBody::YesNo,
        DialogueType::SendAcceptDecline => TalkBody::AcceptDecline,
    }
}

/// Rendered menu entries with their index in the declared list.
fn menu_items(choices: &[Choice]) -> impl Iterator<Item = (usize, &Choice)> {
    choices.iter().enumerate().filter(|(_, c)| !c.is_exit())
}

fn picked(choice: Option<&Choice>) -> Option<(String, ContextMap)> {
    choice.map(|c| (c.next_state.clone(), c.context.clone()))
}

fn number_answer(
    ask: &AskNumber,
    context: &ConversationContext,
    selection: i32,
) -> Result<(String, ContextMap), ConversationError> {
    let value = u32::try_from(selection).map_err(|_| ConversationError::NegativeNumber)?;
    if value < ask.min_value {
        return Err(ConversationError::BelowMinimum);
    }
    if value > ask.max_value {
        return Err(ConversationError::AboveMaximum);
    }

    let mut values = ContextMap::new();
    values.insert(ask.context_key.clone(), value.to_string());
    if let Some(price) = context
        .variable(PRICE_KEY)
        .and_then(|p| p.trim().parse::<u64>().ok())
    {
        values.insert(TOTAL_COST_KEY.to_string(), (u64::from(value) * price).to_string());
    }
    Ok((ask.next_state.clone(), values))
}

fn styles_for(ask: &AskStyle, context: &ConversationContext) -> Result<Vec<u32>, ConversationError> {
    if !ask.styles.is_empty() {
        return Ok(ask.styles.clone());
    }
    if ask.styles_context_key.is_empty() {
        return Err(ConversationError::NoStyles);
    }
    let raw = context
        .variable(&ask.styles_context_key)
        .ok_or_else(|| ConversationError::StylesMissing(ask.styles_context_key.clone()))?;
    let styles = decode_u32_list(raw)?;
    if styles.is_empty() {
        return Err(ConversationError::NoStyles);
    }
    Ok(styles)
}

struct CraftTotals {
    materials: Vec<(u32, u32)>,
    meso_cost: i32,
}

/// Scales materials and cost by the crafted quantity.
fn craft_totals(craft: &CraftAction, quantity: u32) -> Option<CraftTotals> {
    let materials = craft
        .materials
        .iter()
        .zip(&craft.quantities)
        .map(|(material, amount)| amount.checked_mul(quantity).map(|total| (*material, total)))
        .collect::<Option<Vec<_>>>()?;
    let meso_cost = craft
        .meso_cost
        .checked_mul(quantity)
        .and_then(|cost| i32::try_from(cost).ok())?;
    Some(CraftTotals {
        materials,
        meso_cost,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use atlas_domain::conversation::{Condition, Operation, Outcome};
    use atlas_domain::{ChannelId, MapId, TenantId, ValidationVerdict, WorldId};
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::ports::{
        MockAppearancePort, MockConversationRepo, MockInventoryPort, MockMapPort,
        MockNpcTalkPort, MockPetPort, MockSagaPort, MockValidationPort, SagaError,
    };

    const NPC: u32 = 2_040_016;
    const CHARACTER: u32 = 7;

    struct Harness {
        tenant: Tenant,
        processor: ConversationProcessor,
        contexts: Arc<ConversationContexts>,
        talk: Arc<Mutex<Vec<NpcTalkCommand>>>,
        sagas: Arc<Mutex<Vec<Saga>>>,
    }

    struct Options {
        saga_fails: bool,
        validation_passes: bool,
        record_talk: bool,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                saga_fails: false,
                validation_passes: true,
                record_talk: true,
            }
        }
    }

    fn harness(conversation: Conversation, options: Options) -> Harness {
        let mut repo = MockConversationRepo::new();
        repo.expect_get_for_npc()
            .returning(move |_, _| Ok(Some(conversation.clone())));

        let talk_log = Arc::new(Mutex::new(Vec::new()));
        let mut talk = MockNpcTalkPort::new();
        if options.record_talk {
            let sink = talk_log.clone();
            talk.expect_send().returning(move |_, command| {
                sink.lock().expect("lock").push(command);
                Ok(())
            });
        }

        let saga_log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = MockSagaPort::new();
        let sink = saga_log.clone();
        let fails = options.saga_fails;
        saga.expect_submit().returning(move |_, s| {
            if fails {
                return Err(SagaError::Submission("broker unavailable".into()));
            }
            sink.lock().expect("lock").push(s);
            Ok(())
        });
        let saga: Arc<dyn SagaPort> = Arc::new(saga);

        let mut validation = MockValidationPort::new();
        let passes = options.validation_passes;
        validation.expect_validate().returning(move |_, _, _| {
            Ok(if passes {
                ValidationVerdict::passed()
            } else {
                ValidationVerdict::failed("meso below threshold")
            })
        });

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
            Arc::new(repo),
            contexts.clone(),
            Arc::new(talk),
            saga,
            Arc::new(executor),
            Arc::new(ConditionEvaluator::new(Arc::new(validation))),
            clock,
        );
        Harness {
            tenant: tenant(),
            processor,
            contexts,
            talk: talk_log,
            sagas: saga_log,
        }
    }

    fn tenant() -> Tenant {
        Tenant::new(TenantId::new(), "GMS", 83, 1)
    }

    fn field() -> Field {
        Field::new(WorldId::from_raw(0), ChannelId::from_raw(1), MapId::from_raw(100_000_000))
    }

    fn character() -> CharacterId {
        CharacterId::from_raw(CHARACTER)
    }

    fn dialogue(dialogue_type: DialogueType, text: &str, choices: Vec<Choice>) -> StateKind {
        StateKind::Dialogue(Dialogue {
            dialogue_type,
            text: text.into(),
            speaker: Speaker::Npc,
            end_chat: true,
            secondary_npc_id: None,
            choices,
        })
    }

    fn craft_state() -> State {
        State::new(
            "craft",
            StateKind::CraftAction(CraftAction {
                item_id: "1002000".into(),
                materials: vec![4_000_313],
                quantities: vec![2],
                meso_cost: 100,
                success_state: "ok".into(),
                failure_state: "fail".into(),
                missing_materials_state: "nomat".into(),
            }),
        )
    }

    fn shop_conversation() -> Conversation {
        Conversation::new(
            NpcId::from_raw(NPC),
            "greet",
            vec![
                State::new(
                    "greet",
                    dialogue(
                        DialogueType::SendNext,
                        "I am {context.npcName}.",
                        vec![Choice::new("Next", "menu"), Choice::new("Exit", "")],
                    ),
                ),
                State::new(
                    "menu",
                    StateKind::ListSelection(ListSelection {
                        title: "What would you like?".into(),
                        choices: vec![
                            Choice::new("Hat", "amount").with_context("price", "310"),
                            Choice::new("Exit", ""),
                        ],
                    }),
                ),
                State::new(
                    "amount",
                    StateKind::AskNumber(AskNumber {
                        text: "How many?".into(),
                        default_value: 1,
                        min_value: 1,
                        max_value: 100,
                        context_key: "quantity".into(),
                        next_state: "craft".into(),
                    }),
                ),
                craft_state(),
                State::new("ok", dialogue(DialogueType::SendOk, "Done!", vec![])),
                State::new("fail", dialogue(DialogueType::SendOk, "Something broke.", vec![])),
                State::new("nomat", dialogue(DialogueType::SendOk, "Bring materials.", vec![])),
            ],
        )
        .with_variable("npcName", "Mr. Smith")
    }

    async fn start(h: &Harness) -> Result<(), ConversationError> {
        h.processor
            .start(&h.tenant, NpcId::from_raw(NPC), character(), field(), AccountId::from_raw(1000))
            .await
    }

    #[tokio::test]
    async fn dialogue_list_number_then_craft_parks_on_saga() {
        let h = harness(shop_conversation(), Options::default());
        let t = h.tenant.clone();

        start(&h).await.expect("start");
        {
            let talk = h.talk.lock().expect("lock");
            assert_eq!(talk[0].body, TalkBody::Next);
            assert_eq!(talk[0].message, "I am Mr. Smith.");
        }
        let ctx = h.contexts.get(&t, character()).await.expect("context");
        assert_eq!(ctx.variable("worldId"), Some("0"));
        assert_eq!(ctx.variable("channelId"), Some("1"));
        assert_eq!(ctx.variable("accountId"), Some("1000"));

        h.processor
            .continue_conversation(&t, NpcId::from_raw(NPC), character(), 1, 0, 0)
            .await
            .expect("next");
        assert_eq!(
            h.talk.lock().expect("lock")[1].message,
            "What would you like?\r\n#L0##bHat#k#l\r\n"
        );

        h.processor
            .continue_conversation(&t, NpcId::from_raw(NPC), character(), 1, 4, 0)
            .await
            .expect("select");
        assert!(matches!(
            h.talk.lock().expect("lock")[2].body,
            TalkBody::Num(NumBody { default_value: 1, min_value: 1, max_value: 100 })
        ));

        h.processor
            .continue_conversation(&t, NpcId::from_raw(NPC), character(), 1, 3, 10)
            .await
            .expect("number");

        let ctx = h.contexts.get(&t, character()).await.expect("parked context");
        assert_eq!(ctx.current_state(), "craft");
        assert_eq!(ctx.variable("npcName"), Some("Mr. Smith"));
        assert_eq!(ctx.variable("quantity"), Some("10"));
        assert_eq!(ctx.variable("totalCost"), Some("3100"));
        assert_eq!(ctx.variable(parked::CRAFT_SUCCESS), Some("ok"));

        let sagas = h.sagas.lock().expect("lock");
        assert_eq!(sagas.len(), 1);
        assert_eq!(ctx.pending_saga_id(), Some(sagas[0].transaction_id));
    }

    #[tokio::test]
    async fn craft_saga_scales_by_quantity() {
        let conversation = Conversation::new(
            NpcId::from_raw(NPC),
            "craft",
            vec![
                craft_state(),
                State::new("ok", dialogue(DialogueType::SendOk, "Done!", vec![])),
            ],
        );
        let h = harness(conversation.clone(), Options::default());
        let t = h.tenant.clone();

        let mut ctx = ConversationContext::start(character(), NpcId::from_raw(NPC), field(), conversation);
        ctx.set_variable("quantity", "3");
        ctx.set_variable("price", "310");
        ctx.set_current_state("craft");
        h.contexts.save(&t, ctx).await;
        h.processor.drive(&t, character()).await.expect("drive");

        let sagas = h.sagas.lock().expect("lock");
        let saga = &sagas[0];
        assert_eq!(saga.saga_type, SagaType::InventoryTransaction);
        assert_eq!(saga.initiated_by, format!("NPC_{NPC}"));
        let ids: Vec<&str> = saga.steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(
            ids,
            ["validate_resources", "destroy_material_4000313", "deduct_mesos", "award_crafted_item"]
        );

        match &saga.steps[0].action {
            Action::ValidateCharacterState(p) => {
                assert_eq!(p.conditions[0].condition_type, CONDITION_MESO);
                assert_eq!(p.conditions[0].value, 300);
                assert_eq!(p.conditions[1].condition_type, CONDITION_ITEM);
                assert_eq!(p.conditions[1].value, 6);
                assert_eq!(p.conditions[1].reference_id, 4_000_313);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&saga.steps[1].action, Action::DestroyAsset(p) if p.quantity == 6));
        assert!(matches!(&saga.steps[2].action, Action::AwardMesos(p) if p.amount == -300));
        assert!(matches!(
            &saga.steps[3].action,
            Action::AwardInventory(p) if p.item.template_id == 1_002_000 && p.item.quantity == 3
        ));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let h = harness(shop_conversation(), Options::default());
        start(&h).await.expect("start");
        let err = start(&h).await.expect_err("already talking");
        assert!(matches!(err, ConversationError::AlreadyInConversation));
        assert_eq!(err.to_string(), "another conversation exists");
    }

    #[tokio::test]
    async fn number_bounds_are_enforced() {
        let h = harness(shop_conversation(), Options::default());
        let t = h.tenant.clone();
        let mut ctx = ConversationContext::start(character(), NpcId::from_raw(NPC), field(), shop_conversation());
        ctx.set_current_state("amount");
        h.contexts.save(&t, ctx).await;

        let npc = NpcId::from_raw(NPC);
        for (selection, expected) in [
            (-1, "invalid number input: negative value"),
            (0, "number below minimum value"),
            (101, "number above maximum value"),
        ] {
            let err = h
                .processor
                .continue_conversation(&t, npc, character(), 1, 3, selection)
                .await
                .expect_err("out of bounds");
            assert_eq!(err.to_string(), expected);
        }
        // The context survives rejected input.
        assert!(h.contexts.get(&t, character()).await.is_some());
    }

    #[tokio::test]
    async fn style_prompt_reads_context_and_cancel_ends() {
        let conversation = Conversation::new(
            NpcId::from_raw(NPC),
            "style",
            vec![
                State::new(
                    "style",
                    StateKind::AskStyle(AskStyle {
                        text: "Pick one".into(),
                        styles: vec![],
                        styles_context_key: "generatedStyles".into(),
                        context_key: "selectedStyle".into(),
                        next_state: "done".into(),
                    }),
                ),
                State::new("done", dialogue(DialogueType::SendOk, "Looks great.", vec![])),
            ],
        );
        let h = harness(conversation.clone(), Options::default());
        let t = h.tenant.clone();
        let npc = NpcId::from_raw(NPC);

        let mut ctx = ConversationContext::start(character(), npc, field(), conversation.clone());
        ctx.set_variable("generatedStyles", "30030,30020");
        h.contexts.save(&t, ctx.clone()).await;
        h.processor.drive(&t, character()).await.expect("drive");
        assert_eq!(
            h.talk.lock().expect("lock")[0].body,
            TalkBody::Style(StyleBody { styles: vec![30_030, 30_020] })
        );

        let err = h
            .processor
            .continue_conversation(&t, npc, character(), 1, 0, 2)
            .await
            .expect_err("out of bounds");
        assert!(matches!(err, ConversationError::StyleOutOfBounds));

        h.processor
            .continue_conversation(&t, npc, character(), 0, 0, 0)
            .await
            .expect("cancel");
        assert!(h.contexts.get(&t, character()).await.is_none());

        h.contexts.save(&t, ctx).await;
        h.processor
            .continue_conversation(&t, npc, character(), 1, 0, 1)
            .await
            .expect("select");
        // "done" has no choices, so the conversation ended after rendering it.
        assert!(h.contexts.get(&t, character()).await.is_none());
        assert_eq!(h.talk.lock().expect("lock").last().map(|c| c.message.as_str()), Some("Looks great."));
    }

    #[tokio::test]
    async fn generic_action_branches_on_first_condition() {
        let conversation = Conversation::new(
            NpcId::from_raw(NPC),
            "check",
            vec![
                State::new(
                    "check",
                    StateKind::GenericAction(GenericAction {
                        operations: vec![Operation::new("award_mesos").with_param("amount", "-500")],
                        outcomes: vec![
                            Outcome {
                                conditions: vec![Condition::new(CONDITION_MESO, ">=", "500")],
                                next_state: "rich".into(),
                            },
                            Outcome {
                                conditions: vec![],
                                next_state: "poor".into(),
                            },
                        ],
                    }),
                ),
                State::new("rich", dialogue(DialogueType::SendOk, "rich", vec![])),
                State::new("poor", dialogue(DialogueType::SendOk, "poor", vec![])),
            ],
        );
        let h = harness(
            conversation,
            Options {
                validation_passes: false,
                ..Options::default()
            },
        );
        start(&h).await.expect("start");

        assert_eq!(h.talk.lock().expect("lock")[0].message, "poor");
        assert_eq!(h.sagas.lock().expect("lock")[0].initiated_by, "npc-conversation-award_mesos");
    }

    #[tokio::test]
    async fn generic_action_failure_clears_context() {
        let conversation = Conversation::new(
            NpcId::from_raw(NPC),
            "broken",
            vec![State::new(
                "broken",
                StateKind::GenericAction(GenericAction {
                    operations: vec![Operation::new("local:teleport")],
                    outcomes: vec![],
                }),
            )],
        );
        let h = harness(conversation, Options::default());
        let err = start(&h).await.expect_err("unknown op");
        assert_eq!(err.to_string(), "unknown local operation type: teleport");
        assert!(h.contexts.get(&h.tenant, character()).await.is_none());
    }

    #[tokio::test]
    async fn transport_submission_failure_takes_service_error_branch() {
        let conversation = Conversation::new(
            NpcId::from_raw(NPC),
            "ride",
            vec![
                State::new(
                    "ride",
                    StateKind::TransportAction(TransportAction {
                        route_name: "ellinia-orbis".into(),
                        failure_state: "fail".into(),
                        service_error_state: "down".into(),
                        ..TransportAction::default()
                    }),
                ),
                State::new("fail", dialogue(DialogueType::SendOk, "fail", vec![])),
                State::new("down", dialogue(DialogueType::SendOk, "down", vec![])),
            ],
        );
        let h = harness(
            conversation,
            Options {
                saga_fails: true,
                ..Options::default()
            },
        );
        start(&h).await.expect("start");
        assert_eq!(h.talk.lock().expect("lock")[0].message, "down");
        assert!(h.contexts.get(&h.tenant, character()).await.is_none());
    }

    #[tokio::test]
    async fn continue_on_action_state_is_unexpected() {
        let h = harness(shop_conversation(), Options::default());
        let t = h.tenant.clone();
        let mut ctx = ConversationContext::start(character(), NpcId::from_raw(NPC), field(), shop_conversation());
        ctx.set_current_state("craft");
        h.contexts.save(&t, ctx).await;

        let err = h
            .processor
            .continue_conversation(&t, NpcId::from_raw(NPC), character(), 1, 0, 0)
            .await
            .expect_err("unexpected");
        assert_eq!(err.to_string(), "unexpected state type for Continue: craftAction");
    }

    #[tokio::test]
    async fn panics_are_recovered_and_clear_context() {
        // No talk expectation: the mock panics on the first send.
        let h = harness(
            shop_conversation(),
            Options {
                record_talk: false,
                ..Options::default()
            },
        );
        let err = start(&h).await.expect_err("panicked");
        assert!(matches!(err, ConversationError::Panicked));
        assert!(h.contexts.get(&h.tenant, character()).await.is_none());
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let h = harness(shop_conversation(), Options::default());
        let t = h.tenant.clone();
        start(&h).await.expect("start");
        h.processor.end(&t, character()).await.expect("end");
        h.processor.end(&t, character()).await.expect("end again");
        assert!(h.processor.context(&t, character()).await.is_none());
    }
}
