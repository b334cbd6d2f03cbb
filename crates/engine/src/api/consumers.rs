//! Topic consumers.
//!
//! One task reads the bus and routes each message to its use case by topic.
//! Messages on topics the engine only produces (saga commands, NPC talk,
//! drops) are skipped. Handler failures are logged and never stop the loop.

use std::sync::Arc;

use atlas_domain::conversation::cosmetic::CosmeticKind;
use atlas_domain::{
    AccountId, Channel, ChannelId, Character, CharacterId, Field, JobId, MapId, NpcId, Tenant,
    WorldId,
};
use atlas_shared::character::CreateCharacterBody;
use atlas_shared::{
    CharacterCommand, CommandBody, ConversationCommand, ConversationCommandBody, MovementCommand,
    SagaStatusEvent, StatusEvent, StatusEventBody, Topic,
};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::app::App;
use crate::infrastructure::producer::Envelope;
use crate::use_cases::character::CharacterError;
use crate::use_cases::conversation::ConversationError;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Failed to decode {topic} message: {source}")]
    Decode {
        topic: Topic,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Character(#[from] CharacterError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Starts consuming. The task ends when the bus closes.
pub fn spawn(app: Arc<App>) -> JoinHandle<()> {
    let mut rx = app.bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if let Err(e) = dispatch(&app, &envelope).await {
                        tracing::warn!(topic = %envelope.topic, key = %envelope.message.key, error = %e, "Failed to handle message");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Consumer lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("Consumer stopped");
    })
}

fn decode<T: DeserializeOwned>(topic: Topic, envelope: &Envelope) -> Result<T, ConsumerError> {
    serde_json::from_slice(&envelope.message.value)
        .map_err(|source| ConsumerError::Decode { topic, source })
}

/// Routes one message to its handler.
pub async fn dispatch(app: &App, envelope: &Envelope) -> Result<(), ConsumerError> {
    let Some(topic) = app.bus.names().topic(&envelope.topic) else {
        tracing::trace!(topic = %envelope.topic, "Ignoring message on unknown topic");
        return Ok(());
    };
    let tenant = &envelope.tenant;

    match topic {
        Topic::CharacterCommand => {
            handle_character_command(app, tenant, decode(topic, envelope)?).await
        }
        Topic::CharacterStatus => handle_status_event(app, tenant, decode(topic, envelope)?).await,
        Topic::CharacterMovement => {
            let command: MovementCommand = decode(topic, envelope)?;
            app.use_cases
                .character
                .movement
                .execute(tenant, &command)
                .await?;
            Ok(())
        }
        Topic::SagaStatus => {
            let event: SagaStatusEvent = decode(topic, envelope)?;
            app.use_cases
                .conversation
                .resume
                .execute(tenant, &event)
                .await?;
            Ok(())
        }
        Topic::NpcConversationCommand => {
            handle_conversation_command(app, tenant, decode(topic, envelope)?).await
        }
        Topic::SagaCommand | Topic::NpcCommand | Topic::DropCommand => Ok(()),
    }
}

// =============================================================================
// Character commands
// =============================================================================

async fn handle_character_command(
    app: &App,
    tenant: &Tenant,
    command: CharacterCommand,
) -> Result<(), ConsumerError> {
    let processor = &app.use_cases.character.processor;
    let growth = &app.use_cases.character.growth;
    let txn = command.transaction_id;
    let id = CharacterId::from_raw(command.character_id);
    let world_id = WorldId::from_raw(command.world_id);
    let field = |channel_id: u8, map_id: u32| {
        Field::new(world_id, ChannelId::from_raw(channel_id), MapId::from_raw(map_id))
    };
    tracing::debug!(
        character_id = %id,
        transaction_id = %txn,
        command = command.body.type_name(),
        "Handling character command"
    );

    match command.body {
        CommandBody::CreateCharacter(body) => {
            let name = body.name.clone();
            let input = character_from_command(world_id, body);
            if let Err(e) = processor.create(tenant, txn, input).await {
                processor
                    .creation_failed(tenant, txn, world_id, &name, &e)
                    .await?;
                return Err(e.into());
            }
        }
        CommandBody::RequestChangeMeso(body) => {
            processor
                .change_meso(tenant, txn, id, body.actor_id, &body.actor_type, body.amount)
                .await?
        }
        CommandBody::RequestDropMeso(body) => {
            processor
                .drop_meso(tenant, txn, id, field(body.channel_id, body.map_id), body.amount)
                .await?
        }
        CommandBody::RequestPickUpMeso(body) => {
            processor
                .pick_up_meso(
                    tenant,
                    txn,
                    id,
                    field(body.channel_id, body.map_id),
                    body.drop_id,
                    body.amount,
                )
                .await?
        }
        CommandBody::RequestChangeFame(body) => {
            processor
                .change_fame(tenant, txn, id, body.actor_id, &body.actor_type, body.amount)
                .await?
        }
        CommandBody::RequestDistributeAp(body) => {
            growth.distribute_ap(tenant, txn, id, body.distributions).await?
        }
        CommandBody::RequestDistributeSp(body) => {
            growth
                .distribute_sp(tenant, txn, id, body.skill_id, body.amount)
                .await?
        }
        CommandBody::ChangeHp(body) => {
            processor
                .change_hp(tenant, txn, id, ChannelId::from_raw(body.channel_id), body.amount)
                .await?
        }
        CommandBody::ChangeMp(body) => {
            processor
                .change_mp(tenant, txn, id, ChannelId::from_raw(body.channel_id), body.amount)
                .await?
        }
        CommandBody::AwardExperience(body) => {
            processor
                .award_experience(
                    tenant,
                    txn,
                    id,
                    ChannelId::from_raw(body.channel_id),
                    body.distributions,
                )
                .await?
        }
        CommandBody::AwardLevel(body) => {
            processor
                .award_level(tenant, txn, id, ChannelId::from_raw(body.channel_id), body.amount)
                .await?
        }
        CommandBody::ChangeJob(body) => {
            processor
                .change_job(
                    tenant,
                    txn,
                    id,
                    ChannelId::from_raw(body.channel_id),
                    JobId::from_raw(body.job_id),
                )
                .await?
        }
        CommandBody::ChangeHair(body) => {
            processor
                .change_style(tenant, txn, id, ChannelId::from_raw(body.channel_id), CosmeticKind::Hair, body.style_id)
                .await?
        }
        CommandBody::ChangeFace(body) => {
            processor
                .change_style(tenant, txn, id, ChannelId::from_raw(body.channel_id), CosmeticKind::Face, body.style_id)
                .await?
        }
        CommandBody::ChangeSkin(body) => {
            processor
                .change_style(tenant, txn, id, ChannelId::from_raw(body.channel_id), CosmeticKind::Skin, body.style_id)
                .await?
        }
        CommandBody::ChangeMap(body) => {
            processor
                .change_map(tenant, txn, id, field(body.channel_id, body.map_id), body.portal_id)
                .await?
        }
        CommandBody::ChangeChannel(body) => {
            processor
                .change_channel(
                    tenant,
                    txn,
                    id,
                    ChannelId::from_raw(body.channel_id),
                    ChannelId::from_raw(body.old_channel_id),
                )
                .await?
        }
        CommandBody::Login(body) => {
            let channel = Channel::new(world_id, ChannelId::from_raw(body.channel_id));
            processor.login(tenant, txn, id, channel).await?
        }
        CommandBody::Logout(body) => {
            let channel = Channel::new(world_id, ChannelId::from_raw(body.channel_id));
            processor.logout(tenant, txn, id, channel).await?
        }
    }
    Ok(())
}

/// New characters start at full HP and MP.
fn character_from_command(world_id: WorldId, body: CreateCharacterBody) -> Character {
    Character::new(AccountId::from_raw(body.account_id), world_id, body.name)
        .with_level(body.level)
        .with_job(JobId::from_raw(body.job_id))
        .with_stats(body.strength, body.dexterity, body.intelligence, body.luck)
        .with_hp_mp(body.max_hp, body.max_hp, body.max_mp, body.max_mp)
        .with_gm(body.gm)
        .with_appearance(body.gender, body.skin_color, body.hair, body.face)
        .with_map(MapId::from_raw(body.map_id), 0)
}

// =============================================================================
// Character status events
// =============================================================================

/// Level and job changes drive stat growth; every other status is ignored.
async fn handle_status_event(app: &App, tenant: &Tenant, event: StatusEvent) -> Result<(), ConsumerError> {
    let growth = &app.use_cases.character.growth;
    let id = CharacterId::from_raw(event.character_id);
    match event.body {
        StatusEventBody::LevelChanged(body) => {
            growth
                .process_level_change(
                    tenant,
                    event.transaction_id,
                    id,
                    ChannelId::from_raw(body.channel_id),
                    body.amount,
                )
                .await?
        }
        StatusEventBody::JobChanged(body) => {
            growth
                .process_job_change(
                    tenant,
                    event.transaction_id,
                    id,
                    ChannelId::from_raw(body.channel_id),
                    JobId::from_raw(body.job_id),
                )
                .await?
        }
        _ => {}
    }
    Ok(())
}

// =============================================================================
// NPC conversation commands
// =============================================================================

async fn handle_conversation_command(
    app: &App,
    tenant: &Tenant,
    command: ConversationCommand,
) -> Result<(), ConsumerError> {
    let processor = &app.use_cases.conversation.processor;
    let character_id = CharacterId::from_raw(command.character_id);
    let npc_id = NpcId::from_raw(command.npc_id);

    match command.body {
        ConversationCommandBody::Start(body) => {
            let field = Field::new(
                WorldId::from_raw(command.world_id),
                ChannelId::from_raw(command.channel_id),
                MapId::from_raw(command.map_id),
            );
            processor
                .start(tenant, npc_id, character_id, field, AccountId::from_raw(body.account_id))
                .await?
        }
        ConversationCommandBody::Continue(body) => {
            processor
                .continue_conversation(
                    tenant,
                    npc_id,
                    character_id,
                    body.action,
                    body.last_message_type,
                    body.selection,
                )
                .await?
        }
        ConversationCommandBody::End => processor.end(tenant, character_id).await?,
    }
    Ok(())
}
