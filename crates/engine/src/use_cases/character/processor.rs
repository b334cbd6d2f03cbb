//! Character lifecycle and stat mutations.

use std::sync::{Arc, LazyLock};

use atlas_domain::conversation::cosmetic::CosmeticKind;
use atlas_domain::{
    experience_for_level, Channel, ChannelId, Character, CharacterId, Field, JobId, MapId,
    Modifier, Stat, Tenant, WorldId, MAX_LEVEL, MIN_LEVEL,
};
use atlas_domain::character::growth::enforce_bounds;
use atlas_shared::character::{
    ActorChangedBody, AwardLevelBody, ChannelChangedBody, CreatedBody, CreationFailedBody,
    DeletedBody, ErrorBody,
    ExperienceChangedBody, ExperienceDistribution, FaceChangedBody, FieldEventBody,
    GenderChangedBody, GmChangedBody, HairChangedBody, JobChangedBody, LevelChangedBody,
    MapChangedBody, NameChangedBody, SkinColorChangedBody,
};
use atlas_shared::drop::{RequestPickUpBody, SpawnFromCharacterBody, DROP_TYPE_MESO};
use atlas_shared::{
    CharacterCommand, CharacterRestModel, CommandBody, DropCommand, DropCommandBody, StatusEvent,
    StatusEventBody, Topic,
};
use regex_lite::Regex;
use uuid::Uuid;

use super::{stage_stats, stage_status, CharacterError};
use crate::infrastructure::message_buffer::MessageBuffer;
use crate::infrastructure::ports::{
    CharacterQuery, CharacterRepo, MapPort, MesoAdjustment, ProducerPort, RepoError,
};
use crate::infrastructure::temporal::TemporalRegistry;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]{3,12}$")
        .expect("valid regex")
});

const HAIR_RANGE: std::ops::RangeInclusive<u32> = 30_000..=34_999;
const FACE_RANGE: std::ops::RangeInclusive<u32> = 20_000..=24_999;
const MAX_GENDER: u8 = 1;
const MAX_SKIN_COLOR: u8 = 9;
const MAX_GM: i32 = 1;

/// Latin letters, digits, kana and common CJK ideographs; three to twelve
/// characters.
pub fn is_valid_name_format(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// A partial character update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub hair: Option<u32>,
    pub face: Option<u32>,
    pub gender: Option<u8>,
    pub skin_color: Option<u8>,
    pub gm: Option<i32>,
    pub map_id: Option<MapId>,
}

fn set<T: Default + PartialEq>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

/// Zero values in a REST body mean "not provided".
impl From<&CharacterRestModel> for CharacterPatch {
    fn from(model: &CharacterRestModel) -> Self {
        Self {
            name: set(model.name.clone()),
            hair: set(model.hair),
            face: set(model.face),
            gender: set(model.gender),
            skin_color: set(model.skin_color),
            gm: set(model.gm),
            map_id: set(model.map_id).map(MapId::from_raw),
        }
    }
}

impl CharacterPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct CharacterProcessor {
    characters: Arc<dyn CharacterRepo>,
    maps: Arc<dyn MapPort>,
    temporal: Arc<TemporalRegistry>,
    producer: Arc<dyn ProducerPort>,
}

impl CharacterProcessor {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        maps: Arc<dyn MapPort>,
        temporal: Arc<TemporalRegistry>,
        producer: Arc<dyn ProducerPort>,
    ) -> Self {
        Self {
            characters,
            maps,
            temporal,
            producer,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, tenant: &Tenant, id: CharacterId) -> Result<Character, CharacterError> {
        self.characters
            .get(tenant, id)
            .await?
            .ok_or(CharacterError::NotFound(id))
    }

    pub async fn query(
        &self,
        tenant: &Tenant,
        query: CharacterQuery,
    ) -> Result<Vec<Character>, CharacterError> {
        Ok(self.characters.query(tenant, query).await?)
    }

    /// Whether `name` is well formed and unused within the tenant.
    pub async fn is_valid_name(&self, tenant: &Tenant, name: &str) -> Result<bool, CharacterError> {
        if !is_valid_name_format(name) {
            return Ok(false);
        }
        let taken = self
            .characters
            .query(tenant, CharacterQuery::ByName(name.to_string()))
            .await?;
        Ok(taken.is_empty())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn create(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        input: Character,
    ) -> Result<Character, CharacterError> {
        // 1. Validate
        if !self.is_valid_name(tenant, input.name()).await? {
            tracing::info!(name = %input.name(), "Attempting to create a character with an invalid name");
            return Err(CharacterError::BlockedName);
        }
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&input.level()) {
            tracing::info!(level = input.level(), "Attempting to create a character with an invalid level");
            return Err(CharacterError::InvalidLevel);
        }

        // 2. Persist
        let created = self.characters.create(tenant, input).await.map_err(|e| {
            if matches!(e, RepoError::ConstraintViolation(_)) {
                CharacterError::BlockedName
            } else {
                CharacterError::Repo(e)
            }
        })?;

        // 3. Announce
        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &created,
            StatusEventBody::Created(CreatedBody {
                name: created.name().to_string(),
            }),
        )?;
        buffer.flush(tenant, self.producer.as_ref()).await?;

        tracing::info!(character_id = %created.id(), name = %created.name(), "Character created");
        Ok(created)
    }

    /// Announces a rejected creation. No character exists yet, so the event
    /// carries character id zero.
    pub async fn creation_failed(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        world_id: WorldId,
        name: &str,
        error: &CharacterError,
    ) -> Result<(), CharacterError> {
        let event = StatusEvent::new(
            transaction_id,
            0,
            world_id.value(),
            StatusEventBody::CreationFailed(CreationFailedBody {
                name: name.to_string(),
                message: error.to_string(),
            }),
        );
        let mut buffer = MessageBuffer::new();
        buffer.put_json(Topic::CharacterStatus, 0, &event)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Applies a validated partial update. One event per changed column;
    /// values equal to the current ones are skipped.
    pub async fn update(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        patch: CharacterPatch,
    ) -> Result<Character, CharacterError> {
        let current = self.get(tenant, id).await?;

        let mut modifiers = Vec::new();
        let mut events = Vec::new();

        if let Some(name) = patch.name.filter(|n| n != current.name()) {
            let taken = self
                .characters
                .query(tenant, CharacterQuery::ByName(name.clone()))
                .await?
                .iter()
                .any(|c| c.id() != id);
            if !is_valid_name_format(&name) || taken {
                return Err(CharacterError::InvalidName);
            }
            events.push(StatusEventBody::NameChanged(NameChangedBody::new(
                current.name().to_string(),
                name.clone(),
            )));
            modifiers.push(Modifier::Name(name));
        }
        if let Some(hair) = patch.hair.filter(|h| *h != current.hair()) {
            if !HAIR_RANGE.contains(&hair) {
                return Err(CharacterError::InvalidHair);
            }
            events.push(StatusEventBody::HairChanged(HairChangedBody::new(current.hair(), hair)));
            modifiers.push(Modifier::Hair(hair));
        }
        if let Some(face) = patch.face.filter(|f| *f != current.face()) {
            if !FACE_RANGE.contains(&face) {
                return Err(CharacterError::InvalidFace);
            }
            events.push(StatusEventBody::FaceChanged(FaceChangedBody::new(current.face(), face)));
            modifiers.push(Modifier::Face(face));
        }
        if let Some(gender) = patch.gender.filter(|g| *g != current.gender()) {
            if gender > MAX_GENDER {
                return Err(CharacterError::InvalidGender);
            }
            events.push(StatusEventBody::GenderChanged(GenderChangedBody::new(
                current.gender(),
                gender,
            )));
            modifiers.push(Modifier::Gender(gender));
        }
        if let Some(skin) = patch.skin_color.filter(|s| *s != current.skin_color()) {
            if skin > MAX_SKIN_COLOR {
                return Err(CharacterError::InvalidSkinColor);
            }
            events.push(StatusEventBody::SkinColorChanged(SkinColorChangedBody::new(
                current.skin_color(),
                skin,
            )));
            modifiers.push(Modifier::SkinColor(skin));
        }
        if let Some(gm) = patch.gm.filter(|g| *g != current.gm()) {
            if !(0..=MAX_GM).contains(&gm) {
                return Err(CharacterError::InvalidGm);
            }
            events.push(StatusEventBody::GmChanged(GmChangedBody::new(current.is_gm(), gm != 0)));
            modifiers.push(Modifier::Gm(gm));
        }
        if let Some(map_id) = patch.map_id.filter(|m| *m != current.map_id()) {
            if !self.maps.can_enter(tenant, map_id, current.level()).await? {
                return Err(CharacterError::InvalidMap);
            }
            // Stored rows carry no channel and a PATCH arrives outside any
            // session, so the event names channel 0 like other REST edits.
            events.push(StatusEventBody::MapChanged(MapChangedBody {
                channel_id: 0,
                old_map_id: current.map_id().value(),
                target_map_id: map_id.value(),
                target_portal_id: 0,
            }));
            modifiers.push(Modifier::Map(map_id));
        }

        if modifiers.is_empty() {
            return Ok(current);
        }

        let updated = self.characters.update(tenant, id, modifiers).await?;
        let mut buffer = MessageBuffer::new();
        for body in events {
            stage_status(&mut buffer, transaction_id, &updated, body)?;
        }
        buffer.flush(tenant, self.producer.as_ref()).await?;

        tracing::info!(character_id = %id, "Character updated");
        Ok(updated)
    }

    pub async fn delete(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        self.characters.delete(tenant, id).await?;
        if let Err(e) = self.temporal.remove(tenant, id).await {
            tracing::warn!(character_id = %id, error = %e, "Failed to remove temporal data");
        }

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &character,
            StatusEventBody::Deleted(DeletedBody {}),
        )?;
        buffer.flush(tenant, self.producer.as_ref()).await?;

        tracing::info!(character_id = %id, "Character deleted");
        Ok(())
    }

    // =========================================================================
    // Session and location
    // =========================================================================

    pub async fn login(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel: Channel,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let body = FieldEventBody {
            channel_id: channel.channel_id.value(),
            map_id: character.map_id().value(),
        };
        self.announce(tenant, transaction_id, &character, StatusEventBody::Login(body))
            .await
    }

    pub async fn logout(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel: Channel,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let body = FieldEventBody {
            channel_id: channel.channel_id.value(),
            map_id: character.map_id().value(),
        };
        self.announce(tenant, transaction_id, &character, StatusEventBody::Logout(body))
            .await
    }

    pub async fn change_channel(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        old_channel_id: ChannelId,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let body = ChannelChangedBody {
            channel_id: channel_id.value(),
            old_channel_id: old_channel_id.value(),
            map_id: character.map_id().value(),
        };
        self.announce(tenant, transaction_id, &character, StatusEventBody::ChannelChanged(body))
            .await
    }

    pub async fn change_map(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        field: Field,
        portal_id: u32,
    ) -> Result<(), CharacterError> {
        let current = self.get(tenant, id).await?;
        let updated = self
            .characters
            .update(tenant, id, vec![Modifier::Map(field.map_id)])
            .await?;

        let body = MapChangedBody {
            channel_id: field.channel_id.value(),
            old_map_id: current.map_id().value(),
            target_map_id: field.map_id.value(),
            target_portal_id: portal_id,
        };
        tracing::debug!(character_id = %id, map_id = %field.map_id, portal_id, "Character changed map");
        self.announce(tenant, transaction_id, &updated, StatusEventBody::MapChanged(body))
            .await
    }

    async fn announce(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        character: &Character,
        body: StatusEventBody,
    ) -> Result<(), CharacterError> {
        let mut buffer = MessageBuffer::new();
        stage_status(&mut buffer, transaction_id, character, body)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    // =========================================================================
    // Progression
    // =========================================================================

    pub async fn change_job(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        job_id: JobId,
    ) -> Result<(), CharacterError> {
        tracing::debug!(character_id = %id, job_id = %job_id, "Attempting to set character job");
        self.get(tenant, id).await?;
        let updated = self
            .characters
            .update(tenant, id, vec![Modifier::Job(job_id)])
            .await?;

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &updated,
            StatusEventBody::JobChanged(JobChangedBody {
                channel_id: channel_id.value(),
                job_id: job_id.value(),
            }),
        )?;
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), vec![Stat::Job])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Adds experience, rolling any overflow into levels. Earned levels are
    /// requested with an `AWARD_LEVEL` command rather than applied here.
    pub async fn award_experience(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        distributions: Vec<ExperienceDistribution>,
    ) -> Result<(), CharacterError> {
        let amount = distributions
            .iter()
            .fold(0u32, |sum, d| sum.saturating_add(d.amount));
        tracing::debug!(character_id = %id, amount, "Attempting to award experience");

        let character = self.get(tenant, id).await?;
        let mut level = character.level();
        let mut current = character.experience().saturating_add(amount);
        let mut awarded: u8 = 0;
        while current > experience_for_level(level) {
            current -= experience_for_level(level);
            level = level.saturating_add(1);
            awarded = awarded.saturating_add(1);
        }

        let updated = self
            .characters
            .update(tenant, id, vec![Modifier::Experience(current)])
            .await?;

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &updated,
            StatusEventBody::ExperienceChanged(ExperienceChangedBody {
                channel_id: channel_id.value(),
                current,
                distributions,
            }),
        )?;
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), vec![Stat::Experience])?;
        if awarded > 0 {
            let mut command = CharacterCommand::new(
                id.value(),
                updated.world_id().value(),
                CommandBody::AwardLevel(AwardLevelBody {
                    channel_id: channel_id.value(),
                    amount: awarded,
                }),
            );
            command.transaction_id = transaction_id;
            buffer.put_json(Topic::CharacterCommand, id, &command)?;
        }
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Raises the level, capped at the job's maximum. Stat gains follow from
    /// the `LEVEL_CHANGED` event.
    pub async fn award_level(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        amount: u8,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let cap = character.max_class_level();
        let actual = amount.min(cap.saturating_sub(character.level()));
        if actual < amount {
            tracing::debug!(character_id = %id, amount, actual, cap, "Level award capped");
        }
        if actual == 0 {
            return Ok(());
        }
        let current = character.level() + actual;

        let updated = self
            .characters
            .update(tenant, id, vec![Modifier::Level(current)])
            .await?;

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &updated,
            StatusEventBody::LevelChanged(LevelChangedBody {
                channel_id: channel_id.value(),
                amount: actual,
                current,
            }),
        )?;
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), vec![Stat::Level])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;

        tracing::info!(character_id = %id, level = current, "Character leveled up");
        Ok(())
    }

    // =========================================================================
    // Meso and fame
    // =========================================================================

    /// Underflow is refused with a `NOT_ENOUGH_MESO` error event and leaves
    /// the balance untouched.
    pub async fn change_meso(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        actor_id: u32,
        actor_type: &str,
        amount: i32,
    ) -> Result<(), CharacterError> {
        let updated = match self.adjust_meso(tenant, id, i64::from(amount)).await? {
            MesoAdjustment::Applied(updated) => updated,
            MesoAdjustment::Insufficient(character) => {
                tracing::debug!(character_id = %id, amount, meso = character.meso(), "Meso change would go negative");
                return self.not_enough_meso(tenant, transaction_id, &character, amount).await;
            }
            MesoAdjustment::Overflow => return Err(CharacterError::MesoOverflow(id)),
        };

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &updated,
            StatusEventBody::MesoChanged(ActorChangedBody {
                actor_id,
                actor_type: actor_type.to_string(),
                amount,
            }),
        )?;
        stage_stats(&mut buffer, transaction_id, &updated, 0, vec![Stat::Meso])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Credits a meso drop, then asks the drop service to remove it.
    pub async fn pick_up_meso(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        field: Field,
        drop_id: u32,
        amount: u32,
    ) -> Result<(), CharacterError> {
        let updated = match self.adjust_meso(tenant, id, i64::from(amount)).await? {
            MesoAdjustment::Applied(updated) => updated,
            MesoAdjustment::Insufficient(_) | MesoAdjustment::Overflow => {
                return Err(CharacterError::MesoOverflow(id))
            }
        };

        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, field.channel_id.value(), vec![Stat::Meso])?;
        let command = DropCommand {
            transaction_id,
            world_id: field.world_id.value(),
            channel_id: field.channel_id.value(),
            map_id: field.map_id.value(),
            body: DropCommandBody::RequestPickUp(RequestPickUpBody {
                drop_id,
                character_id: id.value(),
            }),
        };
        buffer.put_json(Topic::DropCommand, drop_id, &command)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Debits mesos and spawns them as a drop where the character stands.
    pub async fn drop_meso(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        field: Field,
        amount: u32,
    ) -> Result<(), CharacterError> {
        let updated = match self.adjust_meso(tenant, id, -i64::from(amount)).await? {
            MesoAdjustment::Applied(updated) => updated,
            MesoAdjustment::Insufficient(character) => {
                let requested = i32::try_from(amount).unwrap_or(i32::MAX);
                return self.not_enough_meso(tenant, transaction_id, &character, requested).await;
            }
            MesoAdjustment::Overflow => return Err(CharacterError::MesoOverflow(id)),
        };
        let position = self.temporal.get_by_id(tenant, id).await?;

        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, field.channel_id.value(), vec![Stat::Meso])?;
        let command = DropCommand {
            transaction_id,
            world_id: field.world_id.value(),
            channel_id: field.channel_id.value(),
            map_id: field.map_id.value(),
            body: DropCommandBody::SpawnFromCharacter(SpawnFromCharacterBody {
                mesos: amount,
                drop_type: DROP_TYPE_MESO,
                x: position.x,
                y: position.y,
                owner_id: id.value(),
            }),
        };
        buffer.put_json(Topic::DropCommand, id, &command)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    async fn adjust_meso(
        &self,
        tenant: &Tenant,
        id: CharacterId,
        delta: i64,
    ) -> Result<MesoAdjustment, CharacterError> {
        self.characters
            .adjust_meso(tenant, id, delta)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => CharacterError::NotFound(id),
                e => CharacterError::Repo(e),
            })
    }

    async fn not_enough_meso(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        character: &Character,
        amount: i32,
    ) -> Result<(), CharacterError> {
        let body = StatusEventBody::Error(ErrorBody::not_enough_meso(amount));
        self.announce(tenant, transaction_id, character, body).await
    }

    pub async fn change_fame(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        actor_id: u32,
        actor_type: &str,
        amount: i8,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let fame = character.fame().saturating_add(i16::from(amount));
        let updated = self
            .characters
            .update(tenant, id, vec![Modifier::Fame(fame)])
            .await?;

        let mut buffer = MessageBuffer::new();
        stage_status(
            &mut buffer,
            transaction_id,
            &updated,
            StatusEventBody::FameChanged(ActorChangedBody {
                actor_id,
                actor_type: actor_type.to_string(),
                amount: i32::from(amount),
            }),
        )?;
        stage_stats(&mut buffer, transaction_id, &updated, 0, vec![Stat::Fame])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    // =========================================================================
    // HP / MP
    // =========================================================================

    pub async fn change_hp(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        amount: i16,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let adjusted = enforce_bounds(amount, character.hp(), character.max_hp(), 0);
        tracing::debug!(character_id = %id, amount, adjusted, "Adjusting character health");
        self.set_pool(tenant, transaction_id, id, channel_id, Modifier::Hp(adjusted), Stat::Hp)
            .await
    }

    pub async fn change_mp(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        amount: i16,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let adjusted = enforce_bounds(amount, character.mp(), character.max_mp(), 0);
        tracing::debug!(character_id = %id, amount, adjusted, "Adjusting character mana");
        self.set_pool(tenant, transaction_id, id, channel_id, Modifier::Mp(adjusted), Stat::Mp)
            .await
    }

    async fn set_pool(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        modifier: Modifier,
        stat: Stat,
    ) -> Result<(), CharacterError> {
        let updated = self.characters.update(tenant, id, vec![modifier]).await?;
        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), vec![stat])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    // =========================================================================
    // Appearance
    // =========================================================================

    /// Immediate hair, face or skin change requested by another service.
    pub async fn change_style(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        kind: CosmeticKind,
        style_id: u32,
    ) -> Result<(), CharacterError> {
        let character = self.get(tenant, id).await?;
        let (modifier, body, stat) = match kind {
            CosmeticKind::Hair => (
                Modifier::Hair(style_id),
                StatusEventBody::HairChanged(HairChangedBody::new(character.hair(), style_id)),
                Stat::Hair,
            ),
            CosmeticKind::Face => (
                Modifier::Face(style_id),
                StatusEventBody::FaceChanged(FaceChangedBody::new(character.face(), style_id)),
                Stat::Face,
            ),
            CosmeticKind::Skin => {
                let skin = u8::try_from(style_id)
                    .ok()
                    .filter(|s| *s <= MAX_SKIN_COLOR)
                    .ok_or(CharacterError::InvalidSkinColor)?;
                (
                    Modifier::SkinColor(skin),
                    StatusEventBody::SkinColorChanged(SkinColorChangedBody::new(
                        character.skin_color(),
                        skin,
                    )),
                    Stat::Skin,
                )
            }
        };

        let updated = self.characters.update(tenant, id, vec![modifier]).await?;
        let mut buffer = MessageBuffer::new();
        stage_status(&mut buffer, transaction_id, &updated, body)?;
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), vec![stat])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use atlas_domain::AccountId;

    use super::*;
    use crate::infrastructure::memory::{MemoryCharacterRepo, MemoryKeyValueStore};
    use crate::infrastructure::ports::MockMapPort;
    use crate::use_cases::character::fixtures::{commands, drops, recording_producer, statuses, tenant, Sent};

    struct Harness {
        tenant: Tenant,
        processor: CharacterProcessor,
        repo: Arc<MemoryCharacterRepo>,
        temporal: Arc<TemporalRegistry>,
        sent: Sent,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MemoryCharacterRepo::new());
        let mut maps = MockMapPort::new();
        maps.expect_can_enter()
            .returning(|_, map, _| Ok(map.value() >= 100_000_000 && map.value() < 500_000_000));
        let temporal = Arc::new(TemporalRegistry::new(Arc::new(MemoryKeyValueStore::new())));
        let (producer, sent) = recording_producer();
        let processor = CharacterProcessor::new(repo.clone(), Arc::new(maps), temporal.clone(), Arc::new(producer));
        Harness {
            tenant: tenant(),
            processor,
            repo,
            temporal,
            sent,
        }
    }

    fn character(name: &str, account: u32) -> Character {
        Character::new(AccountId::from_raw(account), WorldId::from_raw(0), name)
            .with_level(10)
            .with_hp_mp(50, 100, 20, 40)
            .with_appearance(0, 0, 30_000, 20_000)
            .with_map(MapId::from_raw(100_000_000), 0)
    }

    async fn seed(h: &Harness, character: Character) -> Character {
        h.repo.create(&h.tenant, character).await.expect("seed")
    }

    fn channel() -> ChannelId {
        ChannelId::from_raw(1)
    }

    #[test]
    fn name_format() {
        assert!(is_valid_name_format("Hero"));
        assert!(is_valid_name_format("ゆうしゃ"));
        assert!(!is_valid_name_format("ab"));
        assert!(!is_valid_name_format("ThirteenChars"));
        assert!(!is_valid_name_format("bad name"));
        assert!(!is_valid_name_format("ab!cde"));
    }

    #[test]
    fn rest_zero_values_are_unset() {
        let patch = CharacterPatch::from(&CharacterRestModel {
            hair: 30_030,
            ..CharacterRestModel::default()
        });
        assert_eq!(patch.hair, Some(30_030));
        assert_eq!(patch.name, None);
        assert_eq!(patch.gm, None);
        assert!(CharacterPatch::from(&CharacterRestModel::default()).is_empty());
    }

    #[tokio::test]
    async fn create_validates_and_announces() {
        let h = harness();
        let txn = Uuid::new_v4();

        let err = h
            .processor
            .create(&h.tenant, txn, character("x!", 1000))
            .await
            .expect_err("bad name");
        assert_eq!(err.to_string(), "blocked name");

        let err = h
            .processor
            .create(&h.tenant, txn, character("Leveled", 1000).with_level(0))
            .await
            .expect_err("bad level");
        assert_eq!(err.to_string(), "invalid level");

        let created = h
            .processor
            .create(&h.tenant, txn, character("Hero", 1000))
            .await
            .expect("create");
        let err = h
            .processor
            .create(&h.tenant, txn, character("hero", 1001))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, CharacterError::BlockedName));

        let events = statuses(&h.sent);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction_id, txn);
        assert_eq!(events[0].character_id, created.id().value());
        assert_eq!(
            events[0].body,
            StatusEventBody::Created(CreatedBody { name: "Hero".into() })
        );
    }

    #[tokio::test]
    async fn creation_failure_is_announced_without_id() {
        let h = harness();
        h.processor
            .creation_failed(
                &h.tenant,
                Uuid::new_v4(),
                WorldId::from_raw(1),
                "x!",
                &CharacterError::BlockedName,
            )
            .await
            .expect("announce");
        let events = statuses(&h.sent);
        assert_eq!(events[0].character_id, 0);
        assert_eq!(
            events[0].body,
            StatusEventBody::CreationFailed(CreationFailedBody {
                name: "x!".into(),
                message: "blocked name".into(),
            })
        );
    }

    #[tokio::test]
    async fn duplicate_name_patch_is_rejected() {
        let h = harness();
        seed(&h, character("ExistingName", 1000)).await;
        let second = seed(&h, character("SecondName", 1001)).await;

        let patch = CharacterPatch {
            name: Some("ExistingName".into()),
            ..CharacterPatch::default()
        };
        let err = h
            .processor
            .update(&h.tenant, Uuid::new_v4(), second.id(), patch)
            .await
            .expect_err("duplicate");
        assert_eq!(err.to_string(), "invalid or duplicate name");
        assert!(err.is_validation());

        let stored = h.processor.get(&h.tenant, second.id()).await.expect("get");
        assert_eq!(stored.name(), "SecondName");
        assert!(statuses(&h.sent).is_empty());
    }

    #[tokio::test]
    async fn patch_emits_one_event_per_changed_field() {
        let h = harness();
        let seeded = seed(&h, character("Patchy", 1000)).await;

        let patch = CharacterPatch {
            hair: Some(30_030),
            gm: Some(1),
            face: Some(20_000),
            ..CharacterPatch::default()
        };
        let updated = h
            .processor
            .update(&h.tenant, Uuid::new_v4(), seeded.id(), patch)
            .await
            .expect("update");
        assert_eq!(updated.hair(), 30_030);
        assert!(updated.is_gm());
        assert_eq!(updated.name(), "Patchy");
        assert_eq!(updated.meso(), seeded.meso());

        let bodies: Vec<StatusEventBody> = statuses(&h.sent).into_iter().map(|e| e.body).collect();
        assert_eq!(
            bodies,
            vec![
                StatusEventBody::HairChanged(HairChangedBody::new(30_000, 30_030)),
                StatusEventBody::GmChanged(GmChangedBody::new(false, true)),
            ]
        );
    }

    #[tokio::test]
    async fn patch_rejects_out_of_range_values() {
        let h = harness();
        let seeded = seed(&h, character("Ranges", 1000)).await;
        let cases = [
            (CharacterPatch { hair: Some(40_000), ..Default::default() }, "invalid hair ID"),
            (CharacterPatch { face: Some(1), ..Default::default() }, "invalid face ID"),
            (CharacterPatch { gender: Some(2), ..Default::default() }, "invalid gender value"),
            (CharacterPatch { skin_color: Some(10), ..Default::default() }, "invalid skin color value"),
            (CharacterPatch { gm: Some(-1), ..Default::default() }, "invalid GM value"),
            (
                CharacterPatch { map_id: Some(MapId::from_raw(999)), ..Default::default() },
                "invalid map ID or character cannot access this map",
            ),
        ];
        for (patch, expected) in cases {
            let err = h
                .processor
                .update(&h.tenant, Uuid::new_v4(), seeded.id(), patch)
                .await
                .expect_err(expected);
            assert_eq!(err.to_string(), expected);
        }
        assert!(statuses(&h.sent).is_empty());
    }

    #[tokio::test]
    async fn patch_map_reports_old_and_new_on_channel_zero() {
        let h = harness();
        let seeded = seed(&h, character("Walker", 1000)).await;
        let patch = CharacterPatch {
            map_id: Some(MapId::from_raw(110_000_000)),
            ..CharacterPatch::default()
        };
        h.processor
            .update(&h.tenant, Uuid::new_v4(), seeded.id(), patch)
            .await
            .expect("update");
        let events = statuses(&h.sent);
        assert_eq!(
            events[0].body,
            StatusEventBody::MapChanged(MapChangedBody {
                channel_id: 0,
                old_map_id: 100_000_000,
                target_map_id: 110_000_000,
                target_portal_id: 0,
            })
        );
    }

    #[tokio::test]
    async fn not_enough_meso_leaves_balance() {
        let h = harness();
        let seeded = seed(&h, character("Broke", 1000).with_meso(100)).await;

        h.processor
            .change_meso(&h.tenant, Uuid::new_v4(), seeded.id(), 9_010_000, "NPC", -200)
            .await
            .expect("handled");

        let events = statuses(&h.sent);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body, StatusEventBody::Error(ErrorBody::not_enough_meso(-200)));
        let stored = h.processor.get(&h.tenant, seeded.id()).await.expect("get");
        assert_eq!(stored.meso(), 100);
    }

    #[tokio::test]
    async fn meso_change_announces_actor_and_stat() {
        let h = harness();
        let seeded = seed(&h, character("Rich", 1000).with_meso(100)).await;

        h.processor
            .change_meso(&h.tenant, Uuid::new_v4(), seeded.id(), 9_010_000, "NPC", 250)
            .await
            .expect("change");

        let events = statuses(&h.sent);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].body,
            StatusEventBody::MesoChanged(ActorChangedBody {
                actor_id: 9_010_000,
                actor_type: "NPC".into(),
                amount: 250,
            })
        );
        assert_eq!(events[1].event_type(), "STAT_CHANGED");
        assert_eq!(h.processor.get(&h.tenant, seeded.id()).await.expect("get").meso(), 350);
    }

    #[tokio::test]
    async fn concurrent_meso_changes_both_apply() {
        let h = harness();
        let seeded = seed(&h, character("Banker", 1000).with_meso(100)).await;

        let (credit, debit) = tokio::join!(
            h.processor
                .change_meso(&h.tenant, Uuid::new_v4(), seeded.id(), 9_010_000, "NPC", 300),
            h.processor
                .change_meso(&h.tenant, Uuid::new_v4(), seeded.id(), 9_010_000, "NPC", -50),
        );
        credit.expect("credit");
        debit.expect("debit");

        assert_eq!(h.processor.get(&h.tenant, seeded.id()).await.expect("get").meso(), 350);
        assert_eq!(statuses(&h.sent).len(), 4);
    }

    #[tokio::test]
    async fn meso_change_for_unknown_character_is_not_found() {
        let h = harness();
        let err = h
            .processor
            .change_meso(&h.tenant, Uuid::new_v4(), CharacterId::from_raw(404), 0, "", 10)
            .await
            .expect_err("missing");
        assert!(matches!(err, CharacterError::NotFound(_)));
    }

    #[tokio::test]
    async fn meso_overflow_is_rejected() {
        let h = harness();
        let seeded = seed(&h, character("Overflow", 1000).with_meso(u32::MAX - 10)).await;
        let err = h
            .processor
            .change_meso(&h.tenant, Uuid::new_v4(), seeded.id(), 0, "", 11)
            .await
            .expect_err("overflow");
        assert!(matches!(err, CharacterError::MesoOverflow(_)));

        let field = Field::new(WorldId::from_raw(0), channel(), MapId::from_raw(100_000_000));
        let err = h
            .processor
            .pick_up_meso(&h.tenant, Uuid::new_v4(), seeded.id(), field, 77, 11)
            .await
            .expect_err("overflow");
        assert!(matches!(err, CharacterError::MesoOverflow(_)));
        assert!(h.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn drop_meso_spawns_at_current_position() {
        let h = harness();
        let seeded = seed(&h, character("Dropper", 1000).with_meso(500)).await;
        h.temporal.update(&h.tenant, seeded.id(), 120, -35, 4).await;
        let field = Field::new(WorldId::from_raw(0), channel(), MapId::from_raw(100_000_000));

        h.processor
            .drop_meso(&h.tenant, Uuid::new_v4(), seeded.id(), field, 200)
            .await
            .expect("drop");

        assert_eq!(h.processor.get(&h.tenant, seeded.id()).await.expect("get").meso(), 300);
        let sent = drops(&h.sent);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            DropCommandBody::SpawnFromCharacter(SpawnFromCharacterBody {
                mesos: 200,
                drop_type: DROP_TYPE_MESO,
                x: 120,
                y: -35,
                owner_id: seeded.id().value(),
            })
        );

        h.processor
            .drop_meso(&h.tenant, Uuid::new_v4(), seeded.id(), field, 301)
            .await
            .expect("refused");
        let last = statuses(&h.sent).pop().expect("event");
        assert_eq!(last.body, StatusEventBody::Error(ErrorBody::not_enough_meso(301)));
        assert_eq!(drops(&h.sent).len(), 1);
    }

    #[tokio::test]
    async fn experience_overflow_requests_levels() {
        let h = harness();
        // Level 1 needs 15 and level 2 needs 34.
        let seeded = seed(&h, character("Learner", 1000).with_level(1).with_experience(10)).await;
        let distributions = vec![ExperienceDistribution {
            experience_type: "WHITE".into(),
            amount: 45,
            attr1: 0,
        }];

        h.processor
            .award_experience(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), distributions.clone())
            .await
            .expect("award");

        let stored = h.processor.get(&h.tenant, seeded.id()).await.expect("get");
        assert_eq!(stored.experience(), 6);
        let events = statuses(&h.sent);
        assert_eq!(
            events[0].body,
            StatusEventBody::ExperienceChanged(ExperienceChangedBody {
                channel_id: 1,
                current: 6,
                distributions,
            })
        );
        let sent = commands(&h.sent);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            CommandBody::AwardLevel(AwardLevelBody {
                channel_id: 1,
                amount: 2
            })
        );
    }

    #[tokio::test]
    async fn award_level_announces_and_caps() {
        let h = harness();
        let seeded = seed(&h, character("Climber", 1000).with_level(24)).await;
        h.processor
            .award_level(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 1)
            .await
            .expect("award");
        let events: Vec<StatusEvent> = statuses(&h.sent);
        assert_eq!(
            events[0].body,
            StatusEventBody::LevelChanged(LevelChangedBody {
                channel_id: 1,
                amount: 1,
                current: 25,
            })
        );
        assert_eq!(
            events[1].body,
            StatusEventBody::StatChanged(atlas_shared::character::StatChangedBody::new(1, vec![Stat::Level]))
        );

        let knight = seed(
            &h,
            character("Knight", 1000).with_job(JobId::DAWN_WARRIOR_4).with_level(118),
        )
        .await;
        h.processor
            .award_level(&h.tenant, Uuid::new_v4(), knight.id(), channel(), 5)
            .await
            .expect("award");
        assert_eq!(h.processor.get(&h.tenant, knight.id()).await.expect("get").level(), 120);
        match &statuses(&h.sent)[2].body {
            StatusEventBody::LevelChanged(body) => assert_eq!(body.amount, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn hp_change_is_clamped() {
        let h = harness();
        let seeded = seed(&h, character("Tank", 1000)).await;
        h.processor
            .change_hp(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 500)
            .await
            .expect("heal");
        assert_eq!(h.processor.get(&h.tenant, seeded.id()).await.expect("get").hp(), 100);
        h.processor
            .change_mp(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), -500)
            .await
            .expect("drain");
        assert_eq!(h.processor.get(&h.tenant, seeded.id()).await.expect("get").mp(), 0);
    }

    #[tokio::test]
    async fn change_map_and_job_update_rows() {
        let h = harness();
        let seeded = seed(&h, character("Mover", 1000)).await;
        let field = Field::new(WorldId::from_raw(0), channel(), MapId::from_raw(101_000_000));
        h.processor
            .change_map(&h.tenant, Uuid::new_v4(), seeded.id(), field, 3)
            .await
            .expect("map");
        h.processor
            .change_job(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), JobId::WARRIOR)
            .await
            .expect("job");

        let stored = h.processor.get(&h.tenant, seeded.id()).await.expect("get");
        assert_eq!(stored.map_id(), MapId::from_raw(101_000_000));
        assert_eq!(stored.job_id(), JobId::WARRIOR);

        let types: Vec<&str> = statuses(&h.sent).iter().map(StatusEvent::event_type).collect();
        assert_eq!(types, vec!["MAP_CHANGED", "JOB_CHANGED", "STAT_CHANGED"]);
    }

    #[tokio::test]
    async fn delete_removes_row_and_position() {
        let h = harness();
        let seeded = seed(&h, character("Gone", 1000)).await;
        h.temporal.update(&h.tenant, seeded.id(), 5, 5, 1).await;

        h.processor
            .delete(&h.tenant, Uuid::new_v4(), seeded.id())
            .await
            .expect("delete");

        let err = h.processor.get(&h.tenant, seeded.id()).await.expect_err("gone");
        assert!(matches!(err, CharacterError::NotFound(_)));
        let position = h.temporal.get_by_id(&h.tenant, seeded.id()).await.expect("position");
        assert_eq!(position, Default::default());
        assert_eq!(statuses(&h.sent)[0].event_type(), "DELETED");
    }

    #[tokio::test]
    async fn login_uses_stored_map() {
        let h = harness();
        let seeded = seed(&h, character("Session", 1000)).await;
        let channel = Channel::new(WorldId::from_raw(0), ChannelId::from_raw(2));
        h.processor
            .login(&h.tenant, Uuid::new_v4(), seeded.id(), channel)
            .await
            .expect("login");
        assert_eq!(
            statuses(&h.sent)[0].body,
            StatusEventBody::Login(FieldEventBody {
                channel_id: 2,
                map_id: 100_000_000
            })
        );
    }
}
