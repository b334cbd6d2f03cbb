//! Peer service adapters.
//!
//! [`HttpPeerClient`] talks JSON:API to the peer gateway. [`LocalPeers`]
//! answers from this process's own character store and is used when no
//! gateway is configured. Both request appearance changes by sending a
//! character command rather than calling the peer directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atlas_domain::conversation::cosmetic::{Appearance, CosmeticKind};
use atlas_domain::validation::{
    CONDITION_FAME, CONDITION_ITEM, CONDITION_JOB, CONDITION_MAP, CONDITION_MESO,
};
use atlas_domain::{
    Character, CharacterId, ConditionInput, Field, MapId, SkillEffect, Tenant, ValidationVerdict,
};
use atlas_shared::character::ChangeStyleBody;
use atlas_shared::{
    headers, CharacterCommand, CharacterRestModel, CommandBody, Document, ListDocument, Resource,
    Topic,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{
    AppearancePort, CharacterRepo, InventoryPort, MapPort, Message, PeerError, PetPort,
    ProducerPort, SkillDataPort, ValidationPort,
};

const PEER_TIMEOUT_SECS: u64 = 10;

/// Lowest and highest map ids the game data can contain.
const MIN_MAP_ID: u32 = 100_000_000;
const MAX_MAP_ID: u32 = 999_999_999;
/// Maps in this band need a minimum level.
const RESTRICTED_MAPS: std::ops::RangeInclusive<u32> = 500_000_000..=599_999_999;
const RESTRICTED_MAP_MIN_LEVEL: u8 = 30;

fn appearance_of(character: &Character) -> Appearance {
    Appearance {
        gender: character.gender(),
        hair: character.hair(),
        face: character.face(),
        skin_color: character.skin_color(),
    }
}

fn appearance_command(character_id: CharacterId, field: Field, kind: CosmeticKind, style_id: u32) -> CharacterCommand {
    let body = ChangeStyleBody {
        channel_id: field.channel_id.value(),
        style_id,
    };
    let body = match kind {
        CosmeticKind::Hair => CommandBody::ChangeHair(body),
        CosmeticKind::Face => CommandBody::ChangeFace(body),
        CosmeticKind::Skin => CommandBody::ChangeSkin(body),
    };
    CharacterCommand::new(character_id.value(), field.world_id.value(), body)
}

async fn send_appearance_command(
    producer: &dyn ProducerPort,
    tenant: &Tenant,
    character_id: CharacterId,
    field: Field,
    kind: CosmeticKind,
    style_id: u32,
) -> Result<(), PeerError> {
    let command = appearance_command(character_id, field, kind, style_id);
    let message = Message::json(character_id, &command)
        .map_err(|e| PeerError::RequestFailed(e.to_string()))?;
    producer
        .send(tenant, Topic::CharacterCommand, vec![message])
        .await
        .map_err(|e| PeerError::RequestFailed(e.to_string()))
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationRequest {
    character_id: u32,
    conditions: Vec<ConditionInput>,
}

#[derive(Debug, Deserialize)]
struct PetAttributes {
    #[serde(default = "unspawned")]
    slot: i8,
}

fn unspawned() -> i8 {
    -1
}

/// Effects are listed per skill level, starting at level one.
#[derive(Debug, Deserialize)]
struct SkillAttributes {
    #[serde(default)]
    effects: Vec<SkillEffect>,
}

#[derive(Clone)]
pub struct HttpPeerClient {
    client: Client,
    base_url: String,
    producer: Arc<dyn ProducerPort>,
}

impl HttpPeerClient {
    pub fn new(base_url: &str, producer: Arc<dyn ProducerPort>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PEER_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            producer,
        }
    }

    fn request(&self, method: Method, tenant: &Tenant, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(headers::TENANT_ID, tenant.id().to_string())
            .header(headers::REGION, tenant.region())
            .header(headers::MAJOR_VERSION, tenant.major_version().to_string())
            .header(headers::MINOR_VERSION, tenant.minor_version().to_string())
    }

    /// Sends and decodes. `Ok(None)` on 404.
    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, PeerError> {
        let response = request
            .send()
            .await
            .map_err(|e| PeerError::RequestFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(PeerError::Unavailable);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PeerError::RequestFailed(format!("{status}: {error_text}")));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| PeerError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ValidationPort for HttpPeerClient {
    async fn validate(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        conditions: Vec<ConditionInput>,
    ) -> Result<ValidationVerdict, PeerError> {
        let body = Document::new(Resource::new(
            "validations",
            character_id,
            ValidationRequest {
                character_id: character_id.value(),
                conditions,
            },
        ));
        let request = self
            .request(Method::POST, tenant, "/validations")
            .json(&body);
        let document: Document<ValidationVerdict> = self
            .fetch(request)
            .await?
            .ok_or_else(|| PeerError::NotFound("validation service".into()))?;
        Ok(document.data.attributes)
    }
}

#[async_trait]
impl AppearancePort for HttpPeerClient {
    async fn appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
    ) -> Result<Appearance, PeerError> {
        let request = self.request(Method::GET, tenant, &format!("/characters/{character_id}"));
        let document: Document<CharacterRestModel> = self
            .fetch(request)
            .await?
            .ok_or_else(|| PeerError::NotFound(format!("character {character_id}")))?;
        let attributes = document.data.attributes;
        Ok(Appearance {
            gender: attributes.gender,
            hair: attributes.hair,
            face: attributes.face,
            skin_color: attributes.skin_color,
        })
    }

    async fn change_appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        field: Field,
        kind: CosmeticKind,
        style_id: u32,
    ) -> Result<(), PeerError> {
        send_appearance_command(self.producer.as_ref(), tenant, character_id, field, kind, style_id).await
    }
}

#[async_trait]
impl InventoryPort for HttpPeerClient {
    async fn has_item(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        item_id: u32,
    ) -> Result<bool, PeerError> {
        let request = self.request(
            Method::GET,
            tenant,
            &format!("/characters/{character_id}/inventory/items?itemId={item_id}"),
        );
        let items: Option<ListDocument<serde_json::Value>> = self.fetch(request).await?;
        Ok(items.is_some_and(|doc| !doc.data.is_empty()))
    }
}

#[async_trait]
impl PetPort for HttpPeerClient {
    async fn pet_id_by_slot(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        slot: i8,
    ) -> Result<u32, PeerError> {
        let request = self.request(Method::GET, tenant, &format!("/characters/{character_id}/pets"));
        let pets: ListDocument<PetAttributes> = self
            .fetch(request)
            .await?
            .ok_or_else(|| PeerError::NotFound(format!("pets of character {character_id}")))?;
        pets.data
            .iter()
            .find(|pet| pet.attributes.slot == slot)
            .and_then(Resource::numeric_id)
            .ok_or_else(|| PeerError::NotFound(format!("pet in slot {slot}")))
    }
}

#[async_trait]
impl MapPort for HttpPeerClient {
    async fn player_count(&self, tenant: &Tenant, field: Field) -> Result<u32, PeerError> {
        let path = format!(
            "/worlds/{}/channels/{}/maps/{}/characters",
            field.world_id, field.channel_id, field.map_id
        );
        let characters: Option<ListDocument<serde_json::Value>> =
            self.fetch(self.request(Method::GET, tenant, &path)).await?;
        Ok(characters.map_or(0, |doc| doc.data.len() as u32))
    }

    async fn can_enter(&self, tenant: &Tenant, map_id: MapId, _level: u8) -> Result<bool, PeerError> {
        let request = self.request(Method::GET, tenant, &format!("/data/maps/{map_id}"));
        let map: Option<Document<serde_json::Value>> = self.fetch(request).await?;
        Ok(map.is_some())
    }
}

#[async_trait]
impl SkillDataPort for HttpPeerClient {
    async fn effect(&self, tenant: &Tenant, skill_id: u32, level: u8) -> Result<SkillEffect, PeerError> {
        let request = self.request(Method::GET, tenant, &format!("/data/skills/{skill_id}"));
        let skill: Document<SkillAttributes> = self
            .fetch(request)
            .await?
            .ok_or_else(|| PeerError::NotFound(format!("skill {skill_id}")))?;
        usize::from(level)
            .checked_sub(1)
            .and_then(|index| skill.data.attributes.effects.get(index).copied())
            .ok_or_else(|| PeerError::NotFound(format!("skill {skill_id} level {level}")))
    }
}

// =============================================================================
// In-process
// =============================================================================

pub struct LocalPeers {
    characters: Arc<dyn CharacterRepo>,
    producer: Arc<dyn ProducerPort>,
}

impl LocalPeers {
    pub fn new(characters: Arc<dyn CharacterRepo>, producer: Arc<dyn ProducerPort>) -> Self {
        Self {
            characters,
            producer,
        }
    }

    async fn character(&self, tenant: &Tenant, id: CharacterId) -> Result<Character, PeerError> {
        self.characters
            .get(tenant, id)
            .await
            .map_err(|e| PeerError::RequestFailed(e.to_string()))?
            .ok_or_else(|| PeerError::NotFound(format!("character {id}")))
    }
}

fn compare(actual: i64, operator: &str, expected: i64) -> Option<bool> {
    Some(match operator {
        "=" | "==" => actual == expected,
        "!=" => actual != expected,
        ">" => actual > expected,
        ">=" => actual >= expected,
        "<" => actual < expected,
        "<=" => actual <= expected,
        _ => return None,
    })
}

/// Checks one condition against the stored character. Item conditions pass
/// only when nothing is required, since this process holds no inventory.
fn check(character: &Character, condition: &ConditionInput) -> Result<(), String> {
    let actual: i64 = match condition.condition_type.as_str() {
        CONDITION_JOB => character.job_id().value().into(),
        CONDITION_MESO => character.meso().into(),
        CONDITION_MAP => character.map_id().value().into(),
        CONDITION_FAME => character.fame().into(),
        CONDITION_ITEM => 0,
        other => return Err(format!("unsupported condition type: {other}")),
    };
    match compare(actual, &condition.operator, condition.value.into()) {
        Some(true) => Ok(()),
        Some(false) => Err(format!(
            "{} {} {} failed (actual {actual})",
            condition.condition_type, condition.operator, condition.value
        )),
        None => Err(format!("unsupported operator: {}", condition.operator)),
    }
}

#[async_trait]
impl ValidationPort for LocalPeers {
    async fn validate(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        conditions: Vec<ConditionInput>,
    ) -> Result<ValidationVerdict, PeerError> {
        let character = self.character(tenant, character_id).await?;
        let details: Vec<String> = conditions
            .iter()
            .filter_map(|c| check(&character, c).err())
            .collect();
        Ok(ValidationVerdict {
            passed: details.is_empty(),
            details,
        })
    }
}

#[async_trait]
impl AppearancePort for LocalPeers {
    async fn appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
    ) -> Result<Appearance, PeerError> {
        Ok(appearance_of(&self.character(tenant, character_id).await?))
    }

    async fn change_appearance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        field: Field,
        kind: CosmeticKind,
        style_id: u32,
    ) -> Result<(), PeerError> {
        send_appearance_command(self.producer.as_ref(), tenant, character_id, field, kind, style_id).await
    }
}

#[async_trait]
impl InventoryPort for LocalPeers {
    async fn has_item(&self, _: &Tenant, _: CharacterId, _: u32) -> Result<bool, PeerError> {
        Ok(false)
    }
}

#[async_trait]
impl PetPort for LocalPeers {
    async fn pet_id_by_slot(&self, _: &Tenant, _: CharacterId, slot: i8) -> Result<u32, PeerError> {
        Err(PeerError::NotFound(format!("pet in slot {slot}")))
    }
}

/// No game data is loaded in-process; growth falls back to zero bonuses.
#[async_trait]
impl SkillDataPort for LocalPeers {
    async fn effect(&self, _: &Tenant, skill_id: u32, level: u8) -> Result<SkillEffect, PeerError> {
        Err(PeerError::NotFound(format!("skill {skill_id} level {level}")))
    }
}

#[async_trait]
impl MapPort for LocalPeers {
    async fn player_count(&self, _: &Tenant, _: Field) -> Result<u32, PeerError> {
        Ok(0)
    }

    async fn can_enter(&self, _: &Tenant, map_id: MapId, level: u8) -> Result<bool, PeerError> {
        let id = map_id.value();
        if !(MIN_MAP_ID..=MAX_MAP_ID).contains(&id) {
            return Ok(false);
        }
        Ok(!RESTRICTED_MAPS.contains(&id) || level >= RESTRICTED_MAP_MIN_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use atlas_domain::{AccountId, ChannelId, TenantId, WorldId};

    use super::*;
    use crate::infrastructure::memory::MemoryCharacterRepo;
    use crate::infrastructure::ports::MockProducerPort;

    fn tenant() -> Tenant {
        Tenant::new(TenantId::new(), "GMS", 83, 1)
    }

    async fn peers_with(character: Character, producer: MockProducerPort) -> (LocalPeers, CharacterId) {
        let repo = Arc::new(MemoryCharacterRepo::new());
        let t = tenant();
        let created = repo.create(&t, character).await.expect("create");
        (LocalPeers::new(repo, Arc::new(producer)), created.id())
    }

    #[tokio::test]
    async fn local_validation_reports_each_failure() {
        let t = tenant();
        let repo = Arc::new(MemoryCharacterRepo::new());
        let created = repo
            .create(
                &t,
                Character::new(AccountId::from_raw(1), WorldId::from_raw(0), "Tester").with_meso(500),
            )
            .await
            .expect("create");
        let peers = LocalPeers::new(repo, Arc::new(MockProducerPort::new()));

        let verdict = peers
            .validate(
                &t,
                created.id(),
                vec![
                    ConditionInput::new(CONDITION_MESO, ">=", 300),
                    ConditionInput::new(CONDITION_FAME, ">", 0),
                ],
            )
            .await
            .expect("validate");
        assert!(!verdict.passed);
        assert_eq!(verdict.details.len(), 1);

        let verdict = peers
            .validate(&t, created.id(), vec![ConditionInput::new(CONDITION_MESO, "<=", 500)])
            .await
            .expect("validate");
        assert!(verdict.passed);
    }

    #[tokio::test]
    async fn local_appearance_change_emits_a_command() {
        let mut producer = MockProducerPort::new();
        producer
            .expect_send()
            .withf(|_, topic, messages| {
                let command: CharacterCommand =
                    serde_json::from_slice(&messages[0].value).expect("decode");
                *topic == Topic::CharacterCommand
                    && matches!(command.body, CommandBody::ChangeHair(ChangeStyleBody { style_id: 30030, channel_id: 2 }))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let (peers, id) = peers_with(
            Character::new(AccountId::from_raw(1), WorldId::from_raw(0), "Tester")
                .with_appearance(0, 0, 30000, 20000),
            producer,
        )
        .await;

        let field = Field::new(WorldId::from_raw(0), ChannelId::from_raw(2), MapId::from_raw(100_000_000));
        peers
            .change_appearance(&tenant(), id, field, CosmeticKind::Hair, 30030)
            .await
            .expect("change");
    }

    #[tokio::test]
    async fn map_access_follows_id_bands() {
        let peers = LocalPeers::new(Arc::new(MemoryCharacterRepo::new()), Arc::new(MockProducerPort::new()));
        let t = tenant();
        let can = |id: u32, level: u8| peers.can_enter(&t, MapId::from_raw(id), level);
        assert!(can(100_000_000, 1).await.expect("check"));
        assert!(!can(99_999_999, 1).await.expect("check"));
        assert!(!can(1_000_000_000, 1).await.expect("check"));
        assert!(!can(500_000_000, 1).await.expect("check"));
        assert!(can(500_000_000, 30).await.expect("check"));
    }
}
