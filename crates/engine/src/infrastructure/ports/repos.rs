//! Repository port traits for tenant-scoped storage.
//!
//! Every method takes the tenant first; implementations must never let one
//! tenant observe another tenant's rows.

use async_trait::async_trait;
use atlas_domain::{
    AccountId, Character, CharacterId, Conversation, MapId, Modifier, NpcId, Quest, Tenant,
    WorldId,
};

use super::error::RepoError;

// =============================================================================
// Characters
// =============================================================================

/// The listing filters the character endpoints support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterQuery {
    All,
    ByAccountInWorld {
        account_id: AccountId,
        world_id: WorldId,
    },
    InMap {
        world_id: WorldId,
        map_id: MapId,
    },
    /// Case-insensitive exact match.
    ByName(String),
}

/// Outcome of [`CharacterRepo::adjust_meso`].
#[derive(Debug, Clone, PartialEq)]
pub enum MesoAdjustment {
    Applied(Character),
    /// The balance cannot cover the debit. The row is unchanged.
    Insufficient(Character),
    /// The credit would pass `u32::MAX`. The row is unchanged.
    Overflow,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRepo: Send + Sync {
    async fn get(&self, tenant: &Tenant, id: CharacterId) -> Result<Option<Character>, RepoError>;
    async fn query(
        &self,
        tenant: &Tenant,
        query: CharacterQuery,
    ) -> Result<Vec<Character>, RepoError>;

    /// Persists a new character and returns it with its assigned id.
    async fn create(&self, tenant: &Tenant, character: Character) -> Result<Character, RepoError>;

    /// Applies a change set to the stored row. Only the columns the modifiers
    /// touch are written. An empty change set is a no-op.
    async fn update(
        &self,
        tenant: &Tenant,
        id: CharacterId,
        modifiers: Vec<Modifier>,
    ) -> Result<Character, RepoError>;

    /// Adds `delta` to the stored balance. The balance is read and written
    /// under one lock, so concurrent adjustments never lose an update.
    async fn adjust_meso(
        &self,
        tenant: &Tenant,
        id: CharacterId,
        delta: i64,
    ) -> Result<MesoAdjustment, RepoError>;

    async fn delete(&self, tenant: &Tenant, id: CharacterId) -> Result<(), RepoError>;
}

// =============================================================================
// Conversation definitions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn get_for_npc(
        &self,
        tenant: &Tenant,
        npc_id: NpcId,
    ) -> Result<Option<Conversation>, RepoError>;
    async fn save(&self, tenant: &Tenant, conversation: Conversation) -> Result<(), RepoError>;
}

// =============================================================================
// Quest data
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestRepo: Send + Sync {
    async fn list(&self, tenant: &Tenant) -> Result<Vec<Quest>, RepoError>;
    async fn get(&self, tenant: &Tenant, quest_id: u32) -> Result<Option<Quest>, RepoError>;
    async fn save(&self, tenant: &Tenant, quest: Quest) -> Result<(), RepoError>;
}

// =============================================================================
// Shared key-value store
// =============================================================================

/// Backing store for write-behind caches. Values are JSON strings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepoError>;
    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<(), RepoError>;
    async fn remove(&self, key: &str) -> Result<(), RepoError>;
}
