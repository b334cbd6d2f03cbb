use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use atlas_domain::{Character, CharacterId, Modifier, Tenant};

use crate::infrastructure::ports::{CharacterQuery, CharacterRepo, MesoAdjustment, RepoError};
use crate::infrastructure::tenant_registry::TenantRegistry;

/// Character rows keyed by `(tenant, id)`. Ids are assigned on create.
pub struct MemoryCharacterRepo {
    rows: TenantRegistry<CharacterId, Character>,
    next_id: AtomicU32,
}

impl Default for MemoryCharacterRepo {
    fn default() -> Self {
        Self {
            rows: TenantRegistry::new(),
            next_id: AtomicU32::new(1),
        }
    }
}

impl MemoryCharacterRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(character: &Character, query: &CharacterQuery) -> bool {
    match query {
        CharacterQuery::All => true,
        CharacterQuery::ByAccountInWorld {
            account_id,
            world_id,
        } => character.account_id() == *account_id && character.world_id() == *world_id,
        CharacterQuery::InMap { world_id, map_id } => {
            character.world_id() == *world_id && character.map_id() == *map_id
        }
        CharacterQuery::ByName(name) => character.name().eq_ignore_ascii_case(name),
    }
}

#[async_trait]
impl CharacterRepo for MemoryCharacterRepo {
    async fn get(&self, tenant: &Tenant, id: CharacterId) -> Result<Option<Character>, RepoError> {
        Ok(self.rows.get(tenant, &id).await)
    }

    async fn query(
        &self,
        tenant: &Tenant,
        query: CharacterQuery,
    ) -> Result<Vec<Character>, RepoError> {
        let mut found: Vec<Character> = self
            .rows
            .values(tenant)
            .await
            .into_iter()
            .filter(|c| matches(c, &query))
            .collect();
        found.sort_by_key(|c| c.id());
        Ok(found)
    }

    async fn create(&self, tenant: &Tenant, character: Character) -> Result<Character, RepoError> {
        let id = CharacterId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = character.with_id(id);
        self.rows
            .mutate(tenant, |rows| {
                let taken = rows
                    .values()
                    .any(|c| c.name().eq_ignore_ascii_case(created.name()));
                if taken {
                    return Err(RepoError::constraint(format!(
                        "name {} already exists",
                        created.name()
                    )));
                }
                rows.insert(id, created.clone());
                Ok(created)
            })
            .await
    }

    async fn update(
        &self,
        tenant: &Tenant,
        id: CharacterId,
        modifiers: Vec<Modifier>,
    ) -> Result<Character, RepoError> {
        self.rows
            .mutate(tenant, |rows| {
                let current = rows
                    .get(&id)
                    .ok_or_else(|| RepoError::not_found("Character", id))?;
                if modifiers.is_empty() {
                    return Ok(current.clone());
                }
                // Apply against a copy; the stored row changes only if it all worked.
                let mut updated = current.clone();
                let columns = updated.apply(&modifiers);
                tracing::trace!(character_id = %id, ?columns, "Updating character columns");
                rows.insert(id, updated.clone());
                Ok(updated)
            })
            .await
    }

    async fn adjust_meso(
        &self,
        tenant: &Tenant,
        id: CharacterId,
        delta: i64,
    ) -> Result<MesoAdjustment, RepoError> {
        self.rows
            .mutate(tenant, |rows| {
                let current = rows
                    .get(&id)
                    .ok_or_else(|| RepoError::not_found("Character", id))?;
                let total = i64::from(current.meso()) + delta;
                if total < 0 {
                    return Ok(MesoAdjustment::Insufficient(current.clone()));
                }
                let Ok(meso) = u32::try_from(total) else {
                    return Ok(MesoAdjustment::Overflow);
                };
                let mut updated = current.clone();
                updated.apply(&[Modifier::Meso(meso)]);
                rows.insert(id, updated.clone());
                Ok(MesoAdjustment::Applied(updated))
            })
            .await
    }

    async fn delete(&self, tenant: &Tenant, id: CharacterId) -> Result<(), RepoError> {
        self.rows
            .remove(tenant, &id)
            .await
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found("Character", id))
    }
}

#[cfg(test)]
mod tests {
    use atlas_domain::{AccountId, MapId, TenantId, WorldId};

    use super::*;

    fn tenant() -> Tenant {
        Tenant::new(TenantId::new(), "GMS", 83, 1)
    }

    fn character(name: &str, account: u32) -> Character {
        Character::new(AccountId::from_raw(account), WorldId::from_raw(0), name)
            .with_map(MapId::from_raw(100_000_000), 0)
    }

    #[tokio::test]
    async fn create_assigns_ids_and_rejects_duplicate_names() {
        let repo = MemoryCharacterRepo::new();
        let t = tenant();
        let a = repo.create(&t, character("Alpha", 1)).await.expect("create");
        let b = repo.create(&t, character("Beta", 1)).await.expect("create");
        assert_ne!(a.id(), b.id());

        let err = repo.create(&t, character("ALPHA", 2)).await.expect_err("should fail");
        assert!(matches!(err, RepoError::ConstraintViolation(_)));

        // Other tenants have their own namespace.
        repo.create(&tenant(), character("Alpha", 3)).await.expect("create");
    }

    #[tokio::test]
    async fn queries_filter_rows() {
        let repo = MemoryCharacterRepo::new();
        let t = tenant();
        repo.create(&t, character("Alpha", 1)).await.expect("create");
        repo.create(&t, character("Beta", 2)).await.expect("create");

        let by_account = repo
            .query(
                &t,
                CharacterQuery::ByAccountInWorld {
                    account_id: AccountId::from_raw(2),
                    world_id: WorldId::from_raw(0),
                },
            )
            .await
            .expect("query");
        assert_eq!(by_account.len(), 1);
        assert_eq!(by_account[0].name(), "Beta");

        let by_name = repo
            .query(&t, CharacterQuery::ByName("alpha".into()))
            .await
            .expect("query");
        assert_eq!(by_name.len(), 1);

        let in_map = repo
            .query(
                &t,
                CharacterQuery::InMap {
                    world_id: WorldId::from_raw(0),
                    map_id: MapId::from_raw(100_000_000),
                },
            )
            .await
            .expect("query");
        assert_eq!(in_map.len(), 2);
    }

    #[tokio::test]
    async fn update_touches_only_given_columns() {
        let repo = MemoryCharacterRepo::new();
        let t = tenant();
        let created = repo
            .create(&t, character("Alpha", 1).with_meso(50).with_fame(3))
            .await
            .expect("create");

        let updated = repo
            .update(&t, created.id(), vec![Modifier::Meso(75)])
            .await
            .expect("update");
        assert_eq!(updated.meso(), 75);
        assert_eq!(updated.fame(), 3);

        let unchanged = repo.update(&t, created.id(), vec![]).await.expect("noop");
        assert_eq!(unchanged, updated);
    }

    #[tokio::test]
    async fn meso_adjustments_check_bounds_against_the_stored_row() {
        let repo = MemoryCharacterRepo::new();
        let t = tenant();
        let created = repo
            .create(&t, character("Alpha", 1).with_meso(100))
            .await
            .expect("create");

        let debited = repo.adjust_meso(&t, created.id(), -40).await.expect("adjust");
        assert!(matches!(debited, MesoAdjustment::Applied(ref c) if c.meso() == 60));

        let refused = repo.adjust_meso(&t, created.id(), -61).await.expect("adjust");
        assert!(matches!(refused, MesoAdjustment::Insufficient(ref c) if c.meso() == 60));

        let capped = repo
            .adjust_meso(&t, created.id(), i64::from(u32::MAX))
            .await
            .expect("adjust");
        assert_eq!(capped, MesoAdjustment::Overflow);

        let stored = repo.get(&t, created.id()).await.expect("get").expect("row");
        assert_eq!(stored.meso(), 60);
    }

    #[tokio::test]
    async fn concurrent_meso_adjustments_all_land() {
        let repo = std::sync::Arc::new(MemoryCharacterRepo::new());
        let t = tenant();
        let created = repo
            .create(&t, character("Alpha", 1).with_meso(1_000))
            .await
            .expect("create");

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let repo = repo.clone();
                let t = t.clone();
                let id = created.id();
                let delta = if i % 2 == 0 { 30 } else { -10 };
                tokio::spawn(async move { repo.adjust_meso(&t, id, delta).await })
            })
            .collect();
        for task in tasks {
            let outcome = task.await.expect("join").expect("adjust");
            assert!(matches!(outcome, MesoAdjustment::Applied(_)));
        }

        let stored = repo.get(&t, created.id()).await.expect("get").expect("row");
        assert_eq!(stored.meso(), 1_000 + 25 * 30 - 25 * 10);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let repo = MemoryCharacterRepo::new();
        let t = tenant();
        let err = repo
            .update(&t, CharacterId::from_raw(99), vec![Modifier::Meso(1)])
            .await
            .expect_err("should fail");
        assert!(err.is_not_found());
        let err = repo
            .adjust_meso(&t, CharacterId::from_raw(99), 1)
            .await
            .expect_err("should fail");
        assert!(err.is_not_found());
        assert!(repo.delete(&t, CharacterId::from_raw(99)).await.is_err());
    }
}
