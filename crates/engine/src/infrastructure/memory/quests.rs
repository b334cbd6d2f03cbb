use async_trait::async_trait;
use atlas_domain::{Quest, Tenant};

use crate::infrastructure::ports::{QuestRepo, RepoError};
use crate::infrastructure::tenant_registry::TenantRegistry;

/// Quest documents keyed by `(tenant, quest id)`.
#[derive(Default)]
pub struct MemoryQuestRepo {
    quests: TenantRegistry<u32, Quest>,
}

impl MemoryQuestRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestRepo for MemoryQuestRepo {
    async fn list(&self, tenant: &Tenant) -> Result<Vec<Quest>, RepoError> {
        let mut quests = self.quests.values(tenant).await;
        quests.sort_by_key(|q| q.id);
        Ok(quests)
    }

    async fn get(&self, tenant: &Tenant, quest_id: u32) -> Result<Option<Quest>, RepoError> {
        Ok(self.quests.get(tenant, &quest_id).await)
    }

    async fn save(&self, tenant: &Tenant, quest: Quest) -> Result<(), RepoError> {
        self.quests.set(tenant, quest.id, quest).await;
        Ok(())
    }
}
