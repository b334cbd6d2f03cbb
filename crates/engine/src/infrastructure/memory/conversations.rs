use async_trait::async_trait;
use atlas_domain::{Conversation, NpcId, Tenant};

use crate::infrastructure::ports::{ConversationRepo, RepoError};
use crate::infrastructure::tenant_registry::TenantRegistry;

/// Conversation definitions keyed by NPC.
#[derive(Default)]
pub struct MemoryConversationRepo {
    conversations: TenantRegistry<NpcId, Conversation>,
}

impl MemoryConversationRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepo for MemoryConversationRepo {
    async fn get_for_npc(
        &self,
        tenant: &Tenant,
        npc_id: NpcId,
    ) -> Result<Option<Conversation>, RepoError> {
        Ok(self.conversations.get(tenant, &npc_id).await)
    }

    async fn save(&self, tenant: &Tenant, conversation: Conversation) -> Result<(), RepoError> {
        self.conversations
            .set(tenant, conversation.npc_id(), conversation)
            .await;
        Ok(())
    }
}
