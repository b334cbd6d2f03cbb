//! Live conversation contexts, one per character per tenant.

use atlas_domain::{CharacterId, ConversationContext, Tenant, TransactionId};

use crate::infrastructure::tenant_registry::TenantRegistry;

#[derive(Default)]
pub struct ConversationContexts {
    registry: TenantRegistry<CharacterId, ConversationContext>,
}

impl ConversationContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tenant: &Tenant, character_id: CharacterId) -> Option<ConversationContext> {
        self.registry.get(tenant, &character_id).await
    }

    pub async fn save(&self, tenant: &Tenant, context: ConversationContext) {
        self.registry
            .set(tenant, context.character_id(), context)
            .await;
    }

    /// Stores `context` unless the character is already in a conversation.
    pub async fn begin(&self, tenant: &Tenant, context: ConversationContext) -> bool {
        self.registry
            .insert_new(tenant, context.character_id(), context)
            .await
    }

    pub async fn clear(&self, tenant: &Tenant, character_id: CharacterId) -> bool {
        self.registry.remove(tenant, &character_id).await.is_some()
    }

    /// The context parked on `saga_id`, if any.
    pub async fn find_by_pending_saga(
        &self,
        tenant: &Tenant,
        saga_id: TransactionId,
    ) -> Option<ConversationContext> {
        self.registry
            .find(tenant, |ctx| ctx.pending_saga_id() == Some(saga_id))
            .await
            .map(|(_, ctx)| ctx)
    }
}
