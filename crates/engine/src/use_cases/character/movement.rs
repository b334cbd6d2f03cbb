use std::sync::Arc;

use atlas_domain::{CharacterId, Tenant};
use atlas_shared::MovementCommand;

use super::CharacterError;
use crate::infrastructure::temporal::TemporalRegistry;

/// Folds client movement into the character's temporal position.
pub struct MoveCharacter {
    temporal: Arc<TemporalRegistry>,
}

impl MoveCharacter {
    pub fn new(temporal: Arc<TemporalRegistry>) -> Self {
        Self { temporal }
    }

    pub async fn execute(&self, tenant: &Tenant, command: &MovementCommand) -> Result<(), CharacterError> {
        let id = CharacterId::from_raw(command.character_id);
        let current = self.temporal.get_by_id(tenant, id).await?;
        let summary = command.movement.summary(current.stance);
        tracing::trace!(character_id = %id, x = summary.x, y = summary.y, stance = summary.stance, "Character moved");
        self.temporal
            .update(tenant, id, summary.x, summary.y, summary.stance)
            .await;
        Ok(())
    }
}
