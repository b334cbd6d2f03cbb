//! Game data seeding.
//!
//! Conversation graphs and quest definitions arrive as JSON arrays, either from
//! files named in the service config or from the seed endpoints. Conversations
//! that fail validation are skipped, never stored.

use std::path::Path;

use atlas_domain::conversation::validator;
use atlas_domain::{Conversation, Quest, Tenant};
use thiserror::Error;
use tokio::fs;

use crate::infrastructure::ports::{ConversationRepo, QuestRepo, RepoError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a seed run stored and what it refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub created: usize,
    pub skipped: usize,
}

pub async fn seed_conversations(
    repo: &dyn ConversationRepo,
    tenant: &Tenant,
    conversations: Vec<Conversation>,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    for conversation in conversations {
        let report = validator::validate(&conversation);
        if !report.is_valid() {
            tracing::warn!(
                npc_id = %conversation.npc_id(),
                issues = report.issues.len(),
                "Skipping invalid conversation"
            );
            summary.skipped += 1;
            continue;
        }
        repo.save(tenant, conversation).await?;
        summary.created += 1;
    }
    Ok(summary)
}

pub async fn seed_quests(
    repo: &dyn QuestRepo,
    tenant: &Tenant,
    quests: Vec<Quest>,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    for quest in quests {
        repo.save(tenant, quest).await?;
        summary.created += 1;
    }
    Ok(summary)
}

pub async fn seed_conversations_from_file(
    repo: &dyn ConversationRepo,
    tenant: &Tenant,
    path: impl AsRef<Path>,
) -> Result<SeedSummary, SeedError> {
    let content = fs::read_to_string(path.as_ref()).await?;
    let conversations: Vec<Conversation> = serde_json::from_str(&content)?;
    seed_conversations(repo, tenant, conversations).await
}

pub async fn seed_quests_from_file(
    repo: &dyn QuestRepo,
    tenant: &Tenant,
    path: impl AsRef<Path>,
) -> Result<SeedSummary, SeedError> {
    let content = fs::read_to_string(path.as_ref()).await?;
    let quests: Vec<Quest> = serde_json::from_str(&content)?;
    seed_quests(repo, tenant, quests).await
}
