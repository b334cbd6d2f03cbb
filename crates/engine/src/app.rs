//! Application state and composition.

use std::sync::Arc;

use atlas_domain::Tenant;

use crate::infrastructure::{
    clock::{SystemClock, SystemRandom},
    contexts::ConversationContexts,
    memory::{MemoryCharacterRepo, MemoryConversationRepo, MemoryKeyValueStore, MemoryQuestRepo},
    peers::{HttpPeerClient, LocalPeers},
    ports::{
        AppearancePort, CharacterRepo, ClockPort, ConversationRepo, InventoryPort, KeyValueStore,
        MapPort, NpcTalkPort, PetPort, ProducerPort, QuestRepo, RandomPort, SagaPort,
        SkillDataPort, ValidationPort,
    },
    producer::TopicBus,
    seed::{self, SeedError, SeedSummary},
    settings::ServiceConfig,
    temporal::TemporalRegistry,
};
use crate::use_cases::{
    character::{CharacterGrowth, CharacterProcessor, MoveCharacter},
    conversation::{ConditionEvaluator, ConversationProcessor, OperationExecutor, ResumeConversation},
    CharacterUseCases, ConversationUseCases,
};

/// Main application state.
///
/// Passed to HTTP handlers via Axum state and to the topic consumers.
pub struct App {
    pub config: ServiceConfig,
    pub bus: Arc<TopicBus>,
    pub temporal: Arc<TemporalRegistry>,
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Tenant-scoped stores, injected as port traits.
pub struct Repositories {
    pub characters: Arc<dyn CharacterRepo>,
    pub conversations: Arc<dyn ConversationRepo>,
    pub quests: Arc<dyn QuestRepo>,
}

pub struct UseCases {
    pub conversation: ConversationUseCases,
    pub character: CharacterUseCases,
}

/// Peer service ports, all backed by one adapter.
struct Peers {
    validation: Arc<dyn ValidationPort>,
    appearance: Arc<dyn AppearancePort>,
    inventory: Arc<dyn InventoryPort>,
    pets: Arc<dyn PetPort>,
    maps: Arc<dyn MapPort>,
    skills: Arc<dyn SkillDataPort>,
}

impl Peers {
    fn from_adapter<P>(adapter: P) -> Self
    where
        P: ValidationPort
            + AppearancePort
            + InventoryPort
            + PetPort
            + MapPort
            + SkillDataPort
            + 'static,
    {
        let adapter = Arc::new(adapter);
        Self {
            validation: adapter.clone(),
            appearance: adapter.clone(),
            inventory: adapter.clone(),
            pets: adapter.clone(),
            maps: adapter.clone(),
            skills: adapter,
        }
    }
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(config: ServiceConfig) -> Self {
        // Infrastructure services
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let random: Arc<dyn RandomPort> = Arc::new(SystemRandom::new());
        let bus = Arc::new(TopicBus::new(config.topics.clone()));
        let producer: Arc<dyn ProducerPort> = bus.clone();
        let saga: Arc<dyn SagaPort> = bus.clone();
        let talk: Arc<dyn NpcTalkPort> = bus.clone();

        // Stores
        let characters: Arc<dyn CharacterRepo> = Arc::new(MemoryCharacterRepo::new());
        let conversations: Arc<dyn ConversationRepo> = Arc::new(MemoryConversationRepo::new());
        let quests: Arc<dyn QuestRepo> = Arc::new(MemoryQuestRepo::new());
        let key_value: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let temporal = Arc::new(TemporalRegistry::new(key_value));
        let contexts = Arc::new(ConversationContexts::new());

        let peers = match config.peer_base_url.as_deref() {
            Some(base_url) => {
                tracing::info!(base_url, "Using peer services");
                Peers::from_adapter(HttpPeerClient::new(base_url, producer.clone()))
            }
            None => {
                tracing::info!("No peer base URL configured, using in-process peers");
                Peers::from_adapter(LocalPeers::new(characters.clone(), producer.clone()))
            }
        };

        // Conversation
        let executor = Arc::new(OperationExecutor::new(
            saga.clone(),
            peers.appearance.clone(),
            peers.inventory.clone(),
            peers.pets.clone(),
            peers.maps.clone(),
            clock.clone(),
            random.clone(),
        ));
        let evaluator = Arc::new(ConditionEvaluator::new(peers.validation.clone()));
        let processor = Arc::new(ConversationProcessor::new(
            conversations.clone(),
            contexts.clone(),
            talk,
            saga,
            executor,
            evaluator,
            clock,
        ));
        let resume = Arc::new(ResumeConversation::new(contexts, processor.clone()));
        let conversation = ConversationUseCases::new(processor, resume);

        // Character
        let character = CharacterUseCases::new(
            Arc::new(CharacterProcessor::new(
                characters.clone(),
                peers.maps.clone(),
                temporal.clone(),
                producer.clone(),
            )),
            Arc::new(CharacterGrowth::new(
                characters.clone(),
                peers.skills.clone(),
                random,
                producer,
            )),
            Arc::new(MoveCharacter::new(temporal.clone())),
        );

        Self {
            config,
            bus,
            temporal,
            repositories: Repositories {
                characters,
                conversations,
                quests,
            },
            use_cases: UseCases {
                conversation,
                character,
            },
        }
    }

    /// Loads the configured conversation file for `tenant`. `None` when no
    /// file is configured.
    pub async fn seed_conversations(&self, tenant: &Tenant) -> Result<Option<SeedSummary>, SeedError> {
        let Some(path) = self.config.conversation_data_path.as_deref() else {
            return Ok(None);
        };
        let summary =
            seed::seed_conversations_from_file(self.repositories.conversations.as_ref(), tenant, path)
                .await?;
        tracing::info!(
            tenant_id = %tenant.id(),
            path,
            created = summary.created,
            skipped = summary.skipped,
            "Seeded conversations"
        );
        Ok(Some(summary))
    }

    pub async fn seed_quests(&self, tenant: &Tenant) -> Result<Option<SeedSummary>, SeedError> {
        let Some(path) = self.config.quest_data_path.as_deref() else {
            return Ok(None);
        };
        let summary = seed::seed_quests_from_file(self.repositories.quests.as_ref(), tenant, path).await?;
        tracing::info!(tenant_id = %tenant.id(), path, created = summary.created, "Seeded quests");
        Ok(Some(summary))
    }
}
