//! In-process topic bus.
//!
//! Produced messages are published on a broadcast channel under their resolved
//! topic name. Local consumers subscribe to the same channel, so commands the
//! engine sends to itself (appearance changes, internal level awards) loop back
//! through the ordinary consumer path.

use async_trait::async_trait;
use atlas_domain::{Saga, Tenant};
use atlas_shared::{NpcTalkCommand, Topic};
use tokio::sync::broadcast;

use crate::infrastructure::ports::{
    Message, NpcTalkPort, PeerError, ProducerError, ProducerPort, SagaError, SagaPort,
};
use crate::infrastructure::settings::TopicNames;

const DEFAULT_CAPACITY: usize = 1024;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tenant: Tenant,
    pub topic: String,
    pub message: Message,
}

#[derive(Clone)]
pub struct TopicBus {
    names: TopicNames,
    sender: broadcast::Sender<Envelope>,
}

impl TopicBus {
    pub fn new(names: TopicNames) -> Self {
        Self::with_capacity(names, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(names: TopicNames, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { names, sender }
    }

    pub fn names(&self) -> &TopicNames {
        &self.names
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Publishes under a raw topic name. Used by the ingress endpoint.
    pub fn publish(&self, tenant: &Tenant, topic: &str, message: Message) {
        let envelope = Envelope {
            tenant: tenant.clone(),
            topic: topic.to_string(),
            message,
        };
        // No subscribers is not an error: the message simply has no local reader.
        if self.sender.send(envelope).is_err() {
            tracing::trace!(topic, "No local subscribers");
        }
    }
}

#[async_trait]
impl ProducerPort for TopicBus {
    async fn send(
        &self,
        tenant: &Tenant,
        topic: Topic,
        messages: Vec<Message>,
    ) -> Result<(), ProducerError> {
        let name = self.names.name(topic);
        tracing::debug!(topic = name, count = messages.len(), tenant = %tenant, "Producing messages");
        for message in messages {
            self.publish(tenant, name, message);
        }
        Ok(())
    }
}

#[async_trait]
impl SagaPort for TopicBus {
    async fn submit(&self, tenant: &Tenant, saga: Saga) -> Result<(), SagaError> {
        if saga.steps.is_empty() {
            return Err(SagaError::Empty);
        }
        let message = Message::json(saga.transaction_id, &saga)
            .map_err(|e| SagaError::Submission(e.to_string()))?;
        tracing::info!(
            transaction_id = %saga.transaction_id,
            initiated_by = %saga.initiated_by,
            steps = saga.steps.len(),
            "Submitting saga"
        );
        ProducerPort::send(self, tenant, Topic::SagaCommand, vec![message])
            .await
            .map_err(|e| SagaError::Submission(e.to_string()))
    }
}

#[async_trait]
impl NpcTalkPort for TopicBus {
    async fn send(&self, tenant: &Tenant, command: NpcTalkCommand) -> Result<(), PeerError> {
        let message = Message::json(command.character_id, &command)
            .map_err(|e| PeerError::RequestFailed(e.to_string()))?;
        ProducerPort::send(self, tenant, Topic::NpcCommand, vec![message])
            .await
            .map_err(|e| PeerError::RequestFailed(e.to_string()))
    }
}
