//! Staging area for messages produced during one transaction.
//!
//! Mutating code appends to a buffer; the caller flushes it only after the
//! underlying write succeeded. Nothing flushes automatically.

use std::collections::BTreeMap;

use atlas_domain::Tenant;
use atlas_shared::Topic;
use serde::Serialize;

use crate::infrastructure::ports::{Message, ProducerError, ProducerPort};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageBuffer {
    staged: BTreeMap<Topic, Vec<Message>>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends whatever `provider` yields. A failing provider stages nothing.
    pub fn put<F>(&mut self, topic: Topic, provider: F) -> Result<(), ProducerError>
    where
        F: FnOnce() -> Result<Vec<Message>, ProducerError>,
    {
        let messages = provider()?;
        self.staged.entry(topic).or_default().extend(messages);
        Ok(())
    }

    pub fn put_json<T: Serialize>(
        &mut self,
        topic: Topic,
        key: impl ToString,
        value: &T,
    ) -> Result<(), ProducerError> {
        self.put(topic, || Ok(vec![Message::json(key, value)?]))
    }

    pub fn get_all(&self) -> &BTreeMap<Topic, Vec<Message>> {
        &self.staged
    }

    pub fn messages(&self, topic: Topic) -> &[Message] {
        self.staged.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.staged.values().all(Vec::is_empty)
    }

    /// Moves `other`'s messages behind this buffer's.
    pub fn append(&mut self, other: MessageBuffer) {
        for (topic, messages) in other.staged {
            self.staged.entry(topic).or_default().extend(messages);
        }
    }

    /// Sends every staged topic in topic order, consuming the buffer.
    pub async fn flush(
        self,
        tenant: &Tenant,
        producer: &dyn ProducerPort,
    ) -> Result<(), ProducerError> {
        for (topic, messages) in self.staged {
            if messages.is_empty() {
                continue;
            }
            producer.send(tenant, topic, messages).await?;
        }
        Ok(())
    }
}
