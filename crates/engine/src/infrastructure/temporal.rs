//! Character position cache with coalesced write-behind.
//!
//! Writes land in a tenant-partitioned front cache and a dirty set. A
//! background task flushes the dirty set to the shared key-value store on a
//! short interval; repeated writes to one character inside an interval cost
//! one store write. Reads prefer the front cache and fall back to the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use atlas_domain::{CharacterId, Tenant};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::infrastructure::ports::{KeyValueStore, RepoError};
use crate::infrastructure::tenant_registry::TenantRegistry;

/// Where a character stands and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalDatum {
    pub x: i16,
    pub y: i16,
    pub stance: u8,
}

pub fn store_key(tenant: &Tenant, character_id: CharacterId) -> String {
    format!("character-temporal:{}:{}", tenant.id(), character_id)
}

pub struct TemporalRegistry {
    cache: TenantRegistry<CharacterId, TemporalDatum>,
    dirty: Mutex<HashMap<String, TemporalDatum>>,
    store: Arc<dyn KeyValueStore>,
}

impl TemporalRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cache: TenantRegistry::new(),
            dirty: Mutex::new(HashMap::new()),
            store,
        }
    }

    async fn write(&self, tenant: &Tenant, character_id: CharacterId, datum: TemporalDatum) {
        self.cache.set(tenant, character_id, datum).await;
        self.dirty
            .lock()
            .await
            .insert(store_key(tenant, character_id), datum);
    }

    pub async fn update(&self, tenant: &Tenant, character_id: CharacterId, x: i16, y: i16, stance: u8) {
        self.write(tenant, character_id, TemporalDatum { x, y, stance })
            .await;
    }

    /// Moves the character, keeping its stance.
    pub async fn update_position(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        x: i16,
        y: i16,
    ) -> Result<(), RepoError> {
        let current = self.get_by_id(tenant, character_id).await?;
        self.write(tenant, character_id, TemporalDatum { x, y, ..current })
            .await;
        Ok(())
    }

    /// Changes the stance, keeping the position.
    pub async fn update_stance(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
        stance: u8,
    ) -> Result<(), RepoError> {
        let current = self.get_by_id(tenant, character_id).await?;
        self.write(tenant, character_id, TemporalDatum { stance, ..current })
            .await;
        Ok(())
    }

    /// Cached datum, else the stored one, else the origin.
    pub async fn get_by_id(
        &self,
        tenant: &Tenant,
        character_id: CharacterId,
    ) -> Result<TemporalDatum, RepoError> {
        if let Some(datum) = self.cache.get(tenant, &character_id).await {
            return Ok(datum);
        }
        let Some(raw) = self.store.get(&store_key(tenant, character_id)).await? else {
            return Ok(TemporalDatum::default());
        };
        let datum: TemporalDatum =
            serde_json::from_str(&raw).map_err(RepoError::serialization)?;
        self.cache.set(tenant, character_id, datum).await;
        Ok(datum)
    }

    pub async fn remove(&self, tenant: &Tenant, character_id: CharacterId) -> Result<(), RepoError> {
        let key = store_key(tenant, character_id);
        self.cache.remove(tenant, &character_id).await;
        self.dirty.lock().await.remove(&key);
        self.store.remove(&key).await
    }

    /// Writes every pending datum to the store. Entries that fail to write
    /// stay pending unless a newer write replaced them meanwhile.
    pub async fn flush(&self) -> Result<usize, RepoError> {
        let pending: HashMap<String, TemporalDatum> = std::mem::take(&mut *self.dirty.lock().await);
        if pending.is_empty() {
            return Ok(0);
        }

        let mut entries = Vec::with_capacity(pending.len());
        for (key, datum) in &pending {
            let value = serde_json::to_string(datum).map_err(RepoError::serialization)?;
            entries.push((key.clone(), value));
        }
        let count = entries.len();

        if let Err(e) = self.store.put_all(entries).await {
            let mut dirty = self.dirty.lock().await;
            for (key, datum) in pending {
                dirty.entry(key).or_insert(datum);
            }
            return Err(e);
        }
        Ok(count)
    }

    /// Starts the periodic flusher. Call [`TemporalFlusher::shutdown`] to stop
    /// it; shutdown performs one final flush.
    pub fn spawn_flusher(self: &Arc<Self>, interval: Duration) -> TemporalFlusher {
        let (shutdown, mut stop) = watch::channel(false);
        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = registry.flush().await {
                            tracing::warn!(error = %e, "Temporal flush failed, will retry");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
            match registry.flush().await {
                Ok(count) => tracing::debug!(count, "Final temporal flush"),
                Err(e) => tracing::error!(error = %e, "Final temporal flush failed"),
            }
        });
        TemporalFlusher { shutdown, handle }
    }
}

pub struct TemporalFlusher {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TemporalFlusher {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Temporal flusher task panicked");
        }
    }
}
