//! Tenant-partitioned in-memory registries.
//!
//! The outer `DashMap` creates each tenant's partition once; after that every
//! read and write only takes the partition's own `RwLock`, so tenants never
//! contend with each other.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use atlas_domain::Tenant;
use dashmap::DashMap;
use tokio::sync::RwLock;

type Partition<K, V> = Arc<RwLock<HashMap<K, V>>>;

pub struct TenantRegistry<K, V> {
    partitions: DashMap<Tenant, Partition<K, V>>,
}

impl<K, V> Default for TenantRegistry<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            partitions: DashMap::new(),
        }
    }
}

impl<K, V> TenantRegistry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, tenant: &Tenant) -> Partition<K, V> {
        if let Some(existing) = self.partitions.get(tenant) {
            return existing.clone();
        }
        self.partitions
            .entry(tenant.clone())
            .or_insert_with(|| Arc::new(RwLock::new(HashMap::new())))
            .clone()
    }

    pub async fn get(&self, tenant: &Tenant, key: &K) -> Option<V> {
        let partition = self.partition(tenant);
        let guard = partition.read().await;
        guard.get(key).cloned()
    }

    pub async fn contains(&self, tenant: &Tenant, key: &K) -> bool {
        let partition = self.partition(tenant);
        let guard = partition.read().await;
        guard.contains_key(key)
    }

    /// Inserts or replaces, returning the previous value.
    pub async fn set(&self, tenant: &Tenant, key: K, value: V) -> Option<V> {
        let partition = self.partition(tenant);
        let mut guard = partition.write().await;
        guard.insert(key, value)
    }

    /// Inserts only when the key is free. Returns false when it was taken.
    pub async fn insert_new(&self, tenant: &Tenant, key: K, value: V) -> bool {
        let partition = self.partition(tenant);
        let mut guard = partition.write().await;
        if guard.contains_key(&key) {
            return false;
        }
        guard.insert(key, value);
        true
    }

    pub async fn remove(&self, tenant: &Tenant, key: &K) -> Option<V> {
        let partition = self.partition(tenant);
        let mut guard = partition.write().await;
        guard.remove(key)
    }

    /// Applies `f` to the stored value (or `None`) under the write lock and
    /// stores whatever it returns; `None` removes the entry.
    pub async fn update<F>(&self, tenant: &Tenant, key: K, f: F) -> Option<V>
    where
        F: FnOnce(Option<V>) -> Option<V>,
    {
        let partition = self.partition(tenant);
        let mut guard = partition.write().await;
        let current = guard.remove(&key);
        let next = f(current);
        if let Some(value) = &next {
            guard.insert(key, value.clone());
        }
        next
    }

    /// Runs `f` over the whole partition under the write lock.
    pub async fn mutate<F, R>(&self, tenant: &Tenant, f: F) -> R
    where
        F: FnOnce(&mut HashMap<K, V>) -> R,
    {
        let partition = self.partition(tenant);
        let mut guard = partition.write().await;
        f(&mut guard)
    }

    /// Full scan of the tenant's partition under the read lock.
    pub async fn find<P>(&self, tenant: &Tenant, predicate: P) -> Option<(K, V)>
    where
        P: Fn(&V) -> bool,
    {
        let partition = self.partition(tenant);
        let guard = partition.read().await;
        guard
            .iter()
            .find(|(_, v)| predicate(v))
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    pub async fn values(&self, tenant: &Tenant) -> Vec<V> {
        let partition = self.partition(tenant);
        let guard = partition.read().await;
        guard.values().cloned().collect()
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.partitions.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use atlas_domain::TenantId;

    use super::*;

    fn tenant(region: &str) -> Tenant {
        Tenant::new(TenantId::from_uuid(uuid::Uuid::nil()), region, 83, 1)
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let registry: TenantRegistry<u32, String> = TenantRegistry::new();
        let gms = tenant("GMS");
        let jms = tenant("JMS");

        registry.set(&gms, 1, "gms".into()).await;
        assert_eq!(registry.get(&gms, &1).await.as_deref(), Some("gms"));
        assert!(registry.get(&jms, &1).await.is_none());
        assert_eq!(registry.tenants().len(), 2);
    }

    #[tokio::test]
    async fn insert_new_refuses_taken_keys() {
        let registry: TenantRegistry<u32, u32> = TenantRegistry::new();
        let t = tenant("GMS");
        assert!(registry.insert_new(&t, 1, 10).await);
        assert!(!registry.insert_new(&t, 1, 20).await);
        assert_eq!(registry.get(&t, &1).await, Some(10));
    }

    #[tokio::test]
    async fn update_can_remove() {
        let registry: TenantRegistry<u32, u32> = TenantRegistry::new();
        let t = tenant("GMS");
        registry.update(&t, 1, |v| Some(v.unwrap_or(0) + 5)).await;
        assert_eq!(registry.get(&t, &1).await, Some(5));
        registry.update(&t, 1, |_| None).await;
        assert!(!registry.contains(&t, &1).await);
    }

    #[tokio::test]
    async fn find_scans_values() {
        let registry: TenantRegistry<u32, u32> = TenantRegistry::new();
        let t = tenant("GMS");
        registry.set(&t, 1, 10).await;
        registry.set(&t, 2, 20).await;
        assert_eq!(registry.find(&t, |v| *v == 20).await, Some((2, 20)));
        assert!(registry.find(&t, |v| *v == 30).await.is_none());
        assert!(registry.remove(&t, &2).await.is_some());
        assert_eq!(registry.values(&t).await, vec![10]);
    }
}
