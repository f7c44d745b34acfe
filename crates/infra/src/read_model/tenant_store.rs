use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use hrims_core::TenantId;

/// Tenant-isolated key/value store abstraction for disposable read models.
///
/// Read models are projections over the event log and can always be rebuilt,
/// so implementations trade durability guarantees for simplicity.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Clear all read-model records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests and single-process deployments.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_existing_value() {
        let store: InMemoryTenantStore<String, u32> = InMemoryTenantStore::new();
        let tenant = TenantId::new();

        store.upsert(tenant, "hc-001".to_string(), 1);
        store.upsert(tenant, "hc-001".to_string(), 2);

        assert_eq!(store.get(tenant, &"hc-001".to_string()), Some(2));
        assert_eq!(store.list(tenant).len(), 1);
    }

    #[test]
    fn tenants_do_not_see_each_other() {
        let store: InMemoryTenantStore<String, u32> = InMemoryTenantStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store.upsert(tenant_a, "hc-001".to_string(), 1);

        assert_eq!(store.get(tenant_b, &"hc-001".to_string()), None);
        assert!(store.list(tenant_b).is_empty());
    }

    #[test]
    fn clear_tenant_only_touches_one_tenant() {
        let store: InMemoryTenantStore<String, u32> = InMemoryTenantStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store.upsert(tenant_a, "hc-001".to_string(), 1);
        store.upsert(tenant_b, "hc-001".to_string(), 2);

        store.clear_tenant(tenant_a);

        assert!(store.list(tenant_a).is_empty());
        assert_eq!(store.list(tenant_b).len(), 1);
    }
}
