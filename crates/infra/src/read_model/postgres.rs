//! Postgres-backed tenant store implementation.
//!
//! Persists read models as JSON documents in a single `read_models` table,
//! discriminated by a `model_name` column:
//!
//! ```sql
//! CREATE TABLE read_models (
//!     tenant_id  UUID        NOT NULL,
//!     model_name TEXT        NOT NULL,
//!     key        TEXT        NOT NULL,
//!     value      JSONB       NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (tenant_id, model_name, key)
//! );
//! ```
//!
//! Every query includes `tenant_id` in the primary key, so cross-tenant reads
//! are architecturally impossible. `clear_tenant()` removes one tenant's rows
//! for a model, enabling deterministic rebuilds from the event stream.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use tracing::warn;

use hrims_core::TenantId;

use super::TenantStore;

/// Postgres-backed tenant store for one named read model.
///
/// The store is synchronous at the trait boundary; queries run through the
/// runtime bridge, mirroring the event store. Read models are disposable, so
/// storage failures are logged at warn level and surfaced as absent data
/// rather than panics.
pub struct PostgresTenantStore<K, V> {
    pool: Arc<PgPool>,
    model_name: &'static str,
    _key: PhantomData<K>,
    _value: PhantomData<V>,
}

impl<K, V> PostgresTenantStore<K, V> {
    /// Create a store for the given model name, e.g. `"employees"`.
    pub fn new(pool: PgPool, model_name: &'static str) -> Self {
        Self {
            pool: Arc::new(pool),
            model_name,
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<K, V> TenantStore<K, V> for PostgresTenantStore<K, V>
where
    K: Display + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let pool = self.pool.clone();
        let model_name = self.model_name;
        let key = key.to_string();

        let fetched = crate::runtime::block_on(async move {
            let row = sqlx::query(
                r#"
                SELECT value
                FROM read_models
                WHERE tenant_id = $1 AND model_name = $2 AND key = $3
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(model_name)
            .bind(&key)
            .fetch_optional(&*pool)
            .await;

            let row = match row {
                Ok(row) => row?,
                Err(e) => {
                    warn!(model_name, %tenant_id, error = %e, "read model get failed");
                    return None;
                }
            };

            let value: serde_json::Value = row.try_get("value").ok()?;
            match serde_json::from_value(value) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(model_name, %tenant_id, error = %e, "read model row did not deserialize");
                    None
                }
            }
        });

        match fetched {
            Ok(value) => value,
            Err(e) => {
                warn!(model_name = self.model_name, %tenant_id, error = %e, "read model get skipped");
                None
            }
        }
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        let json = match serde_json::to_value(&value) {
            Ok(json) => json,
            Err(e) => {
                warn!(model_name = self.model_name, %tenant_id, error = %e, "read model did not serialize");
                return;
            }
        };

        let pool = self.pool.clone();
        let model_name = self.model_name;
        let key = key.to_string();

        let bridged = crate::runtime::block_on(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO read_models (tenant_id, model_name, key, value)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (tenant_id, model_name, key)
                DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(model_name)
            .bind(&key)
            .bind(&json)
            .execute(&*pool)
            .await;

            if let Err(e) = result {
                warn!(model_name, %tenant_id, error = %e, "read model upsert failed");
            }
        });

        if let Err(e) = bridged {
            warn!(model_name = self.model_name, %tenant_id, error = %e, "read model upsert skipped");
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let pool = self.pool.clone();
        let model_name = self.model_name;

        let fetched = crate::runtime::block_on(async move {
            let rows = sqlx::query(
                r#"
                SELECT value
                FROM read_models
                WHERE tenant_id = $1 AND model_name = $2
                ORDER BY key
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(model_name)
            .fetch_all(&*pool)
            .await;

            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(model_name, %tenant_id, error = %e, "read model list failed");
                    return vec![];
                }
            };

            rows.into_iter()
                .filter_map(|row| {
                    let value: serde_json::Value = row.try_get("value").ok()?;
                    serde_json::from_value(value).ok()
                })
                .collect()
        });

        match fetched {
            Ok(values) => values,
            Err(e) => {
                warn!(model_name = self.model_name, %tenant_id, error = %e, "read model list skipped");
                vec![]
            }
        }
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        let pool = self.pool.clone();
        let model_name = self.model_name;

        let bridged = crate::runtime::block_on(async move {
            let result = sqlx::query(
                "DELETE FROM read_models WHERE tenant_id = $1 AND model_name = $2",
            )
            .bind(tenant_id.as_uuid())
            .bind(model_name)
            .execute(&*pool)
            .await;

            if let Err(e) = result {
                warn!(model_name, %tenant_id, error = %e, "read model clear failed");
            }
        });

        if let Err(e) = bridged {
            warn!(model_name = self.model_name, %tenant_id, error = %e, "read model clear skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::postgres::PgPoolOptions;

    use hrims_people::EmployeeId;

    use crate::projections::EmployeeReadModel;

    use super::*;

    fn unreachable_store() -> PostgresTenantStore<EmployeeId, EmployeeReadModel> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:1/hrims")
            .expect("lazy pool");
        PostgresTenantStore::new(pool, "people.employees")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn get_from_async_handlers_degrades_to_none() {
        let store = unreachable_store();
        let key = EmployeeId::new(hrims_core::AggregateId::new());

        assert!(store.get(TenantId::new(), &key).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn list_from_async_handlers_degrades_to_empty() {
        let store = unreachable_store();

        assert!(store.list(TenantId::new()).is_empty());
    }
}
