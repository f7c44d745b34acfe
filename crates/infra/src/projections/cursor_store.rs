//! Projection cursor/offset persistence.
//!
//! Cursors checkpoint the last processed sequence_number per
//! (tenant, aggregate, projection) stream so projections stay idempotent,
//! resume after a crash, and can be cleared for deterministic rebuilds.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::warn;

use hrims_core::{AggregateId, TenantId};

pub trait ProjectionCursorStore: Send + Sync {
    /// Last processed sequence_number for a (tenant, aggregate, projection) stream.
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64>;

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    );

    /// Clear all cursors for a tenant + projection (rebuild support).
    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str);
}

/// No-op cursor store: projections fall back to in-memory cursors.
pub struct InMemoryCursorStore;

impl ProjectionCursorStore for InMemoryCursorStore {
    fn get_cursor(
        &self,
        _tenant_id: TenantId,
        _aggregate_id: AggregateId,
        _projection_name: &str,
    ) -> Option<u64> {
        None
    }

    fn update_cursor(
        &self,
        _tenant_id: TenantId,
        _aggregate_id: AggregateId,
        _projection_name: &str,
        _sequence_number: u64,
    ) {
    }

    fn clear_cursors(&self, _tenant_id: TenantId, _projection_name: &str) {}
}

/// Postgres-backed projection cursor store over the `projection_offsets` table:
///
/// ```sql
/// CREATE TABLE projection_offsets (
///     tenant_id            UUID        NOT NULL,
///     aggregate_id         UUID        NOT NULL,
///     projection_name      TEXT        NOT NULL,
///     last_sequence_number BIGINT      NOT NULL,
///     updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (tenant_id, aggregate_id, projection_name)
/// );
/// ```
pub struct PostgresCursorStore {
    pool: Arc<PgPool>,
}

impl PostgresCursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

impl ProjectionCursorStore for PostgresCursorStore {
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64> {
        let pool = self.pool.clone();
        let projection_name = projection_name.to_string();

        let fetched = crate::runtime::block_on(async move {
            let row = sqlx::query(
                r#"
                SELECT last_sequence_number
                FROM projection_offsets
                WHERE tenant_id = $1 AND aggregate_id = $2 AND projection_name = $3
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(&projection_name)
            .fetch_optional(&*pool)
            .await;

            match row {
                Ok(Some(row)) => row
                    .try_get::<i64, _>("last_sequence_number")
                    .ok()
                    .map(|seq| seq as u64),
                Ok(None) => None,
                Err(e) => {
                    warn!(projection_name, %tenant_id, error = %e, "cursor fetch failed");
                    None
                }
            }
        });

        match fetched {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(%tenant_id, error = %e, "cursor fetch skipped");
                None
            }
        }
    }

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    ) {
        let pool = self.pool.clone();
        let projection_name = projection_name.to_string();

        let bridged = crate::runtime::block_on(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO projection_offsets (
                    tenant_id,
                    aggregate_id,
                    projection_name,
                    last_sequence_number
                )
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (tenant_id, aggregate_id, projection_name)
                DO UPDATE SET
                    last_sequence_number = EXCLUDED.last_sequence_number,
                    updated_at = NOW()
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(&projection_name)
            .bind(sequence_number as i64)
            .execute(&*pool)
            .await;

            if let Err(e) = result {
                warn!(projection_name, %tenant_id, error = %e, "cursor update failed");
            }
        });

        if let Err(e) = bridged {
            warn!(%tenant_id, error = %e, "cursor update skipped");
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str) {
        let pool = self.pool.clone();
        let projection_name = projection_name.to_string();

        let bridged = crate::runtime::block_on(async move {
            let result = sqlx::query(
                "DELETE FROM projection_offsets WHERE tenant_id = $1 AND projection_name = $2",
            )
            .bind(tenant_id.as_uuid())
            .bind(&projection_name)
            .execute(&*pool)
            .await;

            if let Err(e) = result {
                warn!(projection_name, %tenant_id, error = %e, "cursor clear failed");
            }
        });

        if let Err(e) = bridged {
            warn!(%tenant_id, error = %e, "cursor clear skipped");
        }
    }
}
