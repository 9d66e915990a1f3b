//! Postgres-backed audit sink.
//!
//! Rows are inserted into `audit_logs` and never updated. SQLx errors are
//! flattened into [`AuditError::Storage`]; the dispatcher logs them.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::{AuditError, AuditRecord, AuditSink};

#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: Arc<PgPool>,
}

impl PostgresAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, AuditError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `audit_logs` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id          UUID PRIMARY KEY,
                occurred_at TIMESTAMPTZ NOT NULL,
                action      TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id   UUID NULL,
                user_id     UUID NULL,
                user_email  TEXT NULL,
                user_name   TEXT NULL,
                company_id  TEXT NULL,
                method      TEXT NOT NULL,
                path        TEXT NOT NULL,
                status      INTEGER NOT NULL,
                payload     JSONB NULL,
                ip_address  TEXT NULL,
                user_agent  TEXT NULL,
                request_id  UUID NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    #[instrument(
        skip(self, record),
        fields(
            audit_id = %record.id,
            entity_type = %record.entity_type,
            action = record.action.as_str()
        ),
        err
    )]
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, occurred_at, action, entity_type, entity_id,
                user_id, user_email, user_name, company_id,
                method, path, status, payload,
                ip_address, user_agent, request_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.occurred_at)
        .bind(record.action.as_str())
        .bind(&record.entity_type)
        .bind(record.entity_id.map(|id| *id.as_uuid()))
        .bind(record.user_id.map(|id| *id.as_uuid()))
        .bind(record.user_email.as_deref())
        .bind(record.user_name.as_deref())
        .bind(record.company.map(|c| c.as_str()))
        .bind(&record.method)
        .bind(&record.path)
        .bind(i32::from(record.status))
        .bind(record.payload.as_ref())
        .bind(record.client_ip.as_deref())
        .bind(record.user_agent.as_deref())
        .bind(record.request_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuditError {
    match err {
        sqlx::Error::PoolTimedOut => AuditError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            AuditError::Storage(format!("{operation}: database error {code}: {}", db.message()))
        }
        other => AuditError::Storage(format!("{operation}: {other}")),
    }
}
