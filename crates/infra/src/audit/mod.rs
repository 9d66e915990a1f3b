//! Audit trail: record model, capture policy, sinks and the bounded dispatcher.
//!
//! Persistence is a side effect of serving a request, never a precondition:
//! sink failures are logged by the dispatcher and go no further.

pub mod dispatcher;
pub mod in_memory;
pub mod policy;
pub mod postgres;
pub mod record;

use async_trait::async_trait;
use thiserror::Error;

pub use dispatcher::{AuditDispatcher, AuditDispatcherConfig};
pub use in_memory::InMemoryAuditSink;
pub use policy::AuditPolicy;
pub use postgres::PostgresAuditSink;
pub use record::{AuditAction, AuditRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("audit write timed out")]
    Timeout,

    #[error("audit queue full")]
    QueueFull,

    #[error("audit dispatcher closed")]
    Closed,
}

/// Append-only audit persistence boundary.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError>;
}
