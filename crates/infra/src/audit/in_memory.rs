use std::sync::RwLock;

use async_trait::async_trait;

use super::{AuditError, AuditRecord, AuditSink};

/// In-memory audit sink.
///
/// Intended for tests/dev. Records are kept in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records
            .write()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
