//! Bounded fire-and-forget audit delivery.
//!
//! Requests enqueue with `try_send` and never wait; a fixed pool of workers
//! drains the queue, each write under its own timeout. A full queue drops the
//! record with a warning instead of growing background work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{AuditError, AuditRecord, AuditSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditDispatcherConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub write_timeout: Duration,
}

impl Default for AuditDispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            write_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct DispatchStats {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Cloneable handle to the audit queue.
#[derive(Debug, Clone)]
pub struct AuditDispatcher {
    tx: mpsc::Sender<AuditRecord>,
    stats: Arc<DispatchStats>,
}

impl AuditDispatcher {
    /// Start the worker pool on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, config: AuditDispatcherConfig) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DispatchStats::default());

        let handles = (0..config.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let sink = Arc::clone(&sink);
                let stats = Arc::clone(&stats);
                tokio::spawn(worker_loop(worker, rx, sink, stats, config.write_timeout))
            })
            .collect();

        (Self { tx, stats }, handles)
    }

    /// Enqueue without waiting.
    pub fn dispatch(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.tx.try_send(record).map_err(|err| match err {
            mpsc::error::TrySendError::Full(record) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    entity_type = %record.entity_type,
                    action = record.action.as_str(),
                    "audit queue full, dropping record"
                );
                AuditError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => AuditError::Closed,
        })
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            written: self.stats.written.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<AuditRecord>>>,
    sink: Arc<dyn AuditSink>,
    stats: Arc<DispatchStats>,
    write_timeout: Duration,
) {
    loop {
        // The receiver lock is held only while waiting for the next record.
        let next = rx.lock().await.recv().await;
        let Some(record) = next else {
            debug!(worker, "audit queue closed, worker exiting");
            return;
        };

        let outcome = tokio::time::timeout(write_timeout, sink.write(&record))
            .await
            .unwrap_or(Err(AuditError::Timeout));
        match outcome {
            Ok(()) => {
                stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker,
                    error = %err,
                    audit_id = %record.id,
                    entity_type = %record.entity_type,
                    "failed to persist audit record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, InMemoryAuditSink};
    use async_trait::async_trait;
    use chrono::Utc;
    use relation_core::{AuditRecordId, RequestId};

    fn record(path: &str) -> AuditRecord {
        AuditRecord {
            id: AuditRecordId::new(),
            occurred_at: Utc::now(),
            action: AuditAction::Create,
            entity_type: "Customer".into(),
            entity_id: None,
            user_id: None,
            user_email: None,
            user_name: None,
            company: None,
            method: "POST".into(),
            path: path.into(),
            status: 201,
            payload: None,
            client_ip: None,
            user_agent: None,
            request_id: RequestId::new(),
        }
    }

    struct SlowSink(Duration);

    #[async_trait]
    impl AuditSink for SlowSink {
        async fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Storage("disk full".into()))
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn records_reach_the_sink() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let (dispatcher, _workers) = AuditDispatcher::spawn(sink.clone(), AuditDispatcherConfig::default());

        for i in 0..10 {
            dispatcher.dispatch(record(&format!("/customers/{i}"))).unwrap();
        }
        wait_until(|| sink.len() == 10).await;
        wait_until(|| dispatcher.stats().written == 10).await;
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let sink = Arc::new(SlowSink(Duration::from_secs(5)));
        let (dispatcher, _workers) = AuditDispatcher::spawn(
            sink,
            AuditDispatcherConfig {
                queue_capacity: 1,
                workers: 1,
                write_timeout: Duration::from_secs(10),
            },
        );

        let mut dropped = 0;
        for _ in 0..5 {
            if dispatcher.dispatch(record("/customers")) == Err(AuditError::QueueFull) {
                dropped += 1;
            }
        }
        assert!(dropped >= 3);
        assert_eq!(dispatcher.stats().dropped, dropped);
    }

    #[tokio::test]
    async fn sink_failures_and_timeouts_are_swallowed() {
        let (failing, _w1) = AuditDispatcher::spawn(Arc::new(FailingSink), AuditDispatcherConfig::default());
        failing.dispatch(record("/customers")).unwrap();
        wait_until(|| failing.stats().failed == 1).await;

        let (slow, _w2) = AuditDispatcher::spawn(
            Arc::new(SlowSink(Duration::from_secs(5))),
            AuditDispatcherConfig {
                write_timeout: Duration::from_millis(20),
                ..AuditDispatcherConfig::default()
            },
        );
        slow.dispatch(record("/customers")).unwrap();
        wait_until(|| slow.stats().failed == 1).await;
    }
}
