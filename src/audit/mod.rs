//! Non-blocking, rotating, queryable NDJSON audit log.
//!
//! Producers never touch the filesystem: [`AuditPipeline::log`] serializes
//! and pushes onto a bounded `crossbeam::channel`, and a single dedicated
//! writer thread (spawned in [`AuditPipeline::new`]) owns the active
//! segment exclusively. Reads go through [`AuditStore`], which is
//! stateless and safe to use concurrently with the writer.

mod entry;
mod query;
mod segment;
mod stats;
mod store;
mod writer;

pub use entry::{AuditEntry, AuditType};
pub use query::{AuditPage, QueryFilter};
pub use stats::AuditStatsSnapshot;
pub use store::{AuditAggregateCounts, AuditStore, StatsRange};

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, TrySendError};
use tokio::sync::oneshot;
use tracing::warn;

use crate::config::AuditConfig;
use crate::error::{GatewayError, GatewayResult};
use stats::AuditStats;
use writer::{WriteMsg, WriterConfig};

/// Producer-facing handle to the audit pipeline. Owns the writer thread for
/// its lifetime; wrap in an `Arc` to share one pipeline across producers.
pub struct AuditPipeline {
    tx: Option<channel::Sender<WriteMsg>>,
    stats: Arc<AuditStats>,
    store: AuditStore,
    retention_days: u32,
    writer_handle: Option<JoinHandle<()>>,
}

impl AuditPipeline {
    pub fn new(config: &AuditConfig) -> Self {
        let (tx, rx) = channel::bounded(config.queue_capacity);
        let stats = Arc::new(AuditStats::new());
        let writer_cfg = WriterConfig {
            log_dir: config.log_dir.clone(),
            max_file_size: config.max_file_size,
        };
        let writer_stats = Arc::clone(&stats);
        let writer_handle = std::thread::Builder::new()
            .name("audit-writer".into())
            .spawn(move || writer::run(rx, writer_cfg, writer_stats))
            .expect("failed to spawn audit writer thread");

        Self {
            tx: Some(tx),
            stats,
            store: AuditStore::new(config.log_dir.clone()),
            retention_days: config.retention_days,
            writer_handle: Some(writer_handle),
        }
    }

    /// Enqueues a pre-built entry. Resolves once accepted into the ingest
    /// queue, not once it has reached disk; see [`AuditPipeline::flush`].
    pub fn log(&self, entry: AuditEntry) {
        self.stats.total_logged.fetch_add(1, Ordering::Relaxed);
        let tx = self.tx.as_ref().expect("pipeline sender taken");
        match tx.try_send(WriteMsg::Entry(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Drop-newest-with-error per the ingest policy: the caller
                // gets a ready handle regardless, but the drop is always
                // visible through stats.
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                warn!("audit queue full, dropping entry");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                warn!("audit writer thread gone, dropping entry");
            }
        }
    }

    /// Convenience overload building the entry inline.
    pub fn log_fields(
        &self,
        entry_type: AuditType,
        action: impl Into<String>,
        user_id: impl Into<String>,
        ip_address: impl Into<String>,
        request_id: Option<String>,
    ) {
        let mut entry = AuditEntry::new(entry_type, action, user_id, ip_address);
        if let Some(rid) = request_id {
            entry = entry.with_request_id(rid);
        }
        self.log(entry);
    }

    /// Resolves once every entry enqueued before this call has been
    /// written and fsync'd. Fails with [`GatewayError::IoError`] if the
    /// writer thread has already exited.
    pub async fn flush(&self) -> GatewayResult<()> {
        let (responder, receiver) = oneshot::channel();
        self.tx
            .as_ref()
            .expect("pipeline sender taken")
            .send(WriteMsg::Flush(responder))
            .map_err(|_| GatewayError::IoError("audit writer thread has exited".into()))?;
        receiver
            .await
            .map_err(|_| GatewayError::IoError("audit writer dropped flush responder".into()))
    }

    pub fn stats(&self) -> AuditStatsSnapshot {
        let pending = self.tx.as_ref().map(|tx| tx.len() as u64).unwrap_or(0);
        self.stats.snapshot(pending)
    }

    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    /// Deletes segments older than `retention_days`, exempting whatever
    /// happens to be the newest segment (a stand-in for "the active one"
    /// from this read-only vantage point).
    pub fn apply_retention_policy(&self) -> std::io::Result<usize> {
        let active = self.store.list_log_files()?.last().cloned();
        self.store
            .apply_retention_policy(self.retention_days, active.as_deref())
    }
}

impl Drop for AuditPipeline {
    fn drop(&mut self) {
        // Drop the sender first so the writer thread's `recv()` observes a
        // closed channel and exits; only then is it safe to join it.
        self.tx.take();
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use tempfile::tempdir;

    fn cfg(dir: &std::path::Path, max_file_size: u64) -> AuditConfig {
        AuditConfig {
            log_dir: dir.to_path_buf(),
            max_file_size,
            retention_days: 90,
            queue_capacity: 65_536,
            enable_console_output: false,
        }
    }

    #[tokio::test]
    async fn eight_producers_two_thousand_entries_each_all_logged() {
        let dir = tempdir().unwrap();
        let pipeline = Arc::new(AuditPipeline::new(&cfg(dir.path(), 64 * 1024 * 1024)));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pipeline = Arc::clone(&pipeline);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    for i in 0..2000u32 {
                        pipeline.log_fields(
                            AuditType::Access,
                            "view",
                            format!("user{t}"),
                            format!("192.168.{t}.{}", i % 256),
                            None,
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        pipeline.flush().await.unwrap();
        let stats = pipeline.stats();
        assert!(stats.total_logged >= 16_000);
        assert_eq!(stats.total_errors, 0);

        for path in pipeline.store().list_log_files().unwrap() {
            let size = std::fs::metadata(&path).unwrap().len();
            assert!(size <= 64 * 1024 * 1024);
        }
    }

    #[tokio::test]
    async fn small_max_file_size_forces_rotation() {
        let dir = tempdir().unwrap();
        let pipeline = AuditPipeline::new(&cfg(dir.path(), 10 * 1024));

        for i in 0..1000 {
            pipeline.log_fields(
                AuditType::Access,
                "view",
                format!("user{i}"),
                "127.0.0.1",
                None,
            );
            // touch `with_detail` through the full entry path once per loop
            let entry = AuditEntry::new(AuditType::Access, "view", format!("user{i}"), "127.0.0.1")
                .with_detail("extra_data", "Lorem ipsum dolor sit amet");
            pipeline.log(entry);
        }
        pipeline.flush().await.unwrap();

        let stats = pipeline.stats();
        assert!(stats.total_rotations >= 1);
        assert!(pipeline.store().list_log_files().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn query_by_request_id_finds_the_right_entry() {
        let dir = tempdir().unwrap();
        let pipeline = AuditPipeline::new(&cfg(dir.path(), 64 * 1024 * 1024));

        let entry = AuditEntry::new(AuditType::Order, "create_order", "user123", "10.0.0.1")
            .with_request_id("unique-req-id-12345");
        pipeline.log(entry);
        pipeline.flush().await.unwrap();

        let found = pipeline
            .store()
            .get_by_request_id("unique-req-id-12345")
            .unwrap()
            .expect("entry present");
        assert_eq!(found.action, "create_order");
        assert_eq!(found.user_id, "user123");
    }

    #[tokio::test]
    async fn flush_after_writer_gone_reports_io_error() {
        let dir = tempdir().unwrap();
        let mut pipeline = AuditPipeline::new(&cfg(dir.path(), 64 * 1024 * 1024));
        pipeline.tx.take();
        if let Some(handle) = pipeline.writer_handle.take() {
            handle.join().unwrap();
        }
        assert!(pipeline.flush().await.is_err());
    }
}
