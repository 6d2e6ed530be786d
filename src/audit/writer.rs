//! The single dedicated writer thread that drains the ingest queue to disk.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::{Receiver, RecvError};
use tracing::{error, warn};

use super::entry::AuditEntry;
use super::segment::LogFileSegment;
use super::stats::AuditStats;

pub(super) enum WriteMsg {
    Entry(AuditEntry),
    Flush(tokio::sync::oneshot::Sender<()>),
}

pub(super) struct WriterConfig {
    pub log_dir: PathBuf,
    pub max_file_size: u64,
}

/// Runs on its own OS thread for the lifetime of the pipeline. I/O errors
/// never propagate to producers: they're counted in `stats` and logged to
/// the tracing diagnostic channel instead.
pub(super) fn run(rx: Receiver<WriteMsg>, cfg: WriterConfig, stats: Arc<AuditStats>) {
    let mut next_seq: u64 = 0;
    let mut segment = open_segment(&cfg.log_dir, next_seq, &stats);
    if segment.is_some() {
        next_seq += 1;
    }

    loop {
        match rx.recv() {
            Ok(WriteMsg::Entry(entry)) => {
                let line = entry.to_ndjson_line();
                write_entry(&cfg, &mut segment, &mut next_seq, &line, &stats);
            }
            Ok(WriteMsg::Flush(responder)) => {
                if let Some(seg) = segment.as_mut() {
                    if let Err(e) = seg.sync() {
                        error!(error = %e, "audit flush: fsync failed");
                        stats.total_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
                let _ = responder.send(());
            }
            Err(RecvError) => {
                // Sender side dropped: pipeline is shutting down.
                break;
            }
        }
    }
}

fn write_entry(
    cfg: &WriterConfig,
    segment: &mut Option<LogFileSegment>,
    next_seq: &mut u64,
    line: &str,
    stats: &Arc<AuditStats>,
) {
    let needs_rotation = segment
        .as_ref()
        .is_some_and(|s| s.size() + line.len() as u64 > cfg.max_file_size);

    if needs_rotation {
        if let Some(mut old) = segment.take() {
            if let Err(e) = old.sync() {
                error!(error = %e, path = %old.path().display(), "audit rotation: fsync failed");
                stats.total_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        *segment = open_segment(&cfg.log_dir, *next_seq, stats);
        if segment.is_some() {
            *next_seq += 1;
            stats.total_rotations.fetch_add(1, Ordering::Relaxed);
        }
    }

    match segment.as_mut() {
        Some(seg) => match seg.append(line) {
            Ok(()) => {
                stats.total_flushed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(error = %e, "audit write failed");
                stats.total_errors.fetch_add(1, Ordering::Relaxed);
                // The handle may be poisoned (e.g. disk full); drop it so
                // the next entry retries opening a fresh segment.
                *segment = None;
            }
        },
        None => {
            // Active segment unavailable; try to reopen before giving up.
            *segment = open_segment(&cfg.log_dir, *next_seq, stats);
            match segment.as_mut() {
                Some(seg) => {
                    *next_seq += 1;
                    if let Err(e) = seg.append(line) {
                        error!(error = %e, "audit write failed after reopen");
                        stats.total_errors.fetch_add(1, Ordering::Relaxed);
                        *segment = None;
                    } else {
                        stats.total_flushed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => {
                    stats.total_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

fn open_segment(log_dir: &PathBuf, seq: u64, stats: &Arc<AuditStats>) -> Option<LogFileSegment> {
    match LogFileSegment::create(log_dir, seq) {
        Ok(seg) => Some(seg),
        Err(e) => {
            warn!(error = %e, dir = %log_dir.display(), "audit: failed to open segment");
            stats.total_errors.fetch_add(1, Ordering::Relaxed);
            None
        }
    }
}
