//! Read side of the audit log: query, count, lookup by request id, stats.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::entry::{AuditEntry, AuditType};
use super::query::{AuditPage, QueryFilter};
use super::segment::{list_segments, parse_segment_creation_time};

/// Stateless query surface over whatever segments currently live in
/// `log_dir`. Holds no handle to the active segment: reads always go
/// through the filesystem, so they see writes as soon as they're
/// flushed to the page cache.
pub struct AuditStore {
    log_dir: PathBuf,
}

impl AuditStore {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    pub fn list_log_files(&self) -> std::io::Result<Vec<PathBuf>> {
        list_segments(&self.log_dir)
    }

    /// Scans every segment in parallel, then applies filter/offset/limit
    /// against the merged, chronologically-ordered result. Rotation mid-scan
    /// is safe: `list_segments` is snapshotted once up front, so a segment
    /// that rotates after being listed is read to whatever it contained at
    /// open time, and a brand-new segment created afterward is simply not in
    /// this snapshot — entries are never double-counted.
    pub fn query(&self, filter: &QueryFilter) -> std::io::Result<AuditPage> {
        let mut segments = self.list_log_files()?;
        if filter.reverse {
            segments.reverse();
        }

        let mut matched: Vec<AuditEntry> = segments
            .par_iter()
            .map(|path| scan_segment(path, filter))
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        if !filter.reverse {
            matched.sort_by_key(|e| e.timestamp);
        } else {
            matched.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        }

        let total_count = matched.len();
        let page: Vec<AuditEntry> = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();
        let has_more = filter.offset + page.len() < total_count;

        Ok(AuditPage {
            entries: page,
            total_count,
            has_more,
        })
    }

    pub fn count(&self, filter: &QueryFilter) -> std::io::Result<usize> {
        let segments = self.list_log_files()?;
        let total = segments
            .par_iter()
            .map(|path| scan_segment(path, filter).map(|v| v.len()))
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .sum();
        Ok(total)
    }

    /// Short-circuiting lookup; does not scan segments beyond the match.
    pub fn get_by_request_id(&self, request_id: &str) -> std::io::Result<Option<AuditEntry>> {
        let segments = self.list_log_files()?;
        for path in segments.iter().rev() {
            let file = File::open(path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if let Some(entry) = AuditEntry::from_ndjson_line(&line) {
                    if entry.request_id.as_deref() == Some(request_id) {
                        return Ok(Some(entry));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Deletes segments whose filename-encoded creation time is older than
    /// `now - retention_days`. `active_segment` (if any) is always exempt.
    pub fn apply_retention_policy(
        &self,
        retention_days: u32,
        active_segment: Option<&Path>,
    ) -> std::io::Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let mut deleted = 0;
        for path in self.list_log_files()? {
            if Some(path.as_path()) == active_segment {
                continue;
            }
            if let Some(created) = parse_segment_creation_time(&path) {
                if created < cutoff {
                    // Idempotent: a concurrent retention sweep may have
                    // already removed this file.
                    if std::fs::remove_file(&path).is_ok() {
                        deleted += 1;
                    }
                }
            }
        }
        Ok(deleted)
    }

    /// Aggregate counts over `range`, scanned the same way as [`Self::query`]
    /// (parallel per-segment scan, no ordering or pagination applied since
    /// only totals are returned).
    pub fn get_stats(&self, range: &StatsRange) -> std::io::Result<AuditAggregateCounts> {
        let filter = QueryFilter {
            since: range.since,
            until: range.until,
            limit: usize::MAX,
            ..QueryFilter::default()
        };
        let segments = self.list_log_files()?;
        let counts: Vec<AuditAggregateCounts> = segments
            .par_iter()
            .map(|path| {
                let entries = scan_segment(path, &filter)?;
                let mut counts = AuditAggregateCounts::default();
                for entry in &entries {
                    counts.add(entry.entry_type);
                }
                Ok(counts)
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(counts.into_iter().fold(AuditAggregateCounts::default(), |mut acc, c| {
            acc.merge(&c);
            acc
        }))
    }
}

fn scan_segment(path: &Path, filter: &QueryFilter) -> std::io::Result<Vec<AuditEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        // A truncated last line (mid-write crash or in-flight rotation) is
        // not valid JSON; treat it as EOF rather than a query error.
        match AuditEntry::from_ndjson_line(&line) {
            Some(entry) if filter.matches(&entry) => out.push(entry),
            Some(_) => {}
            None => break,
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct StatsRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Per-type and total entry counts returned by [`AuditStore::get_stats`].
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AuditAggregateCounts {
    pub total: usize,
    pub auth: usize,
    pub order: usize,
    pub apikey: usize,
    pub error: usize,
    pub access: usize,
}

impl AuditAggregateCounts {
    fn add(&mut self, entry_type: AuditType) {
        self.total += 1;
        match entry_type {
            AuditType::Auth => self.auth += 1,
            AuditType::Order => self.order += 1,
            AuditType::ApiKey => self.apikey += 1,
            AuditType::Error => self.error += 1,
            AuditType::Access => self.access += 1,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.auth += other.auth;
        self.order += other.order;
        self.apikey += other.apikey;
        self.error += other.error;
        self.access += other.access;
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use crate::audit::entry::AuditEntry;
    use std::io::Write;

    fn write_segment(dir: &Path, name: &str, entries: &[AuditEntry]) {
        let mut file = File::create(dir.join(name)).unwrap();
        for entry in entries {
            file.write_all(entry.to_ndjson_line().as_bytes()).unwrap();
        }
    }

    #[test]
    fn get_stats_aggregates_counts_per_type_across_segments() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(
            dir.path(),
            "audit_20240101_000000_000000.ndjson",
            &[
                AuditEntry::new(AuditType::Auth, "login", "u1", "127.0.0.1"),
                AuditEntry::new(AuditType::Order, "create_order", "u1", "127.0.0.1"),
            ],
        );
        write_segment(
            dir.path(),
            "audit_20240102_000000_000001.ndjson",
            &[
                AuditEntry::new(AuditType::Order, "cancel_order", "u1", "127.0.0.1"),
                AuditEntry::new(AuditType::Error, "bad_request", "u1", "127.0.0.1"),
            ],
        );

        let store = AuditStore::new(dir.path().to_path_buf());
        let stats = store.get_stats(&StatsRange::default()).unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.auth, 1);
        assert_eq!(stats.order, 2);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.apikey, 0);
        assert_eq!(stats.access, 0);
    }
}
