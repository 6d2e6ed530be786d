//! On-disk audit segments: `audit_<YYYYMMDD_HHMMSS>_<seq>.ndjson`.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const FILENAME_PREFIX: &str = "audit_";
const FILENAME_SUFFIX: &str = ".ndjson";
const TIMESTAMP_FMT: &str = "%Y%m%d_%H%M%S";

/// A single append-only NDJSON file. Closed segments are read-only; the
/// active segment is owned exclusively by the writer thread.
pub struct LogFileSegment {
    path: PathBuf,
    file: BufWriter<File>,
    size: u64,
    seq: u64,
}

impl LogFileSegment {
    /// Create a brand-new segment file in `log_dir` with the given sequence
    /// number, named from the current wall-clock time.
    pub fn create(log_dir: &Path, seq: u64) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let name = format!(
            "{FILENAME_PREFIX}{}_{seq:06}{FILENAME_SUFFIX}",
            Utc::now().format(TIMESTAMP_FMT)
        );
        let path = log_dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            size: 0,
            seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append a single already-serialized NDJSON line (including `\n`).
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.size += line.len() as u64;
        Ok(())
    }

    /// Flush buffered writes and fsync the underlying file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()
    }
}

/// Parse the creation timestamp encoded in a segment's filename.
/// Returns `None` for files that don't match the expected pattern.
pub fn parse_segment_creation_time(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_name()?.to_str()?;
    let stem = stem.strip_prefix(FILENAME_PREFIX)?;
    let stem = stem.strip_suffix(FILENAME_SUFFIX)?;
    // stem is "YYYYMMDD_HHMMSS_seq"; split off the trailing seq component.
    let (ts_part, _seq_part) = stem.rsplit_once('_')?;
    let naive = NaiveDateTime::parse_from_str(ts_part, TIMESTAMP_FMT).ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// List all `*.ndjson` segment files in `log_dir`, sorted by filename
/// (which sorts chronologically given the fixed-width timestamp + seq).
pub fn list_segments(log_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !log_dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILENAME_PREFIX) && n.ends_with(FILENAME_SUFFIX))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_append_tracks_size() {
        let dir = tempdir().unwrap();
        let mut seg = LogFileSegment::create(dir.path(), 0).unwrap();
        assert_eq!(seg.size(), 0);
        seg.append("{\"a\":1}\n").unwrap();
        assert_eq!(seg.size(), 8);
        seg.sync().unwrap();
        assert!(seg.path().exists());
    }

    #[test]
    fn filename_round_trips_creation_time() {
        let dir = tempdir().unwrap();
        let seg = LogFileSegment::create(dir.path(), 3).unwrap();
        let parsed = parse_segment_creation_time(seg.path()).expect("parses");
        assert!((Utc::now() - parsed).num_seconds().abs() < 5);
    }

    #[test]
    fn list_segments_sorts_chronologically() {
        let dir = tempdir().unwrap();
        let _a = LogFileSegment::create(dir.path(), 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let _b = LogFileSegment::create(dir.path(), 1).unwrap();
        let listed = list_segments(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0] < listed[1]);
    }
}
