//! Storage area layout
//!
//! ## Responsibilities
//!
//! - Fixed directory layout under the base path: staging, active, archive, logs
//! - Timestamp-keyed image filenames (ordering + no collisions at sub-second rates)
//! - Resilient directory scans that tolerate files vanishing mid-scan
//!
//! Areas are disjoint with a strict one-way lifecycle:
//! staging -> active -> archive -> deleted. Movement between areas is always
//! an atomic rename, never copy-then-delete.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Image filename prefix, e.g. `img_20260830_141502_417_0007.jpg`
const IMAGE_PREFIX: &str = "img_";
const IMAGE_SUFFIX: &str = ".jpg";

/// Fixed directory layout under the installation base path
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub staging: PathBuf,
    pub active: PathBuf,
    pub archive: PathBuf,
    pub logs: PathBuf,
}

/// A scanned image file with its authoritative capture time
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl StorageLayout {
    /// Layout relative to the base directory:
    /// `images/staging`, `images/active`, `images/archive`, `logs`
    pub fn new(base: &Path) -> Self {
        let images = base.join("images");
        Self {
            staging: images.join("staging"),
            active: images.join("active"),
            archive: images.join("archive"),
            logs: base.join("logs"),
        }
    }

    /// Create all managed directories if they don't exist
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.staging, &self.active, &self.archive, &self.logs] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Filename embedding the capture timestamp and a per-process sequence
    /// number. Lexicographic order matches capture order; the sequence number
    /// keeps names unique even at sub-second capture rates.
    pub fn image_filename(captured_at: DateTime<Utc>, seq: u64) -> String {
        format!(
            "{}{}_{:04}{}",
            IMAGE_PREFIX,
            captured_at.format("%Y%m%d_%H%M%S_%3f"),
            seq % 10_000,
            IMAGE_SUFFIX
        )
    }

    /// Recover the capture timestamp embedded in an image filename.
    ///
    /// Returns None for filenames not produced by this daemon. Age math
    /// prefers this over mtime so it stays correct across clock adjustments
    /// and file copies.
    pub fn capture_time_from_name(name: &str) -> Option<DateTime<Utc>> {
        let stem = name
            .strip_prefix(IMAGE_PREFIX)?
            .strip_suffix(IMAGE_SUFFIX)?;
        // <date>_<time>_<millis>_<seq>
        let mut parts = stem.splitn(4, '_');
        let date = parts.next()?;
        let time = parts.next()?;
        let millis = parts.next()?;
        let _seq = parts.next()?;

        let naive = NaiveDateTime::parse_from_str(
            &format!("{}_{}.{}", date, time, millis),
            "%Y%m%d_%H%M%S%.3f",
        )
        .ok()?;
        Some(Utc.from_utc_datetime(&naive))
    }

    /// Date embedded in a rolled log filename (`<prefix>.YYYY-MM-DD`)
    pub fn log_date_from_name(name: &str) -> Option<NaiveDate> {
        let (_, date) = name.rsplit_once('.')?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    /// List image files in an area with their capture times, oldest first.
    ///
    /// Entries that vanish between the directory listing and the metadata
    /// read are skipped; a concurrent administrative cleanup must never fail
    /// the whole pass. Files without an embedded timestamp fall back to
    /// mtime.
    pub async fn scan_images(dir: &Path) -> std::io::Result<Vec<ImageEntry>> {
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            let captured_at = match Self::capture_time_from_name(&name) {
                Some(ts) => ts,
                None => match entry.metadata().await {
                    Ok(meta) if meta.is_file() => match meta.modified() {
                        Ok(mtime) => DateTime::<Utc>::from(mtime),
                        Err(_) => continue,
                    },
                    // Vanished mid-scan or not a file
                    _ => continue,
                },
            };

            entries.push(ImageEntry { path, captured_at });
        }

        entries.sort_by_key(|e| e.captured_at);
        Ok(entries)
    }

    /// Count regular files in a directory, tolerating a missing directory
    pub async fn count_files(dir: &Path) -> std::io::Result<usize> {
        let mut count = 0;
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_round_trips_capture_time() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 30, 14, 15, 2).unwrap()
            + chrono::Duration::milliseconds(417);
        let name = StorageLayout::image_filename(ts, 7);
        assert_eq!(name, "img_20260830_141502_417_0007.jpg");
        assert_eq!(StorageLayout::capture_time_from_name(&name), Some(ts));
    }

    #[test]
    fn filenames_order_and_never_collide_at_subsecond_rates() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 30, 14, 15, 2).unwrap();
        let names: Vec<String> = (0..5)
            .map(|seq| StorageLayout::image_filename(ts, seq))
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, names);
    }

    #[test]
    fn foreign_filenames_yield_no_capture_time() {
        assert!(StorageLayout::capture_time_from_name("latest.jpg").is_none());
        assert!(StorageLayout::capture_time_from_name("img_garbage.jpg").is_none());
        assert!(StorageLayout::capture_time_from_name("img_20260830.jpg").is_none());
    }

    #[test]
    fn log_date_parses_rolled_filenames() {
        assert_eq!(
            StorageLayout::log_date_from_name("picamd.log.2026-08-29"),
            NaiveDate::from_ymd_opt(2026, 8, 29)
        );
        assert!(StorageLayout::log_date_from_name("picamd.log").is_none());
    }

    #[tokio::test]
    async fn scan_sorts_oldest_first_and_ignores_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        for (ts, seq) in [(newer, 1), (older, 0)] {
            let path = dir.path().join(StorageLayout::image_filename(ts, seq));
            tokio::fs::write(&path, b"jpeg").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("subdir")).await.unwrap();

        let entries = StorageLayout::scan_images(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].captured_at, older);
        assert_eq!(entries[1].captured_at, newer);
    }

    #[tokio::test]
    async fn scan_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let entries = StorageLayout::scan_images(&missing).await.unwrap();
        assert!(entries.is_empty());
    }
}
