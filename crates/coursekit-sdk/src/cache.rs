// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local enrollment verdict cache.
//!
//! The cache is the fast path of enrollment resolution and the thing that
//! keeps students watching when the network is flaky. Writes are monotonic
//! for `enrolled = true`: once a course is cached as enrolled, the store
//! refuses to overwrite that verdict with `false`. Un-enrolling happens by
//! entry expiry and an authoritative `false` resolution, never by a cache
//! downgrade racing a slow confirmation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::types::EnrollmentCacheEntry;

/// Local storage for enrollment verdicts.
///
/// Implementations are synchronous; they back onto memory or local disk,
/// never the network.
pub trait CacheStore: Send + Sync {
    /// Read the cached verdict for a course.
    fn get(&self, course_id: &str) -> Option<EnrollmentCacheEntry>;

    /// Write a verdict. A cached `true` is never downgraded to `false`;
    /// such writes only refresh the timestamp.
    fn set(&self, course_id: &str, enrolled: bool, now: DateTime<Utc>);

    /// Refresh the timestamp of an existing entry without changing the
    /// verdict. No-op when the course has no entry.
    fn touch(&self, course_id: &str, now: DateTime<Utc>);
}

fn apply_set(
    entries: &mut HashMap<String, EnrollmentCacheEntry>,
    course_id: &str,
    enrolled: bool,
    now: DateTime<Utc>,
) {
    if let Some(existing) = entries.get_mut(course_id) {
        if existing.enrolled && !enrolled {
            // Monotonic: refresh the timestamp, keep the positive verdict.
            debug!(course_id, "ignoring enrollment cache downgrade");
            existing.written_at = now;
            return;
        }
        existing.enrolled = enrolled;
        existing.written_at = now;
        return;
    }
    entries.insert(
        course_id.to_string(),
        EnrollmentCacheEntry {
            course_id: course_id.to_string(),
            enrolled,
            written_at: now,
        },
    );
}

/// In-memory cache store. Verdicts live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, EnrollmentCacheEntry>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, course_id: &str) -> Option<EnrollmentCacheEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(course_id).cloned())
    }

    fn set(&self, course_id: &str, enrolled: bool, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            apply_set(&mut entries, course_id, enrolled, now);
        }
    }

    fn touch(&self, course_id: &str, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock()
            && let Some(entry) = entries.get_mut(course_id)
        {
            entry.written_at = now;
        }
    }
}

/// File-backed cache store.
///
/// The on-disk format is a flat JSON object with one pair of keys per
/// course, matching what client devices already carry around:
///
/// ```json
/// {
///   "enrollment_rust-101": true,
///   "enrollment_rust-101_timestamp": "2025-06-01T10:00:00Z"
/// }
/// ```
///
/// IO failures are absorbed with a warning. A cache that fails to persist
/// degrades resolution to the network path, it never fails it.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, EnrollmentCacheEntry>>,
}

impl FileCacheStore {
    /// Open (or create) a cache file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = Self::load(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &Path) -> HashMap<String, EnrollmentCacheEntry> {
        let mut entries = HashMap::new();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return entries,
        };
        let map: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable enrollment cache file");
                return entries;
            }
        };

        for (key, value) in &map {
            let Some(course_id) = key.strip_prefix("enrollment_") else {
                continue;
            };
            if course_id.ends_with("_timestamp") {
                continue;
            }
            let Some(enrolled) = value.as_bool() else {
                continue;
            };
            let written_at = map
                .get(&format!("{}_timestamp", key))
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                // An entry with no parseable timestamp is treated as ancient.
                .unwrap_or(DateTime::UNIX_EPOCH);

            entries.insert(
                course_id.to_string(),
                EnrollmentCacheEntry {
                    course_id: course_id.to_string(),
                    enrolled,
                    written_at,
                },
            );
        }
        entries
    }

    fn persist(&self, entries: &HashMap<String, EnrollmentCacheEntry>) {
        let mut map = serde_json::Map::new();
        for entry in entries.values() {
            map.insert(
                format!("enrollment_{}", entry.course_id),
                serde_json::Value::Bool(entry.enrolled),
            );
            map.insert(
                format!("enrollment_{}_timestamp", entry.course_id),
                serde_json::Value::String(entry.written_at.to_rfc3339()),
            );
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %self.path.display(), error = %e, "failed to create enrollment cache directory");
            return;
        }
        // Write-then-rename so a crash mid-write cannot leave a half-written
        // file that the next load would discard wholesale.
        let json = serde_json::Value::Object(map).to_string();
        let staging = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&staging, json) {
            warn!(path = %staging.display(), error = %e, "failed to persist enrollment cache");
            return;
        }
        if let Err(e) = std::fs::rename(&staging, &self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to persist enrollment cache");
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, course_id: &str) -> Option<EnrollmentCacheEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(course_id).cloned())
    }

    fn set(&self, course_id: &str, enrolled: bool, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            apply_set(&mut entries, course_id, enrolled, now);
            self.persist(&entries);
        }
    }

    fn touch(&self, course_id: &str, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(course_id) {
                entry.written_at = now;
            } else {
                return;
            }
            self.persist(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_touch() {
        let store = MemoryCacheStore::new();
        assert!(store.get("rust-101").is_none());

        let t0 = Utc::now();
        store.set("rust-101", true, t0);
        let entry = store.get("rust-101").unwrap();
        assert!(entry.enrolled);
        assert_eq!(entry.written_at, t0);

        let t1 = t0 + chrono::Duration::seconds(30);
        store.touch("rust-101", t1);
        assert_eq!(store.get("rust-101").unwrap().written_at, t1);

        // Touching an unknown course is a no-op.
        store.touch("ghost", t1);
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn test_positive_verdict_is_never_downgraded() {
        let store = MemoryCacheStore::new();
        let t0 = Utc::now();
        store.set("rust-101", true, t0);

        let t1 = t0 + chrono::Duration::seconds(10);
        store.set("rust-101", false, t1);

        let entry = store.get("rust-101").unwrap();
        assert!(entry.enrolled, "true verdict must survive a downgrade write");
        assert_eq!(entry.written_at, t1, "downgrade still refreshes the timestamp");
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("enrollments.json");

        let t0 = Utc::now();
        {
            let store = FileCacheStore::open(&path);
            store.set("rust-101", true, t0);
        }

        let reopened = FileCacheStore::open(&path);
        let entry = reopened.get("rust-101").unwrap();
        assert!(entry.enrolled);
        // RFC 3339 round trip keeps the instant.
        assert_eq!(entry.written_at.timestamp(), t0.timestamp());
    }

    #[test]
    fn test_file_store_key_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollments.json");

        let store = FileCacheStore::open(&path);
        store.set("rust-101", true, Utc::now());

        let raw = std::fs::read_to_string(&path).unwrap();
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).unwrap();
        assert_eq!(map.get("enrollment_rust-101"), Some(&serde_json::Value::Bool(true)));
        assert!(map.contains_key("enrollment_rust-101_timestamp"));
    }

    #[test]
    fn test_persist_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollments.json");

        let store = FileCacheStore::open(&path);
        store.set("rust-101", true, Utc::now());

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        // A leftover staging file from an interrupted write is replaced by
        // the next persist and never read.
        std::fs::write(path.with_extension("tmp"), "{half-writ").unwrap();
        store.set("go-201", true, Utc::now());
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileCacheStore::open(&path);
        assert!(reopened.get("rust-101").unwrap().enrolled);
        assert!(reopened.get("go-201").unwrap().enrolled);
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollments.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileCacheStore::open(&path);
        assert!(store.get("rust-101").is_none());
    }

    #[test]
    fn test_missing_timestamp_reads_as_ancient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollments.json");
        std::fs::write(&path, r#"{"enrollment_rust-101": true}"#).unwrap();

        let store = FileCacheStore::open(&path);
        let entry = store.get("rust-101").unwrap();
        assert!(entry.enrolled);
        assert!(!entry.is_fresh(Utc::now(), std::time::Duration::from_secs(300)));
    }
}
