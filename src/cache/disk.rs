// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk Cache (`spec.md` §4.H): a directory-bucketed, two-phase-write
//! persistent cache keyed by `(source, key)`, with modtime-based TTL.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::{NuGetError, Result};

/// A directory-backed cache tier. An empty `root` disables `set` entirely,
/// matching the reference behaviour of treating a blank cache directory as
/// "caching off".
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn is_enabled(&self) -> bool {
        !self.root.as_os_str().is_empty()
    }

    fn bucket_dir(&self, source: &str) -> PathBuf {
        self.root.join(bucket_name(source))
    }

    fn entry_path(&self, source: &str, key: &str) -> PathBuf {
        self.bucket_dir(source).join(format!("{}.dat", sanitize_key(key)))
    }

    /// Open the cached file for `(source, key)` if it exists and is younger
    /// than `max_age`. The comparison is a strict `<`: a file aged exactly
    /// `max_age` is treated as expired.
    pub fn get(&self, source: &str, key: &str, max_age: Duration) -> Result<Option<File>> {
        let path = self.entry_path(source, key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(source, key, "cache.disk.miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let modified = file.metadata()?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age < max_age {
            tracing::trace!(source, key, "cache.disk.hit");
            Ok(Some(file))
        } else {
            tracing::trace!(source, key, "cache.disk.miss");
            Ok(None)
        }
    }

    /// Two-phase write: stream `reader` into a uniquely-named temp file,
    /// optionally validate it, then rename into place. A no-op if the cache
    /// is disabled.
    pub fn set<R: Read>(
        &self,
        source: &str,
        key: &str,
        mut reader: R,
        validator: Option<&dyn Fn(&mut File) -> Result<()>>,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let dir = self.bucket_dir(source);
        fs::create_dir_all(&dir)?;
        let final_path = self.entry_path(source, key);
        let temp_path = dir.join(format!(
            "{}-new.{}",
            sanitize_key(key),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));

        {
            let mut temp_file = File::create(&temp_path)?;
            std::io::copy(&mut reader, &mut temp_file)?;

            if let Some(validator) = validator {
                temp_file.seek(SeekFrom::Start(0))?;
                if let Err(e) = validator(&mut temp_file) {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path);
                    return Err(e);
                }
            }
        }

        self.commit(&temp_path, &final_path)
    }

    /// Remove every bucket under `root`. A no-op if the cache is disabled or
    /// `root` does not exist yet.
    pub fn clear(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rename `temp_path` into `final_path`, tolerating a concurrent writer
    /// that has already claimed the destination.
    fn commit(&self, temp_path: &Path, final_path: &Path) -> Result<()> {
        match fs::rename(temp_path, final_path) {
            Ok(()) => Ok(()),
            Err(_) if final_path.exists() => match fs::remove_file(final_path) {
                Ok(()) => fs::rename(temp_path, final_path).map_err(|e| {
                    let _ = fs::remove_file(temp_path);
                    NuGetError::CacheIo(format!("rename after removing stale entry failed: {e}"))
                }),
                Err(_) => {
                    // Another writer holds the destination open; treat their
                    // win as success and drop our own attempt.
                    let _ = fs::remove_file(temp_path);
                    Ok(())
                }
            },
            Err(e) => {
                let _ = fs::remove_file(temp_path);
                Err(NuGetError::CacheIo(format!("rename failed: {e}")))
            }
        }
    }
}

fn bucket_name(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(&digest[..20]);

    let tail_len = source.chars().count().min(32);
    let tail: String = source
        .chars()
        .skip(source.chars().count() - tail_len)
        .collect();

    format!("{hex}${tail}")
}

/// Replace filename-invalid characters with `_` and collapse `__` runs,
/// applying the collapse twice (not to a fixed point) to match the
/// reference implementation.
fn sanitize_key(key: &str) -> String {
    const INVALID: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let mut sanitized: String = key
        .chars()
        .map(|c| if INVALID.contains(&c) || (c as u32) < 0x20 { '_' } else { c })
        .collect();

    for _ in 0..2 {
        sanitized = sanitized.replace("__", "_");
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .set("https://example.test/feed", "pkg/1.0.0", Cursor::new(b"data".to_vec()), None)
            .unwrap();

        let mut file = cache
            .get("https://example.test/feed", "pkg/1.0.0", Duration::from_secs(60))
            .unwrap()
            .expect("expected a cache hit");
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"data");
    }

    #[test]
    fn miss_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        assert!(cache
            .get("https://example.test/feed", "missing", Duration::from_secs(60))
            .unwrap()
            .is_none());
    }

    #[test]
    fn expires_strictly_at_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .set("src", "key", Cursor::new(b"x".to_vec()), None)
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache
            .get("src", "key", Duration::from_millis(5))
            .unwrap()
            .is_none());
    }

    #[test]
    fn set_is_noop_with_empty_root() {
        let cache = DiskCache::new("");
        assert!(!cache.is_enabled());
        cache
            .set("src", "key", Cursor::new(b"x".to_vec()), None)
            .unwrap();
    }

    #[test]
    fn validator_failure_deletes_temp_and_leaves_no_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let validator: &dyn Fn(&mut File) -> Result<()> =
            &|_f| Err(NuGetError::CacheIo("bad content".into()));

        let err = cache
            .set("src", "key", Cursor::new(b"x".to_vec()), Some(validator))
            .unwrap_err();
        assert!(matches!(err, NuGetError::CacheIo(_)));
        assert!(cache.get("src", "key", Duration::from_secs(60)).unwrap().is_none());

        let leftover = fs::read_dir(dir.path().join(bucket_name("src")))
            .map(|it| it.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[test]
    fn sanitizes_invalid_characters_and_collapses_underscores() {
        assert_eq!(sanitize_key("a:b/c*d"), "a_b_c_d");
        assert_eq!(sanitize_key("a____b"), "a_b");
    }

    #[test]
    fn clear_removes_all_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .set("src", "key", Cursor::new(b"x".to_vec()), None)
            .unwrap();
        assert!(cache.get("src", "key", Duration::from_secs(60)).unwrap().is_some());

        cache.clear().unwrap();
        assert!(cache.get("src", "key", Duration::from_secs(60)).unwrap().is_none());

        // Clearing an already-empty (or never-created) root is not an error.
        cache.clear().unwrap();
    }

    #[test]
    fn bucket_name_keeps_last_32_chars_of_source() {
        let source = "https://api.nuget.org/v3-flatcontainer/newtonsoft.json/index.json";
        let name = bucket_name(source);
        let tail = &source[source.len() - 32..];
        assert!(name.ends_with(&format!("${tail}")));
    }
}
