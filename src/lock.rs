// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-Process File Lock (`spec.md` §4.F).
//!
//! An exclusive advisory lock keyed on a target path, backed by
//! [`fs2::FileExt`] the same way the teacher's
//! [`DistributionExtractLock`] wraps `lock_exclusive`/`unlock` in a
//! scope-guard — generalised here with retry, timeout, and cancellation,
//! and genuinely different release semantics per platform (`spec.md`
//! design note: do not emulate `DeleteOnClose` on POSIX).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{NuGetError, Result};

const RETRY_INTERVAL: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(120);

/// Caller-supplied cancellation signal, checked between retry attempts.
pub trait CancellationToken {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels, for callers with no cancellation source.
pub struct NeverCancelled;

impl CancellationToken for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Held for the duration of an exclusive lock on `{target}.lock`. Release
/// happens on `Drop`, matching every exit path including panics/unwinds.
pub struct LockGuard {
    file: File,
    lock_path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release(&self.file, &self.lock_path);
    }
}

#[cfg(unix)]
fn release(file: &File, lock_path: &Path) {
    // POSIX: the lock file is deliberately left in place. Deleting it here
    // would let a second process create-and-lock a fresh inode while a
    // third still holds the old one, reintroducing the exact race this
    // design note forbids.
    let _ = FileExt::unlock(file);
    tracing::debug!(lock_path = ?lock_path, "lock.release");
}

#[cfg(windows)]
fn release(file: &File, lock_path: &Path) {
    let _ = FileExt::unlock(file);
    drop(file);
    let _ = std::fs::remove_file(lock_path);
    tracing::debug!(lock_path = ?lock_path, "lock.release");
}

#[cfg(not(any(unix, windows)))]
fn release(file: &File, lock_path: &Path) {
    let _ = FileExt::unlock(file);
    tracing::debug!(lock_path = ?lock_path, "lock.release");
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

/// Acquire the exclusive lock on `target`, retrying every 100ms until it
/// succeeds, the 2-minute budget expires (`LockTimeout`), or `cancel`
/// reports cancellation (`LockCancelled`).
pub fn acquire(target: &Path, cancel: &dyn CancellationToken) -> Result<LockGuard> {
    let _span = tracing::info_span!("lock.acquire", path = %target.display()).entered();
    let lock_path = lock_path_for(target);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(&lock_path)?;
    let deadline = Instant::now() + MAX_WAIT;

    loop {
        if cancel.is_cancelled() {
            return Err(NuGetError::LockCancelled(target.display().to_string()));
        }

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                tracing::debug!("lock.acquire succeeded");
                return Ok(LockGuard { file, lock_path });
            }
            Err(_) => {
                if Instant::now() >= deadline {
                    return Err(NuGetError::LockTimeout(target.display().to_string()));
                }
                std::thread::sleep(RETRY_INTERVAL);
            }
        }
    }
}

/// Convenience form: acquire the lock, run `body`, and release on every
/// exit path (including `body` returning an error).
pub fn with_lock<T>(
    target: &Path,
    cancel: &dyn CancellationToken,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let _guard = acquire(target, cancel)?;
    body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("package.nupkg");
        {
            let _guard = acquire(&target, &NeverCancelled).unwrap();
        }
        // Lock released on drop; a second acquisition must succeed promptly.
        let _guard = acquire(&target, &NeverCancelled).unwrap();
    }

    #[test]
    fn with_lock_runs_body_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("package.nupkg");
        let result = with_lock(&target, &NeverCancelled, || Ok(42)).unwrap();
        assert_eq!(result, 42);
        let _guard = acquire(&target, &NeverCancelled).unwrap();
    }

    struct AlwaysCancelled;
    impl CancellationToken for AlwaysCancelled {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn cancellation_is_observed_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("package.nupkg");
        let err = acquire(&target, &AlwaysCancelled).unwrap_err();
        assert!(matches!(err, NuGetError::LockCancelled(_)));
    }
}
