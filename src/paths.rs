// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared archive/installer path normalization and safety checks.
//!
//! Both the archive builder (trusted paths supplied by the caller) and the
//! archive reader (untrusted paths from a `.nupkg` someone handed us) need
//! the same POSIX normalization; the reader additionally must reject
//! anything that could escape the extraction directory.

use crate::error::{NuGetError, Result};

/// Normalize a path to forward slashes and validate it per `spec.md` §4.D:
/// reject `..` segments, leading `/`, and empty/whitespace-only paths.
///
/// Does not resolve `.` segments or collapse duplicate slashes beyond what's
/// needed for the invariants above; callers get back a POSIX path suitable
/// for archive storage or safe extraction.
pub fn normalize_and_validate(path: &str) -> Result<String> {
    let normalized = path.replace('\\', "/");

    if normalized.trim().is_empty() {
        return Err(NuGetError::InvalidPath(path.to_string()));
    }

    if normalized.starts_with('/') {
        return Err(NuGetError::InvalidPath(path.to_string()));
    }

    if normalized.split('/').any(|seg| seg == "..") {
        return Err(NuGetError::InvalidPath(path.to_string()));
    }

    Ok(normalized)
}

/// Case-insensitive key for comparing/deduplicating normalized paths.
pub fn case_insensitive_key(normalized_path: &str) -> String {
    normalized_path.to_lowercase()
}
