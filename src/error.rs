// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling.

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum NuGetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("xml writer error: {0}")]
    XmlWriter(#[from] quick_xml::Error),

    #[error("hex parsing error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry path is invalid: {0}")]
    InvalidPath(String),

    #[error("no .nuspec found at archive root")]
    NuspecNotFound,

    #[error("multiple .nuspec files found at archive root: {0:?}")]
    MultipleNuspecs(Vec<String>),

    #[error("file not found in archive: {0}")]
    FileNotFound(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid package id: {0}")]
    InvalidPackageId(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    #[error("cancelled while waiting for lock on {0}")]
    LockCancelled(String),

    #[error("runtime package missing for satellite install: {0}")]
    RuntimePackageMissing(String),

    #[error("cache I/O error: {0}")]
    CacheIo(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, NuGetError>;
