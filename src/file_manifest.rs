// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A storage-agnostic collection of files destined for a `.nupkg` archive.
//!
//! Generalizes the teacher's `tugger_file_manifest::{FileData, FileEntry,
//! FileManifest}` trio: the same "path or in-memory bytes" abstraction, with
//! a third content source (a one-shot byte stream) added per `spec.md` §3's
//! `PackageFile` definition.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::paths::{case_insensitive_key, normalize_and_validate};

/// The content source backing a [`PackageFile`].
pub enum PackageFileData {
    /// Content lives on the filesystem at this path.
    Path(PathBuf),
    /// Content is already in memory.
    Memory(Vec<u8>),
    /// Content is produced by a one-shot reader; consumed at most once.
    Stream(RefCell<Option<Box<dyn Read + Send>>>),
}

impl fmt::Debug for PackageFileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Memory(data) => f.debug_tuple("Memory").field(&data.len()).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").field(&"<one-shot>").finish(),
        }
    }
}

impl PackageFileData {
    /// Resolve the full content of this data source.
    ///
    /// For [`Self::Stream`], this may only succeed once: the underlying
    /// reader is consumed and a second call returns an empty buffer.
    pub fn resolve(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(p) => Ok(std::fs::read(p)?),
            Self::Memory(data) => Ok(data.clone()),
            Self::Stream(cell) => {
                let mut guard = cell.borrow_mut();
                match guard.take() {
                    Some(mut reader) => {
                        let mut buf = Vec::new();
                        reader.read_to_end(&mut buf)?;
                        Ok(buf)
                    }
                    None => Ok(Vec::new()),
                }
            }
        }
    }
}

impl From<PathBuf> for PackageFileData {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for PackageFileData {
    fn from(data: Vec<u8>) -> Self {
        Self::Memory(data)
    }
}

impl From<Box<dyn Read + Send>> for PackageFileData {
    fn from(reader: Box<dyn Read + Send>) -> Self {
        Self::Stream(RefCell::new(Some(reader)))
    }
}

/// A single file destined for a `.nupkg` archive: a normalized POSIX target
/// path plus its content source.
#[derive(Debug)]
pub struct PackageFile {
    /// POSIX-normalized target path within the archive (never absolute,
    /// never containing `..`, never empty).
    pub target: String,
    pub data: PackageFileData,
}

impl PackageFile {
    pub fn resolve_content(&self) -> Result<Vec<u8>> {
        self.data.resolve()
    }
}

/// An ordered, case-insensitively-deduplicated collection of [`PackageFile`].
///
/// Iteration order is insertion order (`spec.md` §4.E requires payload files
/// be written "in insertion order").
#[derive(Default)]
pub struct PackageFileManifest {
    order: Vec<String>,
    files: BTreeMap<String, PackageFile>,
}

impl PackageFileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Add a file. `target` is normalized and validated; a duplicate target
    /// (case-insensitive, after normalization) is rejected.
    pub fn add(&mut self, target: impl AsRef<str>, data: impl Into<PackageFileData>) -> Result<()> {
        let normalized = normalize_and_validate(target.as_ref())?;
        let key = case_insensitive_key(&normalized);

        if self.files.contains_key(&key) {
            return Err(crate::error::NuGetError::ValidationFailed(format!(
                "duplicate target path: {}",
                normalized
            )));
        }

        self.order.push(key.clone());
        self.files.insert(
            key,
            PackageFile {
                target: normalized,
                data: data.into(),
            },
        );

        Ok(())
    }

    /// Add a file sourced from disk, stripping `strip_prefix` from its path
    /// to compute the archive target.
    pub fn add_path(&mut self, path: impl AsRef<Path>, strip_prefix: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let target = path
            .strip_prefix(strip_prefix.as_ref())
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        self.add(target, PackageFileData::Path(path.to_path_buf()))
    }

    pub fn get(&self, target: &str) -> Option<&PackageFile> {
        let key = case_insensitive_key(&normalize_and_validate(target).ok()?);
        self.files.get(&key)
    }

    /// Iterate files in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageFile> {
        self.order.iter().filter_map(move |k| self.files.get(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_case_insensitive_targets() {
        let mut m = PackageFileManifest::new();
        m.add("lib/net6.0/Test.dll", vec![1u8]).unwrap();
        let err = m.add("lib/NET6.0/test.dll", vec![2u8]).unwrap_err();
        assert!(matches!(err, crate::error::NuGetError::ValidationFailed(_)));
    }

    #[test]
    fn preserves_insertion_order() {
        let mut m = PackageFileManifest::new();
        m.add("b.txt", vec![1u8]).unwrap();
        m.add("a.txt", vec![2u8]).unwrap();
        let targets: Vec<_> = m.iter().map(|f| f.target.clone()).collect();
        assert_eq!(targets, vec!["b.txt".to_string(), "a.txt".to_string()]);
    }

    #[test]
    fn stream_is_consumed_once() {
        let mut m = PackageFileManifest::new();
        let reader: Box<dyn Read + Send> = Box::new(std::io::Cursor::new(vec![9u8, 9, 9]));
        m.add("s.bin", reader).unwrap();
        let entry = m.get("s.bin").unwrap();
        assert_eq!(entry.resolve_content().unwrap(), vec![9, 9, 9]);
        assert_eq!(entry.resolve_content().unwrap(), Vec::<u8>::new());
    }
}
