// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Archive Reader (`spec.md` §4.D): an open, read-only view over a `.nupkg`.

use std::io::{Read, Seek};
use std::path::Path;

use crate::archive::FolderKind;
use crate::error::{NuGetError, Result};
use crate::paths::{case_insensitive_key, normalize_and_validate};

const SIGNATURE_ENTRY: &str = ".signature.p7s";

/// A ZIP view over a `.nupkg`. Owned by one thread/task for its lifetime
/// (`spec.md` §5) — there is no interior mutability here beyond what
/// `zip::ZipArchive` itself needs to seek and decompress.
pub struct PackageArchive<R> {
    inner: zip::ZipArchive<R>,
    /// Original (un-normalised) entry names, in central-directory order.
    names: Vec<String>,
}

impl<R: Read + Seek> PackageArchive<R> {
    pub fn open(reader: R) -> Result<Self> {
        let _span = tracing::info_span!("archive.open").entered();
        let inner = zip::ZipArchive::new(reader)?;
        let names: Vec<String> = inner.file_names().map(str::to_string).collect();
        tracing::debug!(entries = names.len(), "archive.open");
        Ok(Self { inner, names })
    }

    /// All entry names, in their original archive casing and order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True iff an entry exists with exact (case-insensitive) name
    /// `.signature.p7s`.
    pub fn is_signed(&self) -> bool {
        self.names
            .iter()
            .any(|n| case_insensitive_key(&n.replace('\\', "/")) == SIGNATURE_ENTRY)
    }

    /// The unique root-level `*.nuspec` entry name.
    pub fn nuspec_entry(&self) -> Result<String> {
        let candidates: Vec<&String> = self
            .names
            .iter()
            .filter(|n| {
                let normalized = n.replace('\\', "/");
                !normalized.contains('/') && normalized.to_lowercase().ends_with(".nuspec")
            })
            .collect();

        match candidates.len() {
            0 => Err(NuGetError::NuspecNotFound),
            1 => Ok(candidates[0].clone()),
            _ => Err(NuGetError::MultipleNuspecs(
                candidates.into_iter().cloned().collect(),
            )),
        }
    }

    fn resolve_name(&self, path: &str) -> Result<String> {
        let normalized = normalize_and_validate(path)?;
        let key = case_insensitive_key(&normalized);
        self.names
            .iter()
            .find(|n| case_insensitive_key(&n.replace('\\', "/")) == key)
            .cloned()
            .ok_or_else(|| NuGetError::FileNotFound(path.to_string()))
    }

    /// Read the full content of the entry at `path` (case-insensitive).
    pub fn get(&mut self, path: &str) -> Result<Vec<u8>> {
        let name = self.resolve_name(path)?;
        let mut file = self.inner.by_name(&name)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// All entry names whose normalised path starts with `prefix`
    /// (case-insensitive).
    pub fn files_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix_key = case_insensitive_key(&prefix.replace('\\', "/"));
        self.names
            .iter()
            .filter(|n| case_insensitive_key(&n.replace('\\', "/")).starts_with(&prefix_key))
            .cloned()
            .collect()
    }

    /// All entry names under one of the nine payload folders.
    pub fn files_by_folder(&self, folder: FolderKind) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| folder.matches(n))
            .cloned()
            .collect()
    }

    /// Write the entry at `path` to `dst` on disk, creating parent
    /// directories as needed. Rejects unsafe paths before any write
    /// (`spec.md` §8 property 2).
    pub fn extract(&mut self, path: &str, dst: &Path) -> Result<()> {
        let content = self.get(path)?;
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dst, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write as _;

    fn build_fixture() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        zip.start_file("Test.Package.nuspec", options).unwrap();
        zip.write_all(b"<package/>").unwrap();
        zip.start_file("lib/net6.0/Test.dll", options).unwrap();
        zip.write_all(b"binary").unwrap();
        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(b"<Relationships/>").unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn finds_the_unique_root_nuspec() {
        let bytes = build_fixture();
        let archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.nuspec_entry().unwrap(), "Test.Package.nuspec");
    }

    #[test]
    fn rejects_zero_or_multiple_nuspecs() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("_rels/.rels", zip::write::FileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            archive.nuspec_entry().unwrap_err(),
            NuGetError::NuspecNotFound
        ));

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("A.nuspec", zip::write::FileOptions::default())
            .unwrap();
        zip.start_file("B.nuspec", zip::write::FileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            archive.nuspec_entry().unwrap_err(),
            NuGetError::MultipleNuspecs(_)
        ));
    }

    #[test]
    fn get_is_case_insensitive() {
        let bytes = build_fixture();
        let mut archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.get("LIB/NET6.0/TEST.DLL").unwrap(), b"binary");
    }

    #[test]
    fn get_rejects_traversal() {
        let bytes = build_fixture();
        let mut archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        assert!(archive.get("../../etc/passwd").is_err());
    }

    #[test]
    fn files_by_folder_filters_to_lib() {
        let bytes = build_fixture();
        let archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        let lib_files = archive.files_by_folder(FolderKind::Lib);
        assert_eq!(lib_files, vec!["lib/net6.0/Test.dll".to_string()]);
    }

    #[test]
    fn extract_writes_to_disk() {
        let bytes = build_fixture();
        let mut archive = PackageArchive::open(Cursor::new(bytes)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("nested/Test.dll");
        archive.extract("lib/net6.0/Test.dll", &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"binary");
    }
}
