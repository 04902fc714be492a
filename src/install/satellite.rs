// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Satellite package detection and payload merge (`spec.md` §4.K
//! "Satellites").

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::archive::PackageArchive;
use crate::error::{NuGetError, Result};
use crate::extraction::{
    classify_entry, write_compressed_doc, write_if_absent, ExtractionAction, PackageSaveMode,
    XmlDocFileSaveMode,
};
use crate::identity::{PackageIdentity, PackageVersion};
use crate::manifest::{Framework, PackageMetadata};

/// A package is a satellite iff its manifest names a non-empty language,
/// it has exactly one dependency group with exactly one dependency that
/// pins an exact version equal to the satellite's own version, and its id
/// is `{runtime_id}.{language}` (case-insensitive). Returns the runtime
/// package's identity when all hold.
pub fn satellite_runtime_identity<V: PackageVersion, F: Framework>(
    identity: &PackageIdentity<V>,
    metadata: &PackageMetadata<V, F>,
) -> Option<PackageIdentity<V>> {
    let language = metadata.language.as_ref().filter(|l| !l.is_empty())?;

    if metadata.dependency_groups.len() != 1 {
        return None;
    }
    let group = &metadata.dependency_groups[0];
    if group.dependencies.len() != 1 {
        return None;
    }

    let exact = group.dependencies[0].version_range.is_exact()?;
    if *exact != identity.version {
        return None;
    }

    let suffix = format!(".{language}");
    let id_lower = identity.id.to_lowercase();
    if !id_lower.ends_with(&suffix.to_lowercase()) {
        return None;
    }
    let runtime_id = &identity.id[..identity.id.len() - suffix.len()];
    if runtime_id.is_empty() {
        return None;
    }

    PackageIdentity::new(runtime_id, identity.version.clone()).ok()
}

/// Merge a satellite's payload into the runtime package's install
/// directory, honouring the same save-mode exclusion rules used for a
/// normal extraction but forcing `XmlDocFileSaveMode::None` (`spec.md`
/// §4.K). Fails with `RuntimePackageMissing` if the runtime package was
/// never installed.
pub fn merge_into_runtime<R: Read + Seek>(
    archive: &mut PackageArchive<R>,
    runtime_install_dir: &Path,
    save_mode: PackageSaveMode,
) -> Result<Vec<PathBuf>> {
    if !runtime_install_dir.is_dir() {
        return Err(NuGetError::RuntimePackageMissing(
            runtime_install_dir.display().to_string(),
        ));
    }

    let names = archive.names().to_vec();
    let mut written = Vec::new();

    for name in &names {
        let normalized = name.replace('\\', "/");
        match classify_entry(&normalized, &names, save_mode, XmlDocFileSaveMode::None) {
            ExtractionAction::Skip => continue,
            ExtractionAction::WriteNormally => {
                let dst = runtime_install_dir.join(&normalized);
                write_if_absent(&dst, |p| {
                    let content = archive.get(&normalized)?;
                    std::fs::write(p, content)?;
                    Ok(())
                })?;
                written.push(dst);
            }
            ExtractionAction::WriteCompressedDoc => {
                let dst = runtime_install_dir.join(format!("{normalized}.zip"));
                write_if_absent(&dst, |p| {
                    let content = archive.get(&normalized)?;
                    let basename = normalized.rsplit('/').next().unwrap_or(&normalized);
                    write_compressed_doc(p, basename, &content)
                })?;
                written.push(dst);
            }
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Dependency, DependencyGroup, VersionRange};
    use std::fmt;

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct V(&'static str);
    impl fmt::Display for V {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl PackageVersion for V {
        fn is_prerelease(&self) -> bool {
            false
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct F(bool);
    impl fmt::Display for F {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "any")
        }
    }
    impl Framework for F {
        fn is_any(&self) -> bool {
            self.0
        }
    }

    fn base_metadata() -> PackageMetadata<V, F> {
        PackageMetadata {
            id: "Foo.ja-jp".into(),
            version: Some(V("1.0.0")),
            description: "d".into(),
            authors: vec!["a".into()],
            title: None,
            owners: vec![],
            project_url: None,
            icon_url: None,
            license_url: None,
            icon: None,
            readme: None,
            copyright: None,
            release_notes: None,
            tags: vec![],
            language: Some("ja-jp".into()),
            minimum_client_version: None,
            repository: None,
            license_metadata: None,
            require_license_acceptance: false,
            package_types: vec![],
            dependency_groups: vec![DependencyGroup {
                target_framework: None,
                dependencies: vec![Dependency {
                    id: "Foo".into(),
                    version_range: VersionRange::exact(V("1.0.0")),
                }],
            }],
            framework_reference_groups: vec![],
            framework_assemblies: vec![],
        }
    }

    #[test]
    fn detects_a_well_formed_satellite() {
        let metadata = base_metadata();
        let identity = PackageIdentity::new("Foo.ja-jp", V("1.0.0")).unwrap();
        let runtime = satellite_runtime_identity(&identity, &metadata).unwrap();
        assert_eq!(runtime.id, "Foo");
        assert_eq!(runtime.version, V("1.0.0"));
    }

    #[test]
    fn rejects_missing_language() {
        let mut metadata = base_metadata();
        metadata.language = None;
        let identity = PackageIdentity::new("Foo.ja-jp", V("1.0.0")).unwrap();
        assert!(satellite_runtime_identity(&identity, &metadata).is_none());
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut metadata = base_metadata();
        metadata.dependency_groups[0].dependencies[0].version_range = VersionRange::exact(V("2.0.0"));
        let identity = PackageIdentity::new("Foo.ja-jp", V("1.0.0")).unwrap();
        assert!(satellite_runtime_identity(&identity, &metadata).is_none());
    }

    #[test]
    fn rejects_non_exact_range() {
        let mut metadata = base_metadata();
        metadata.dependency_groups[0].dependencies[0].version_range = VersionRange::at_least(V("1.0.0"));
        let identity = PackageIdentity::new("Foo.ja-jp", V("1.0.0")).unwrap();
        assert!(satellite_runtime_identity(&identity, &metadata).is_none());
    }

    #[test]
    fn rejects_id_without_language_suffix() {
        let metadata = base_metadata();
        let identity = PackageIdentity::new("Foo.Bar", V("1.0.0")).unwrap();
        assert!(satellite_runtime_identity(&identity, &metadata).is_none());
    }

    #[test]
    fn missing_runtime_dir_is_an_error() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("lib/net6.0/Foo.resources.dll", zip::write::FileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let mut archive = PackageArchive::open(std::io::Cursor::new(bytes)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = merge_into_runtime(&mut archive, &missing, PackageSaveMode::all()).unwrap_err();
        assert!(matches!(err, NuGetError::RuntimePackageMissing(_)));
    }
}
