// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Archive Builder (`spec.md` §4.E): fluent construction of a `.nupkg`.

use std::io::{Seek, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::{NuGetError, Result};
use crate::file_manifest::{PackageFileData, PackageFileManifest};
use crate::identity::PackageVersion;
use crate::manifest::model::{Dependency, DependencyGroup, Framework, PackageMetadata, PackageType};
use crate::manifest::{emit_nuspec, FrameworkReferenceGroup};
use crate::opc;

/// Fluent builder for a `.nupkg` archive.
///
/// Consumes itself on every mutating call (`self` by value), matching the
/// teacher's manifest/archive builders: a pipeline of moves rather than a
/// `&mut self` accumulator.
pub struct PackageArchiveBuilder<V, F> {
    metadata: PackageMetadata<V, F>,
    files: PackageFileManifest,
}

impl<V: PackageVersion, F: Framework> PackageArchiveBuilder<V, F> {
    pub fn new(metadata: PackageMetadata<V, F>) -> Self {
        Self {
            metadata,
            files: PackageFileManifest::new(),
        }
    }

    pub fn add_file(
        mut self,
        target: impl AsRef<str>,
        data: impl Into<PackageFileData>,
    ) -> Result<Self> {
        self.files.add(target, data)?;
        Ok(self)
    }

    pub fn add_path(
        mut self,
        path: impl AsRef<std::path::Path>,
        strip_prefix: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        self.files.add_path(path, strip_prefix)?;
        Ok(self)
    }

    /// Add a dependency under `framework`. Frameworks compare equal per
    /// [`Framework`]'s `PartialEq`; a matching existing group is extended
    /// rather than duplicated (`spec.md` §4.E).
    pub fn add_dependency(mut self, framework: Option<F>, dependency: Dependency<V>) -> Self {
        match self
            .metadata
            .dependency_groups
            .iter_mut()
            .find(|g| g.target_framework == framework)
        {
            Some(group) => group.dependencies.push(dependency),
            None => self.metadata.dependency_groups.push(DependencyGroup {
                target_framework: framework,
                dependencies: vec![dependency],
            }),
        }
        self
    }

    pub fn add_framework_reference(mut self, framework: Option<F>, reference: String) -> Self {
        match self
            .metadata
            .framework_reference_groups
            .iter_mut()
            .find(|g| g.target_framework == framework)
        {
            Some(group) => group.framework_references.push(reference),
            None => self.metadata.framework_reference_groups.push(FrameworkReferenceGroup {
                target_framework: framework,
                framework_references: vec![reference],
            }),
        }
        self
    }

    pub fn add_package_type(mut self, package_type: PackageType) -> Self {
        self.metadata.package_types.push(package_type);
        self
    }

    /// Validate `spec.md` §3's invariants plus the icon/readme/license
    /// file-entry checks that require the file manifest.
    pub fn validate(&self) -> Result<()> {
        let metadata = &self.metadata;
        metadata.validate()?;

        if let Some(icon) = &metadata.icon {
            let entry = self
                .files
                .get(icon)
                .ok_or_else(|| NuGetError::ValidationFailed(format!("icon entry not found: {}", icon)))?;
            if !entry.target.starts_with("icon/") && entry.target.contains('/') {
                return Err(NuGetError::ValidationFailed(format!(
                    "icon must be at archive root or under icon/: {}",
                    icon
                )));
            }
        }

        if let Some(readme) = &metadata.readme {
            self.files
                .get(readme)
                .ok_or_else(|| NuGetError::ValidationFailed(format!("readme entry not found: {}", readme)))?;
        }

        Ok(())
    }

    /// Validate, then write the nuspec, payload files (insertion order),
    /// and OPC parts into `sink`.
    pub fn save<W: Write + Seek>(self, sink: W) -> Result<()> {
        self.validate()?;
        let metadata = &self.metadata;

        let nuspec_xml = emit_nuspec(metadata)?;
        let nuspec_path = format!("{}.nuspec", metadata.id);

        let mut zip = ZipWriter::new(sink);
        let options = FileOptions::default();

        zip.start_file(&nuspec_path, options)?;
        zip.write_all(nuspec_xml.as_bytes())?;

        let mut payload_paths = Vec::with_capacity(self.files.len());
        for file in self.files.iter() {
            let content = file.resolve_content()?;
            zip.start_file(&file.target, options)?;
            zip.write_all(&content)?;
            payload_paths.push(file.target.clone());
        }

        opc::write_content_types(&mut zip, &nuspec_path, &payload_paths)?;
        let hex_name = uuid::Uuid::new_v4().simple().to_string();
        let core_properties_path = opc::write_core_properties(&mut zip, metadata, &hex_name)?;
        opc::write_rels(&mut zip, &nuspec_path, Some(&core_properties_path))?;

        zip.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::model::VersionRange;
    use std::fmt;
    use std::io::Cursor;

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
    struct Fw(&'static str);
    impl fmt::Display for Fw {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl Framework for Fw {
        fn is_any(&self) -> bool {
            false
        }
    }

    fn minimal_metadata() -> PackageMetadata<V, Fw> {
        PackageMetadata {
            id: "TestPackage".into(),
            version: Some(V("1.0.0")),
            description: "Test".into(),
            authors: vec!["A".into()],
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
            language: None,
            minimum_client_version: None,
            repository: None,
            license_metadata: None,
            require_license_acceptance: false,
            package_types: vec![],
            dependency_groups: vec![],
            framework_reference_groups: vec![],
            framework_assemblies: vec![],
        }
    }

    #[test]
    fn builds_minimal_package() {
        let builder = PackageArchiveBuilder::new(minimal_metadata())
            .add_file("lib/net6.0/test.dll", vec![1u8, 2, 3])
            .unwrap();

        let mut buf = Cursor::new(Vec::new());
        builder.save(&mut buf).unwrap();

        let mut archive =
            crate::archive::PackageArchive::open(Cursor::new(buf.into_inner())).unwrap();
        let names: Vec<String> = archive.names().to_vec();
        assert!(names.contains(&"TestPackage.nuspec".to_string()));
        assert!(names.contains(&"lib/net6.0/test.dll".to_string()));
        assert!(names.contains(&"[Content_Types].xml".to_string()));
        assert!(names.contains(&"_rels/.rels".to_string()));
        assert!(names.iter().any(|n| n.ends_with(".psmdcp")));
        assert_eq!(archive.get("lib/net6.0/test.dll").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_self_dependency() {
        let mut metadata = minimal_metadata();
        metadata.dependency_groups.push(DependencyGroup {
            target_framework: None,
            dependencies: vec![Dependency {
                id: "TestPackage".into(),
                version_range: VersionRange::at_least(V("1.0.0")),
            }],
        });
        let builder = PackageArchiveBuilder::new(metadata);
        assert!(builder.validate().is_err());
    }

    #[test]
    fn merges_dependencies_into_matching_framework_group() {
        let builder = PackageArchiveBuilder::new(minimal_metadata())
            .add_dependency(
                Some(Fw("net6.0")),
                Dependency {
                    id: "A".into(),
                    version_range: VersionRange::at_least(V("1.0.0")),
                },
            )
            .add_dependency(
                Some(Fw("net6.0")),
                Dependency {
                    id: "B".into(),
                    version_range: VersionRange::at_least(V("1.0.0")),
                },
            );
        let metadata = &builder.metadata;
        assert_eq!(metadata.dependency_groups.len(), 1);
        assert_eq!(metadata.dependency_groups[0].dependencies.len(), 2);
    }
}
