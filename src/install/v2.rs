// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Installer V2 (`spec.md` §4.K): legacy side-by-side extraction, no
//! completion marker by design.

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::archive::PackageArchive;
use crate::error::Result;
use crate::extraction::{
    classify_entry, write_compressed_doc, write_if_absent, ExtractionAction, PackageSaveMode,
    XmlDocFileSaveMode,
};
use crate::identity::{PackageIdentity, PackageVersion};
use crate::install::satellite::{merge_into_runtime, satellite_runtime_identity};
use crate::lock::CancellationToken;
use crate::manifest::{parse_nuspec, Framework, ParseableFramework, ParseableVersion};
use crate::path_resolver::PackagePathResolver;

/// Runtime knobs for a V2 extraction that aren't part of the save-mode
/// bit-flags.
pub struct V2ExtractionOptions {
    pub save_mode: PackageSaveMode,
    pub xml_doc_mode: XmlDocFileSaveMode,
    pub copy_satellite_files: bool,
}

impl Default for V2ExtractionOptions {
    fn default() -> Self {
        Self {
            save_mode: PackageSaveMode::V2_DEFAULT,
            xml_doc_mode: XmlDocFileSaveMode::None,
            copy_satellite_files: true,
        }
    }
}

/// Extract a package into the side-by-side V2 layout. Returns the files
/// written. Cancellation is checked before each entry; anything already on
/// disk is left as-is (`spec.md`: "V2 has no completion marker by design").
pub fn extract_v2<R, V, F, Resolver>(
    archive: &mut PackageArchive<R>,
    pkg_path: &Path,
    resolver: &Resolver,
    options: &V2ExtractionOptions,
    cancel: &dyn CancellationToken,
) -> Result<Vec<PathBuf>>
where
    R: Read + Seek,
    V: PackageVersion + ParseableVersion,
    F: Framework + ParseableFramework,
    Resolver: PackagePathResolver<V>,
{
    let nuspec_name = archive.nuspec_entry()?;
    let nuspec_bytes = archive.get(&nuspec_name)?;
    let nuspec_xml = String::from_utf8(nuspec_bytes)
        .map_err(|e| crate::error::NuGetError::InvalidManifest(format!("nuspec is not UTF-8: {e}")))?;
    let metadata = parse_nuspec::<V, F>(&nuspec_xml)?;

    let version = metadata
        .version
        .clone()
        .ok_or_else(|| crate::error::NuGetError::ValidationFailed("nuspec has no version".into()))?;
    let identity = PackageIdentity::new(metadata.id.clone(), version)?;

    let install_dir = resolver.install_path(&identity);
    std::fs::create_dir_all(&install_dir)?;

    let names = archive.names().to_vec();
    let mut written = Vec::new();

    for name in &names {
        if cancel.is_cancelled() {
            return Err(crate::error::NuGetError::Cancelled);
        }

        let normalized = name.replace('\\', "/");
        match classify_entry(&normalized, &names, options.save_mode, options.xml_doc_mode) {
            ExtractionAction::Skip => continue,
            ExtractionAction::WriteNormally => {
                let dst = install_dir.join(&normalized);
                write_if_absent(&dst, |p| {
                    let content = archive.get(&normalized)?;
                    std::fs::write(p, content)?;
                    Ok(())
                })?;
                written.push(dst);
            }
            ExtractionAction::WriteCompressedDoc => {
                let dst = install_dir.join(format!("{normalized}.zip"));
                write_if_absent(&dst, |p| {
                    let content = archive.get(&normalized)?;
                    let basename = normalized.rsplit('/').next().unwrap_or(&normalized);
                    write_compressed_doc(p, basename, &content)
                })?;
                written.push(dst);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(crate::error::NuGetError::Cancelled);
    }

    if options.save_mode.contains(PackageSaveMode::NUPKG) {
        let dst = install_dir.join(format!("{}.nupkg", identity.to_path_string()));
        std::fs::copy(pkg_path, &dst)?;
        written.push(dst);
    }

    if options.copy_satellite_files {
        if let Some(runtime_identity) = satellite_runtime_identity(&identity, &metadata) {
            let runtime_dir = resolver.install_path(&runtime_identity);
            let merged = merge_into_runtime(archive, &runtime_dir, options.save_mode)?;
            written.extend(merged);
        }
    }

    Ok(written)
}
