// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Installer V3 (`spec.md` §4.K): content-addressed, atomic, with a
//! completion-marker idempotence contract. Ordering in the happy path is
//! load-bearing — the metadata marker is always renamed last.

use std::fs::File;
use std::path::{Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha512};

use crate::archive::PackageArchive;
use crate::error::{NuGetError, Result};
use crate::extraction::{
    classify_entry, write_compressed_doc, write_if_absent, ExtractionAction, PackageSaveMode,
    XmlDocFileSaveMode,
};
use crate::identity::{PackageIdentity, PackageVersion};
use crate::lock::{with_lock, CancellationToken};
use crate::path_resolver::{PackagePathResolver, V3PathResolver};
use crate::signing::SignatureVerifier;

/// Knobs for a V3 install beyond the save-mode bit-flags.
pub struct V3InstallOptions<'a> {
    pub save_mode: PackageSaveMode,
    pub xml_doc_mode: XmlDocFileSaveMode,
    /// Invoked with the opened, not-yet-extracted archive before any file
    /// is written. A verification failure aborts the install.
    pub verifier: Option<&'a dyn SignatureVerifier>,
}

impl<'a> Default for V3InstallOptions<'a> {
    fn default() -> Self {
        Self {
            save_mode: PackageSaveMode::V3_DEFAULT,
            xml_doc_mode: XmlDocFileSaveMode::None,
            verifier: None,
        }
    }
}

fn random_hex() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn hash_file_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha512::new();
    hasher.update(&bytes);
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Content hash for a signed package: SHA-512 over every entry's
/// (name, bytes) in sorted order, excluding the signature entry itself,
/// so the hash is independent of where the signature lives in the
/// archive's directory. Base64-encoded.
fn signed_content_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = PackageArchive::open(file)?;
    let mut names: Vec<String> = archive
        .names()
        .iter()
        .filter(|n| !n.eq_ignore_ascii_case(".signature.p7s"))
        .cloned()
        .collect();
    names.sort();

    let mut hasher = Sha512::new();
    for name in &names {
        hasher.update(name.as_bytes());
        hasher.update(archive.get(name)?);
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Install `identity` from `source` using `fetch` to populate a temp
/// `.nupkg`. Returns whether this call performed the install (`false` means
/// it was already installed, observed via the completion marker).
pub fn install_v3<V>(
    source: &str,
    identity: &PackageIdentity<V>,
    fetch: impl FnOnce(&Path) -> Result<()>,
    resolver: &V3PathResolver,
    options: &V3InstallOptions,
    cancel: &dyn CancellationToken,
) -> Result<bool>
where
    V: PackageVersion,
{
    let _span =
        tracing::info_span!("install.v3", package = %identity.to_diagnostic_string()).entered();
    tracing::info!("install.v3.start");

    let target_nupkg = resolver.package_file_path(identity);
    let marker_path = resolver.metadata_path(identity);

    if marker_path.exists() {
        tracing::info!(installed = false, "install.v3.finish");
        return Ok(false);
    }
    if cancel.is_cancelled() {
        return Err(NuGetError::Cancelled);
    }

    let result = with_lock(&target_nupkg, cancel, || {
        if marker_path.exists() {
            return Ok(false);
        }

        let install_dir = resolver.install_path(identity);
        std::fs::create_dir_all(&install_dir)?;

        let temp_nupkg = install_dir.join(format!("{}.nupkg", random_hex()));
        let temp_hash = install_dir.join(format!("{}.sha512", random_hex()));
        let temp_metadata = install_dir.join(format!("{}.metadata", random_hex()));

        let outcome = run_install(
            source,
            identity,
            fetch,
            resolver,
            options,
            cancel,
            &install_dir,
            &temp_nupkg,
            &temp_hash,
            &temp_metadata,
            &target_nupkg,
            &marker_path,
        );

        if outcome.is_err() {
            let _ = std::fs::remove_file(&temp_nupkg);
        }
        outcome
    });

    match &result {
        Ok(installed) => tracing::info!(installed = *installed, "install.v3.finish"),
        Err(_) => tracing::warn!("install.v3.finish"),
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn run_install<V: PackageVersion>(
    source: &str,
    identity: &PackageIdentity<V>,
    fetch: impl FnOnce(&Path) -> Result<()>,
    resolver: &V3PathResolver,
    options: &V3InstallOptions,
    cancel: &dyn CancellationToken,
    install_dir: &Path,
    temp_nupkg: &Path,
    temp_hash: &Path,
    temp_metadata: &Path,
    target_nupkg: &Path,
    marker_path: &Path,
) -> Result<bool> {
    if cancel.is_cancelled() {
        return Err(NuGetError::Cancelled);
    }
    fetch(temp_nupkg)?;

    // Cancellation is ignored from here on to preserve the marker
    // invariant: finalized iff marker present.
    let file = File::open(temp_nupkg)?;
    let mut archive = PackageArchive::open(file)?;

    if let Some(verifier) = options.verifier {
        verifier.verify(&mut archive)?;
    }

    if options.save_mode.contains(PackageSaveMode::NUSPEC) {
        let nuspec_name = archive.nuspec_entry()?;
        let bytes = archive.get(&nuspec_name)?;
        std::fs::write(resolver.manifest_path(identity), bytes)?;
    }

    if options.save_mode.contains(PackageSaveMode::FILES) {
        let names = archive.names().to_vec();
        for name in &names {
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
                }
                ExtractionAction::WriteCompressedDoc => {
                    let dst = install_dir.join(format!("{normalized}.zip"));
                    write_if_absent(&dst, |p| {
                        let content = archive.get(&normalized)?;
                        let basename = normalized.rsplit('/').next().unwrap_or(&normalized);
                        write_compressed_doc(p, basename, &content)
                    })?;
                }
            }
        }
    }

    let package_hash = hash_file_base64(temp_nupkg)?;
    let content_hash = if archive.is_signed() {
        signed_content_hash(temp_nupkg)?
    } else {
        package_hash.clone()
    };

    std::fs::write(temp_hash, &package_hash)?;
    let metadata_doc = serde_json::json!({
        "version": 2,
        "contentHash": content_hash,
        "source": source,
    });
    std::fs::write(temp_metadata, serde_json::to_string_pretty(&metadata_doc)?)?;

    if options.save_mode.contains(PackageSaveMode::NUPKG) {
        std::fs::rename(temp_nupkg, target_nupkg)?;
    } else {
        std::fs::remove_file(temp_nupkg)?;
    }
    std::fs::rename(temp_hash, resolver.hash_path(identity))?;
    std::fs::rename(temp_metadata, marker_path)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::NeverCancelled;
    use std::io::{Cursor, Write as _};

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct V(&'static str);
    impl std::fmt::Display for V {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl PackageVersion for V {
        fn is_prerelease(&self) -> bool {
            false
        }
    }

    fn build_fixture() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        zip.start_file("Foo.nuspec", options).unwrap();
        zip.write_all(b"<package/>").unwrap();
        zip.start_file("lib/net6.0/Foo.dll", options).unwrap();
        zip.write_all(b"binary").unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn installs_once_and_is_idempotent_thereafter() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = V3PathResolver::new(dir.path(), true);
        let identity = PackageIdentity::new("Foo", V("1.0.0")).unwrap();
        let bytes = build_fixture();

        let fetch = |dst: &Path| -> Result<()> {
            std::fs::write(dst, &bytes)?;
            Ok(())
        };

        let options = V3InstallOptions::default();
        let installed = install_v3("https://example.test", &identity, fetch, &resolver, &options, &NeverCancelled)
            .unwrap();
        assert!(installed);
        assert!(resolver.metadata_path(&identity).exists());
        assert!(resolver.package_file_path(&identity).exists());
        assert!(resolver.hash_path(&identity).exists());
        assert!(dir.path().join("foo/1.0.0/lib/net6.0/Foo.dll").exists());

        let fetch_again = |_dst: &Path| -> Result<()> {
            panic!("fetch must not be called once the marker exists");
        };
        let installed_again = install_v3(
            "https://example.test",
            &identity,
            fetch_again,
            &resolver,
            &options,
            &NeverCancelled,
        )
        .unwrap();
        assert!(!installed_again);
    }

    #[test]
    fn failed_fetch_leaves_no_marker_and_cleans_up_temp_nupkg() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = V3PathResolver::new(dir.path(), true);
        let identity = PackageIdentity::new("Foo", V("1.0.0")).unwrap();

        let fetch = |_dst: &Path| -> Result<()> { Err(NuGetError::CacheIo("network down".into())) };

        let options = V3InstallOptions::default();
        let err = install_v3("https://example.test", &identity, fetch, &resolver, &options, &NeverCancelled)
            .unwrap_err();
        assert!(matches!(err, NuGetError::CacheIo(_)));
        assert!(!resolver.metadata_path(&identity).exists());

        let install_dir = resolver.install_path(&identity);
        let leftover_nupkgs = std::fs::read_dir(&install_dir)
            .map(|it| {
                it.filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some("nupkg"))
                    .count()
            })
            .unwrap_or(0);
        assert_eq!(leftover_nupkgs, 0);
    }

    #[test]
    fn nupkg_flag_unset_deletes_temp_and_skips_final_copy() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = V3PathResolver::new(dir.path(), true);
        let identity = PackageIdentity::new("Foo", V("1.0.0")).unwrap();
        let bytes = build_fixture();
        let fetch = |dst: &Path| -> Result<()> {
            std::fs::write(dst, &bytes)?;
            Ok(())
        };

        let options = V3InstallOptions {
            save_mode: PackageSaveMode::NUSPEC | PackageSaveMode::FILES,
            xml_doc_mode: XmlDocFileSaveMode::None,
            verifier: None,
        };
        let installed = install_v3("https://example.test", &identity, fetch, &resolver, &options, &NeverCancelled)
            .unwrap();
        assert!(installed);
        assert!(!resolver.package_file_path(&identity).exists());
        assert!(resolver.metadata_path(&identity).exists());
    }

    struct RejectingVerifier;
    impl SignatureVerifier for RejectingVerifier {
        fn verify(&self, _archive: &mut PackageArchive<File>) -> Result<()> {
            Err(NuGetError::ValidationFailed("signature rejected".into()))
        }
    }

    #[test]
    fn verifier_rejection_aborts_install_before_any_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = V3PathResolver::new(dir.path(), true);
        let identity = PackageIdentity::new("Foo", V("1.0.0")).unwrap();
        let bytes = build_fixture();
        let fetch = |dst: &Path| -> Result<()> {
            std::fs::write(dst, &bytes)?;
            Ok(())
        };

        let verifier = RejectingVerifier;
        let options = V3InstallOptions {
            save_mode: PackageSaveMode::V3_DEFAULT,
            xml_doc_mode: XmlDocFileSaveMode::None,
            verifier: Some(&verifier),
        };
        let err = install_v3("https://example.test", &identity, fetch, &resolver, &options, &NeverCancelled)
            .unwrap_err();
        assert!(matches!(err, NuGetError::ValidationFailed(_)));
        assert!(!resolver.metadata_path(&identity).exists());
        assert!(!resolver.package_file_path(&identity).exists());
    }
}
