// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction Policy Engine (`spec.md` §4.J): what gets written to disk and
//! how XML documentation and satellites are handled.

use std::io::Write;

use crate::archive::is_package_metadata;
use crate::error::Result;

bitflags::bitflags! {
    /// Which archive parts an installer writes to disk.
    pub struct PackageSaveMode: u8 {
        const NUSPEC = 0b001;
        const NUPKG  = 0b010;
        const FILES  = 0b100;
    }
}

impl PackageSaveMode {
    /// V2 legacy default: payload files and the original `.nupkg`, no
    /// extracted `.nuspec` copy.
    pub const V2_DEFAULT: PackageSaveMode =
        PackageSaveMode::from_bits_truncate(PackageSaveMode::NUPKG.bits() | PackageSaveMode::FILES.bits());

    /// V3 default: everything.
    pub const V3_DEFAULT: PackageSaveMode = PackageSaveMode::all();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlDocFileSaveMode {
    None,
    Skip,
    Compress,
}

/// `spec.md` §4.J: `.nuspec` entries need the `Nuspec` flag, hash/metadata
/// sidecars are always excluded, directory entries are always excluded,
/// everything else payload-shaped needs the `Files` flag.
pub fn is_package_file(name: &str, mode: PackageSaveMode) -> bool {
    let lower = name.replace('\\', "/").to_lowercase();

    if lower.ends_with('/') || lower.rsplit('/').next().unwrap_or("").is_empty() {
        return false;
    }

    if lower.ends_with(".nupkg.sha512") || lower.ends_with(".nupkg.metadata") {
        return false;
    }

    if is_package_metadata(name) {
        return lower.ends_with(".nuspec") && mode.contains(PackageSaveMode::NUSPEC);
    }

    mode.contains(PackageSaveMode::FILES)
}

fn basename_without_extension(name: &str) -> (&str, &str) {
    let base = name.rsplit('/').next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (base, ""),
    }
}

fn dirname(name: &str) -> &str {
    match name.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

/// Whether `name` is lib/ref XML documentation: extension `.xml`, under
/// `lib/`/`ref/`, with a sibling `.dll`/`.exe` of the same basename — either
/// directly, or one directory up via the culture-specific satellite pattern
/// `.../{culture}/Lib.xml` whose sibling DLL lives in the parent directory.
pub fn is_xml_doc_file(name: &str, all_entries: &[String]) -> bool {
    let normalized = name.replace('\\', "/");
    let lower = normalized.to_lowercase();

    if !lower.starts_with("lib/") && !lower.starts_with("ref/") {
        return false;
    }

    let (stem, ext) = basename_without_extension(&normalized);
    if !ext.eq_ignore_ascii_case("xml") {
        return false;
    }

    let dir = dirname(&normalized);
    let has_sibling = |candidate_dir: &str| {
        all_entries.iter().any(|other| {
            let other_normalized = other.replace('\\', "/");
            let other_dir = dirname(&other_normalized);
            if !other_dir.eq_ignore_ascii_case(candidate_dir) {
                return false;
            }
            let (other_stem, other_ext) = basename_without_extension(&other_normalized);
            other_stem.eq_ignore_ascii_case(stem)
                && (other_ext.eq_ignore_ascii_case("dll") || other_ext.eq_ignore_ascii_case("exe"))
        })
    };

    if has_sibling(dir) {
        return true;
    }

    // Culture-specific satellite refinement: `lib/net472/en-US/Lib.xml`
    // whose sibling `Lib.dll` lives one directory up (`lib/net472/`).
    if let Some((parent_dir, _culture)) = dir.rsplit_once('/') {
        if has_sibling(parent_dir) {
            return true;
        }
    }

    false
}

/// The outcome of running the policy over one archive entry.
pub enum ExtractionAction {
    Skip,
    WriteNormally,
    WriteCompressedDoc,
}

/// Decide what to do with `name` given the current save mode and XML-doc
/// policy (`spec.md` §4.J).
pub fn classify_entry(
    name: &str,
    all_entries: &[String],
    save_mode: PackageSaveMode,
    xml_doc_mode: XmlDocFileSaveMode,
) -> ExtractionAction {
    if !is_package_file(name, save_mode) {
        return ExtractionAction::Skip;
    }

    if is_xml_doc_file(name, all_entries) {
        return match xml_doc_mode {
            XmlDocFileSaveMode::Skip => ExtractionAction::Skip,
            XmlDocFileSaveMode::Compress => ExtractionAction::WriteCompressedDoc,
            XmlDocFileSaveMode::None => ExtractionAction::WriteNormally,
        };
    }

    ExtractionAction::WriteNormally
}

/// Write `content` as a single-entry ZIP at `dst`, with the inner entry
/// named after `original_basename` (`spec.md` §4.J `Compress` mode).
pub fn write_compressed_doc(
    dst: &std::path::Path,
    original_basename: &str,
    content: &[u8],
) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(dst)?;
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(original_basename, zip::write::FileOptions::default())?;
    zip.write_all(content)?;
    zip.finish()?;
    Ok(())
}

/// Run `write` against `dst` unless a file already exists there
/// (`spec.md` §4.J: extraction is skip-if-exists). `write` receives the
/// already-`create_dir_all`'d parent and is responsible for the file's
/// actual contents, so both a plain write and a compressed-doc write share
/// this one skip-if-exists gate.
pub fn write_if_absent(
    dst: &std::path::Path,
    write: impl FnOnce(&std::path::Path) -> Result<()>,
) -> Result<()> {
    if dst.exists() {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write(dst)
}
