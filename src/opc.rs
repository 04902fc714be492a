// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Open Packaging Conventions parts written into every `.nupkg`
//! (`spec.md` §4.C, §6.2).
//!
//! Three parts are mandatory: `[Content_Types].xml`, `_rels/.rels`, and a
//! single core-properties part. All content types in this core are the
//! generic `application/octet` — the reference format does not carry a
//! MIME database, matching the teacher's minimal `ar`/control-file writers
//! that never interpret payload bytes either.

use std::collections::BTreeSet;
use std::io::{Seek, Write};

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::Result;
use crate::identity::PackageVersion;
use crate::manifest::model::{Framework, PackageMetadata};

pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
pub const RELS_PATH: &str = "_rels/.rels";

const OCTET_CONTENT_TYPE: &str = "application/octet";
const NUSPEC_RELATIONSHIP_TYPE: &str =
    "http://schemas.microsoft.com/packaging/2010/07/manifest";
const CORE_PROPERTIES_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

/// `package/services/metadata/core-properties/{hex}.psmdcp`.
pub fn core_properties_path(hex_name: &str) -> String {
    format!("package/services/metadata/core-properties/{}.psmdcp", hex_name)
}

fn extension_of(path: &str) -> Option<String> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = basename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// Write `[Content_Types].xml`: `Default` entries for `rels`, `psmdcp`, the
/// nuspec's own extension, and every distinct extension among `payload_paths`
/// (sorted); extensionless payload paths get a per-path `Override`.
pub fn write_content_types<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    nuspec_path: &str,
    payload_paths: &[String],
) -> Result<()> {
    let mut extensions: BTreeSet<String> = BTreeSet::new();
    let mut overrides: Vec<String> = Vec::new();

    if let Some(ext) = extension_of(nuspec_path) {
        extensions.insert(ext);
    }

    for path in payload_paths {
        match extension_of(path) {
            Some(ext) => {
                extensions.insert(ext);
            }
            None => overrides.push(path.clone()),
        }
    }
    overrides.sort();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut types_start = BytesStart::new("Types");
    types_start.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/content-types",
    ));
    writer.write_event(Event::Start(types_start))?;

    write_default(&mut writer, "rels", OCTET_CONTENT_TYPE)?;
    write_default(&mut writer, "psmdcp", OCTET_CONTENT_TYPE)?;
    for ext in &extensions {
        if ext == "rels" || ext == "psmdcp" {
            continue;
        }
        write_default(&mut writer, ext, OCTET_CONTENT_TYPE)?;
    }
    for path in &overrides {
        let mut start = BytesStart::new("Override");
        start.push_attribute(("PartName", format!("/{}", path).as_str()));
        start.push_attribute(("ContentType", OCTET_CONTENT_TYPE));
        writer.write_event(Event::Empty(start))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("Types")))?;

    let bytes = writer.into_inner();
    zip.start_file(CONTENT_TYPES_PATH, FileOptions::default())?;
    zip.write_all(&bytes)?;
    Ok(())
}

fn write_default<W: Write>(writer: &mut Writer<W>, extension: &str, content_type: &str) -> Result<()> {
    let mut start = BytesStart::new("Default");
    start.push_attribute(("Extension", extension));
    start.push_attribute(("ContentType", content_type));
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

/// Write `_rels/.rels`: a relationship to the nuspec part, plus one to the
/// core-properties part if it was written.
pub fn write_rels<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    nuspec_path: &str,
    core_properties_path: Option<&str>,
) -> Result<()> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut relationships_start = BytesStart::new("Relationships");
    relationships_start.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/relationships",
    ));
    writer.write_event(Event::Start(relationships_start))?;

    let mut id = 0u32;
    write_relationship(
        &mut writer,
        &format!("R{}", id),
        NUSPEC_RELATIONSHIP_TYPE,
        &format!("/{}", nuspec_path),
    )?;
    id += 1;

    if let Some(path) = core_properties_path {
        write_relationship(
            &mut writer,
            &format!("R{}", id),
            CORE_PROPERTIES_RELATIONSHIP_TYPE,
            &format!("/{}", path),
        )?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new(
        "Relationships",
    )))?;

    let bytes = writer.into_inner();
    zip.start_file(RELS_PATH, FileOptions::default())?;
    zip.write_all(&bytes)?;
    Ok(())
}

fn write_relationship<W: Write>(
    writer: &mut Writer<W>,
    id: &str,
    rel_type: &str,
    target: &str,
) -> Result<()> {
    let mut start = BytesStart::new("Relationship");
    start.push_attribute(("Id", id));
    start.push_attribute(("Type", rel_type));
    start.push_attribute(("Target", target));
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

/// Write the Dublin-Core style core-properties part and return its path.
pub fn write_core_properties<W, V, F>(
    zip: &mut ZipWriter<W>,
    metadata: &PackageMetadata<V, F>,
    hex_name: &str,
) -> Result<String>
where
    W: Write + Seek,
    V: PackageVersion,
    F: Framework,
{
    let path = core_properties_path(hex_name);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut start = BytesStart::new("coreProperties");
    start.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
    ));
    start.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    writer.write_event(Event::Start(start))?;

    write_text(&mut writer, "dc:creator", &metadata.authors.join(", "))?;
    write_text(&mut writer, "dc:description", &metadata.description)?;
    write_text(&mut writer, "dc:identifier", &metadata.id)?;
    if let Some(version) = &metadata.version {
        write_text(&mut writer, "version", &version.to_string())?;
    }
    if !metadata.tags.is_empty() {
        write_text(&mut writer, "keywords", &metadata.tags.join(" "))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new(
        "coreProperties",
    )))?;

    let bytes = writer.into_inner();
    zip.start_file(&path, FileOptions::default())?;
    zip.write_all(&bytes)?;
    Ok(path)
}

fn write_text<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_handles_extensionless_and_nested_paths() {
        assert_eq!(extension_of("lib/net6.0/test.dll"), Some("dll".to_string()));
        assert_eq!(extension_of("tools/install"), None);
        assert_eq!(extension_of("Test.Package.nuspec"), Some("nuspec".to_string()));
    }

    #[test]
    fn core_properties_path_is_namespaced() {
        assert_eq!(
            core_properties_path("abc123"),
            "package/services/metadata/core-properties/abc123.psmdcp"
        );
    }
}
