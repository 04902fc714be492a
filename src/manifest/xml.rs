// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.nuspec` XML parsing and emission (`spec.md` §4.B).
//!
//! Hand-rolled over `quick_xml`'s event reader/writer, in the same style as
//! the pack's other NuGet-domain parsers (event-driven, no intermediate
//! DOM) — `PackageVersion`/`Framework` are opaque external types, so a
//! derive-based `serde` mapping can't express the parse/format boundary;
//! we drive it explicitly instead.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use crate::error::{NuGetError, Result};
use crate::manifest::model::{
    Dependency, DependencyGroup, Framework, FrameworkAssembly, FrameworkReferenceGroup,
    LicenseMetadata, PackageMetadata, PackageType, RepositoryInfo, VersionRange,
};
use crate::manifest::schema::select_namespace;

/// A minimal, generic-free trait for parsing the opaque external types from
/// their nuspec string representation, since `PackageVersion`/`Framework`
/// deliberately don't carry a `FromStr` bound (parsing them is someone
/// else's subsystem, per `spec.md` §1).
pub trait ParseableVersion: Sized {
    fn parse_nuspec(s: &str) -> Result<Self>;
}

pub trait ParseableFramework: Sized {
    fn parse_nuspec(s: &str) -> Result<Self>;
}

fn split_comma(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn split_whitespace(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Emit the `.nuspec` XML document for `metadata`, selecting the minimum
/// compatible namespace (`spec.md` §4.B).
pub fn emit_nuspec<V, F>(metadata: &PackageMetadata<V, F>) -> Result<String>
where
    V: crate::identity::PackageVersion,
    F: Framework,
{
    let namespace = select_namespace(metadata);

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut package_start = BytesStart::new("package");
    package_start.push_attribute(("xmlns", namespace));
    writer.write_event(Event::Start(package_start))?;

    writer.write_event(Event::Start(BytesStart::new("metadata")))?;

    write_text_elem(&mut writer, "id", &metadata.id)?;
    if let Some(version) = &metadata.version {
        write_text_elem(&mut writer, "version", &version.to_string())?;
    }
    if let Some(title) = &metadata.title {
        write_text_elem(&mut writer, "title", title)?;
    }
    write_text_elem(&mut writer, "authors", &metadata.authors.join(","))?;
    if !metadata.owners.is_empty() {
        write_text_elem(&mut writer, "owners", &metadata.owners.join(","))?;
    }
    if metadata.require_license_acceptance {
        write_text_elem(&mut writer, "requireLicenseAcceptance", "true")?;
    }
    match &metadata.license_metadata {
        Some(LicenseMetadata::Expression(expr)) => {
            let mut start = BytesStart::new("license");
            start.push_attribute(("type", "expression"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(expr)))?;
            writer.write_event(Event::End(quick_xml::events::BytesEnd::new("license")))?;
        }
        Some(LicenseMetadata::File(path)) => {
            let mut start = BytesStart::new("license");
            start.push_attribute(("type", "file"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(path)))?;
            writer.write_event(Event::End(quick_xml::events::BytesEnd::new("license")))?;
        }
        None => {}
    }
    if let Some(url) = &metadata.license_url {
        write_text_elem(&mut writer, "licenseUrl", url)?;
    }
    if let Some(url) = &metadata.icon_url {
        write_text_elem(&mut writer, "iconUrl", url)?;
    }
    if let Some(icon) = &metadata.icon {
        write_text_elem(&mut writer, "icon", icon)?;
    }
    if let Some(readme) = &metadata.readme {
        write_text_elem(&mut writer, "readme", readme)?;
    }
    if let Some(url) = &metadata.project_url {
        write_text_elem(&mut writer, "projectUrl", url)?;
    }
    write_text_elem(&mut writer, "description", &metadata.description)?;
    if let Some(notes) = &metadata.release_notes {
        write_text_elem(&mut writer, "releaseNotes", notes)?;
    }
    if let Some(copyright) = &metadata.copyright {
        write_text_elem(&mut writer, "copyright", copyright)?;
    }
    if let Some(language) = &metadata.language {
        write_text_elem(&mut writer, "language", language)?;
    }
    if !metadata.tags.is_empty() {
        write_text_elem(&mut writer, "tags", &metadata.tags.join(" "))?;
    }
    if let Some(min_client) = &metadata.minimum_client_version {
        write_text_elem(&mut writer, "minClientVersion", min_client)?;
    }

    if let Some(repo) = &metadata.repository {
        let mut start = BytesStart::new("repository");
        if let Some(t) = &repo.repo_type {
            start.push_attribute(("type", t.as_str()));
        }
        if let Some(url) = &repo.url {
            start.push_attribute(("url", url.as_str()));
        }
        if let Some(branch) = &repo.branch {
            start.push_attribute(("branch", branch.as_str()));
        }
        if let Some(commit) = &repo.commit {
            start.push_attribute(("commit", commit.as_str()));
        }
        writer.write_event(Event::Empty(start))?;
    }

    if !metadata.package_types.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("packageTypes")))?;
        for pt in &metadata.package_types {
            let mut start = BytesStart::new("packageType");
            start.push_attribute(("name", pt.name.as_str()));
            if let Some(v) = &pt.version {
                start.push_attribute(("version", v.as_str()));
            }
            writer.write_event(Event::Empty(start))?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("packageTypes")))?;
    }

    if !metadata.dependency_groups.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("dependencies")))?;
        for group in &metadata.dependency_groups {
            let has_framework = group
                .target_framework
                .as_ref()
                .is_some_and(|f| !f.is_any());
            if has_framework {
                let mut start = BytesStart::new("group");
                start.push_attribute((
                    "targetFramework",
                    group.target_framework.as_ref().unwrap().to_string().as_str(),
                ));
                writer.write_event(Event::Start(start))?;
                write_dependency_elems(&mut writer, &group.dependencies)?;
                writer.write_event(Event::End(quick_xml::events::BytesEnd::new("group")))?;
            } else {
                write_dependency_elems(&mut writer, &group.dependencies)?;
            }
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("dependencies")))?;
    }

    if !metadata.framework_reference_groups.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("frameworkReferences")))?;
        for group in &metadata.framework_reference_groups {
            let mut start = BytesStart::new("group");
            if let Some(fw) = &group.target_framework {
                start.push_attribute(("targetFramework", fw.to_string().as_str()));
            }
            writer.write_event(Event::Start(start))?;
            for reference in &group.framework_references {
                let mut r = BytesStart::new("frameworkReference");
                r.push_attribute(("name", reference.as_str()));
                writer.write_event(Event::Empty(r))?;
            }
            writer.write_event(Event::End(quick_xml::events::BytesEnd::new("group")))?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new(
            "frameworkReferences",
        )))?;
    }

    if !metadata.framework_assemblies.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("frameworkAssemblies")))?;
        for fa in &metadata.framework_assemblies {
            let mut start = BytesStart::new("frameworkAssembly");
            start.push_attribute(("assemblyName", fa.assembly_name.as_str()));
            if !fa.target_frameworks.is_empty() {
                start.push_attribute(("targetFramework", fa.target_frameworks.join(", ").as_str()));
            }
            writer.write_event(Event::Empty(start))?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new(
            "frameworkAssemblies",
        )))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("metadata")))?;
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("package")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_dependency_elems<W: std::io::Write>(
    writer: &mut Writer<W>,
    dependencies: &[Dependency<impl crate::identity::PackageVersion>],
) -> Result<()> {
    for dep in dependencies {
        let mut start = BytesStart::new("dependency");
        start.push_attribute(("id", dep.id.as_str()));
        start.push_attribute(("version", dep.version_range.to_range_string().as_str()));
        writer.write_event(Event::Empty(start))?;
    }
    Ok(())
}

fn write_text_elem<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new(name)))?;
    Ok(())
}

/// Parse a `.nuspec` XML document into a [`PackageMetadata`].
///
/// Unparseable `id`/`version` values are reported as
/// [`NuGetError::InvalidVersion`]; any other structural problem is
/// [`NuGetError::InvalidManifest`].
pub fn parse_nuspec<V, F>(xml: &str) -> Result<PackageMetadata<V, F>>
where
    V: crate::identity::PackageVersion + ParseableVersion,
    F: Framework + ParseableFramework,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id = None;
    let mut version = None;
    let mut description = String::new();
    let mut authors = Vec::new();
    let mut title = None;
    let mut owners = Vec::new();
    let mut project_url = None;
    let mut icon_url = None;
    let mut license_url = None;
    let mut icon = None;
    let mut readme = None;
    let mut copyright = None;
    let mut release_notes = None;
    let mut tags = Vec::new();
    let mut language = None;
    let mut minimum_client_version = None;
    let mut repository = None;
    let mut license_metadata = None;
    let mut require_license_acceptance = false;
    let mut package_types = Vec::new();
    let mut dependency_groups: Vec<DependencyGroup<V, F>> = Vec::new();
    let mut framework_reference_groups: Vec<FrameworkReferenceGroup<F>> = Vec::new();
    let mut framework_assemblies = Vec::new();

    let mut current_dependency_group_framework: Option<Option<F>> = None;
    let mut current_dependency_group_deps: Vec<Dependency<V>> = Vec::new();
    let mut in_dependencies = false;
    let mut in_framework_references = false;
    let mut current_fwref_group_framework: Option<Option<F>> = None;
    let mut current_fwref_group_refs: Vec<String> = Vec::new();

    let mut buf = Vec::new();
    let mut text_target: Option<&'static str> = None;
    let mut text_buf = String::new();

    macro_rules! flush_text {
        () => {
            if let Some(target) = text_target.take() {
                let value = std::mem::take(&mut text_buf);
                assign_simple_field(
                    target,
                    value,
                    &mut id,
                    &mut version,
                    &mut description,
                    &mut authors,
                    &mut title,
                    &mut owners,
                    &mut project_url,
                    &mut icon_url,
                    &mut license_url,
                    &mut icon,
                    &mut readme,
                    &mut copyright,
                    &mut release_notes,
                    &mut tags,
                    &mut language,
                    &mut minimum_client_version,
                    &mut require_license_acceptance,
                    &mut license_metadata,
                )?;
            }
        };
    }

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "dependencies" => in_dependencies = true,
                    "frameworkReferences" => in_framework_references = true,
                    "group" if in_dependencies => {
                        let framework = attr(&e, "targetFramework")?
                            .map(|s| F::parse_nuspec(&s))
                            .transpose()?;
                        current_dependency_group_framework = Some(framework);
                        current_dependency_group_deps = Vec::new();
                    }
                    "group" if in_framework_references => {
                        let framework = attr(&e, "targetFramework")?
                            .map(|s| F::parse_nuspec(&s))
                            .transpose()?;
                        current_fwref_group_framework = Some(framework);
                        current_fwref_group_refs = Vec::new();
                    }
                    "license" => {
                        let kind = attr(&e, "type")?.unwrap_or_default();
                        text_target = if kind == "expression" {
                            Some("license_expression")
                        } else {
                            Some("license_file")
                        };
                    }
                    other => {
                        if matches!(
                            other,
                            "id" | "version"
                                | "description"
                                | "authors"
                                | "title"
                                | "owners"
                                | "projectUrl"
                                | "iconUrl"
                                | "licenseUrl"
                                | "icon"
                                | "readme"
                                | "copyright"
                                | "releaseNotes"
                                | "tags"
                                | "language"
                                | "minClientVersion"
                                | "requireLicenseAcceptance"
                        ) {
                            text_target = Some(match other {
                                "id" => "id",
                                "version" => "version",
                                "description" => "description",
                                "authors" => "authors",
                                "title" => "title",
                                "owners" => "owners",
                                "projectUrl" => "projectUrl",
                                "iconUrl" => "iconUrl",
                                "licenseUrl" => "licenseUrl",
                                "icon" => "icon",
                                "readme" => "readme",
                                "copyright" => "copyright",
                                "releaseNotes" => "releaseNotes",
                                "tags" => "tags",
                                "language" => "language",
                                "minClientVersion" => "minClientVersion",
                                "requireLicenseAcceptance" => "requireLicenseAcceptance",
                                _ => unreachable!(),
                            });
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "dependency" => {
                        let id_attr = attr(&e, "id")?
                            .ok_or_else(|| NuGetError::InvalidManifest("dependency missing id".into()))?;
                        let version_attr = attr(&e, "version")?;
                        let range = match version_attr {
                            Some(v) => parse_version_range::<V>(&v)?,
                            None => VersionRange { min: None, max: None },
                        };
                        current_dependency_group_deps.push(Dependency {
                            id: id_attr,
                            version_range: range,
                        });
                    }
                    "repository" => {
                        repository = Some(RepositoryInfo {
                            repo_type: attr(&e, "type")?,
                            url: attr(&e, "url")?,
                            branch: attr(&e, "branch")?,
                            commit: attr(&e, "commit")?,
                        });
                    }
                    "packageType" => {
                        package_types.push(PackageType {
                            name: attr(&e, "name")?.unwrap_or_default(),
                            version: attr(&e, "version")?,
                        });
                    }
                    "frameworkReference" => {
                        current_fwref_group_refs.push(attr(&e, "name")?.unwrap_or_default());
                    }
                    "frameworkAssembly" => {
                        let targets = attr(&e, "targetFramework")?.unwrap_or_default();
                        framework_assemblies.push(FrameworkAssembly {
                            assembly_name: attr(&e, "assemblyName")?.unwrap_or_default(),
                            target_frameworks: split_comma(&targets),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if text_target.is_some() {
                    text_buf.push_str(&e.unescape().map_err(|e| {
                        NuGetError::InvalidManifest(format!("xml text decode error: {}", e))
                    })?);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                flush_text!();
                match name.as_str() {
                    "dependencies" => {
                        in_dependencies = false;
                        if !current_dependency_group_deps.is_empty() {
                            dependency_groups.push(DependencyGroup {
                                target_framework: None,
                                dependencies: std::mem::take(&mut current_dependency_group_deps),
                            });
                        }
                    }
                    "frameworkReferences" => in_framework_references = false,
                    "group" if current_dependency_group_framework.is_some() => {
                        dependency_groups.push(DependencyGroup {
                            target_framework: current_dependency_group_framework.take().flatten(),
                            dependencies: std::mem::take(&mut current_dependency_group_deps),
                        });
                    }
                    "group" if current_fwref_group_framework.is_some() => {
                        framework_reference_groups.push(FrameworkReferenceGroup {
                            target_framework: current_fwref_group_framework.take().flatten(),
                            framework_references: std::mem::take(&mut current_fwref_group_refs),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(NuGetError::InvalidManifest(format!(
                    "xml parse error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    let id = id.ok_or_else(|| NuGetError::InvalidManifest("missing <id>".into()))?;
    let version = match version {
        Some(v) => Some(V::parse_nuspec(&v)?),
        None => None,
    };

    Ok(PackageMetadata {
        id,
        version,
        description,
        authors,
        title,
        owners,
        project_url,
        icon_url,
        license_url,
        icon,
        readme,
        copyright,
        release_notes,
        tags,
        language,
        minimum_client_version,
        repository,
        license_metadata,
        require_license_acceptance,
        package_types,
        dependency_groups,
        framework_reference_groups,
        framework_assemblies,
    })
}

#[allow(clippy::too_many_arguments)]
fn assign_simple_field(
    target: &str,
    value: String,
    id: &mut Option<String>,
    version: &mut Option<String>,
    description: &mut String,
    authors: &mut Vec<String>,
    title: &mut Option<String>,
    owners: &mut Vec<String>,
    project_url: &mut Option<String>,
    icon_url: &mut Option<String>,
    license_url: &mut Option<String>,
    icon: &mut Option<String>,
    readme: &mut Option<String>,
    copyright: &mut Option<String>,
    release_notes: &mut Option<String>,
    tags: &mut Vec<String>,
    language: &mut Option<String>,
    minimum_client_version: &mut Option<String>,
    require_license_acceptance: &mut bool,
    license_metadata: &mut Option<LicenseMetadata>,
) -> Result<()> {
    match target {
        "id" => *id = Some(value),
        "version" => *version = Some(value),
        "description" => *description = value,
        "authors" => *authors = split_comma(&value),
        "title" => *title = Some(value),
        "owners" => *owners = split_comma(&value),
        "projectUrl" => *project_url = Some(value),
        "iconUrl" => *icon_url = Some(value),
        "licenseUrl" => *license_url = Some(value),
        "icon" => *icon = Some(value),
        "readme" => *readme = Some(value),
        "copyright" => *copyright = Some(value),
        "releaseNotes" => *release_notes = Some(value),
        "tags" => *tags = split_whitespace(&value),
        "language" => *language = Some(value),
        "minClientVersion" => *minimum_client_version = Some(value),
        "requireLicenseAcceptance" => *require_license_acceptance = value == "true",
        "license_expression" => *license_metadata = Some(LicenseMetadata::Expression(value)),
        "license_file" => *license_metadata = Some(LicenseMetadata::File(value)),
        _ => {}
    }
    Ok(())
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for a in e.attributes().filter_map(|a| a.ok()) {
        if a.key.as_ref() == name.as_bytes() {
            let value = String::from_utf8(a.value.to_vec())
                .map_err(|e| NuGetError::InvalidManifest(format!("xml attribute decode error: {}", e)))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Parse a NuGet interval-notation range string, e.g. `[1.0.0, 2.0.0)`,
/// `1.0.0` (shorthand for a minimum-inclusive, unbounded range), `[1.0.0]`.
fn parse_version_range<V>(s: &str) -> Result<VersionRange<V>>
where
    V: crate::identity::PackageVersion + ParseableVersion,
{
    let s = s.trim();
    if s.is_empty() {
        return Err(NuGetError::InvalidVersion("empty version range".into()));
    }

    let min_inclusive = match s.chars().next() {
        Some('[') => true,
        Some('(') => false,
        _ => {
            // Shorthand: a bare version means minimum-inclusive, unbounded.
            let version = V::parse_nuspec(s)?;
            let range = VersionRange::at_least(version);
            range.validate()?;
            return Ok(range);
        }
    };
    let max_inclusive = match s.chars().last() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err(NuGetError::InvalidVersion(s.to_string())),
    };
    let inner = &s[1..s.len() - 1];

    if let Some((min, max)) = inner.split_once(',') {
        let min = min.trim();
        let max = max.trim();
        let min = if min.is_empty() {
            None
        } else {
            Some((V::parse_nuspec(min)?, min_inclusive))
        };
        let max = if max.is_empty() {
            None
        } else {
            Some((V::parse_nuspec(max)?, max_inclusive))
        };
        let range = VersionRange { min, max };
        range.validate()?;
        Ok(range)
    } else {
        // `[1.0.0]` exact-version shorthand.
        let version = V::parse_nuspec(inner.trim())?;
        Ok(VersionRange::exact(version))
    }
}
