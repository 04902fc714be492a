// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The full `.nuspec` metadata model (`spec.md` §3 `PackageMetadata`).

use std::fmt;

use crate::error::{NuGetError, Result};
use crate::identity::PackageVersion;

/// An opaque, comparable target-framework tag. Framework parsing lives
/// outside this crate (`spec.md` §1); we only need equality, a display
/// form, and an "any framework" predicate.
pub trait Framework: Clone + fmt::Debug + fmt::Display + PartialEq {
    fn is_any(&self) -> bool;
}

/// A dependency version range. Bounds, when present, carry an inclusive
/// flag. The version type itself is opaque (external collaborator).
#[derive(Clone, Debug, PartialEq)]
pub struct VersionRange<V> {
    pub min: Option<(V, bool)>,
    pub max: Option<(V, bool)>,
}

impl<V: PackageVersion> VersionRange<V> {
    pub fn exact(version: V) -> Self {
        Self {
            min: Some((version.clone(), true)),
            max: Some((version, true)),
        }
    }

    pub fn at_least(version: V) -> Self {
        Self {
            min: Some((version, true)),
            max: None,
        }
    }

    /// `spec.md` §3 invariant: if both bounds present, `max >= min`; if both
    /// exclusive, `min != max`.
    pub fn validate(&self) -> Result<()> {
        if let (Some((min, min_inc)), Some((max, max_inc))) = (&self.min, &self.max) {
            if max < min {
                return Err(NuGetError::ValidationFailed(
                    "dependency version range max is less than min".into(),
                ));
            }
            if !min_inc && !max_inc && min == max {
                return Err(NuGetError::ValidationFailed(
                    "dependency version range has equal exclusive bounds".into(),
                ));
            }
        }
        Ok(())
    }

    /// Whether this range pins a single exact version (both bounds present,
    /// both inclusive, and equal) — used by satellite detection (§4.K).
    pub fn is_exact(&self) -> Option<&V> {
        match (&self.min, &self.max) {
            (Some((min, true)), Some((max, true))) if min == max => Some(min),
            _ => None,
        }
    }

    /// Render in NuGet interval notation, e.g. `[13.0.0, )`, `[1.0.0]`.
    pub fn to_range_string(&self) -> String {
        match (&self.min, &self.max) {
            (Some((v, true)), None) => format!("[{}, )", v),
            (Some((v, false)), None) => format!("({}, )", v),
            (None, Some((v, true))) => format!("(, {}]", v),
            (None, Some((v, false))) => format!("(, {})", v),
            (Some((min, min_inc)), Some((max, max_inc))) => {
                if min == max && *min_inc && *max_inc {
                    format!("[{}]", min)
                } else {
                    let l = if *min_inc { '[' } else { '(' };
                    let r = if *max_inc { ']' } else { ')' };
                    format!("{}{}, {}{}", l, min, max, r)
                }
            }
            (None, None) => "(, )".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dependency<V> {
    pub id: String,
    pub version_range: VersionRange<V>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DependencyGroup<V, F> {
    pub target_framework: Option<F>,
    pub dependencies: Vec<Dependency<V>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameworkReferenceGroup<F> {
    pub target_framework: Option<F>,
    pub framework_references: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameworkAssembly {
    pub assembly_name: String,
    pub target_frameworks: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryInfo {
    pub repo_type: Option<String>,
    pub url: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LicenseMetadata {
    Expression(String),
    File(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PackageType {
    pub name: String,
    pub version: Option<String>,
}

/// The full `.nuspec` manifest contents.
#[derive(Clone, Debug, PartialEq)]
pub struct PackageMetadata<V, F> {
    pub id: String,
    pub version: Option<V>,
    pub description: String,
    pub authors: Vec<String>,
    pub title: Option<String>,
    pub owners: Vec<String>,
    pub project_url: Option<String>,
    pub icon_url: Option<String>,
    pub license_url: Option<String>,
    pub icon: Option<String>,
    pub readme: Option<String>,
    pub copyright: Option<String>,
    pub release_notes: Option<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub minimum_client_version: Option<String>,
    pub repository: Option<RepositoryInfo>,
    pub license_metadata: Option<LicenseMetadata>,
    pub require_license_acceptance: bool,
    pub package_types: Vec<PackageType>,
    pub dependency_groups: Vec<DependencyGroup<V, F>>,
    pub framework_reference_groups: Vec<FrameworkReferenceGroup<F>>,
    pub framework_assemblies: Vec<FrameworkAssembly>,
}

impl<V: PackageVersion, F: Framework> PackageMetadata<V, F> {
    /// Validate the build-time invariants of `spec.md` §3. Does not check
    /// icon/readme file-entry resolution — that requires the file manifest
    /// and is performed by the archive builder (§4.E) instead.
    pub fn validate(&self) -> Result<()> {
        crate::identity::validate_package_id(&self.id)?;

        if self.version.is_none() {
            return Err(NuGetError::ValidationFailed("version is required".into()));
        }

        if self.description.is_empty() {
            return Err(NuGetError::ValidationFailed(
                "description is required".into(),
            ));
        }

        if self.authors.is_empty() {
            return Err(NuGetError::ValidationFailed("authors is required".into()));
        }

        for group in &self.dependency_groups {
            let mut seen = std::collections::HashSet::new();
            for dep in &group.dependencies {
                if dep.id.to_lowercase() == self.id.to_lowercase() {
                    return Err(NuGetError::ValidationFailed(format!(
                        "package cannot depend on itself: {}",
                        dep.id
                    )));
                }
                if !seen.insert(dep.id.to_lowercase()) {
                    return Err(NuGetError::ValidationFailed(format!(
                        "duplicate dependency id in group: {}",
                        dep.id
                    )));
                }
                dep.version_range.validate()?;
            }
        }

        if self.require_license_acceptance {
            let has_url = self.license_url.is_some();
            let has_metadata = self.license_metadata.is_some();
            if has_url == has_metadata {
                return Err(NuGetError::ValidationFailed(
                    "require_license_acceptance requires exactly one of license_url or license_metadata".into(),
                ));
            }
        }

        Ok(())
    }

    /// Whether this package has any dependency group targeting a concrete
    /// (non-`is_any`) framework — drives nuspec schema-version selection.
    pub fn has_concrete_framework_dependency_group(&self) -> bool {
        self.dependency_groups
            .iter()
            .any(|g| g.target_framework.as_ref().is_some_and(|f| !f.is_any()))
    }

    /// Whether this package has any framework-reference group targeting a
    /// concrete framework.
    pub fn has_concrete_framework_reference_group(&self) -> bool {
        self.framework_reference_groups
            .iter()
            .any(|g| g.target_framework.as_ref().is_some_and(|f| !f.is_any()))
    }
}
