// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Package identity and the package-ID grammar.

use std::fmt;

use crate::error::{NuGetError, Result};

const MAX_ID_LENGTH: usize = 100;

/// Validates a package id against the grammar `[A-Za-z_][A-Za-z0-9._-]*`,
/// maximum 100 characters.
pub fn validate_package_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return Err(NuGetError::InvalidPackageId(id.to_string()));
    }

    let mut chars = id.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(NuGetError::InvalidPackageId(id.to_string()));
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(NuGetError::InvalidPackageId(id.to_string()));
    }

    Ok(())
}

/// An opaque, comparable package version.
///
/// Version parsing/range algebra is an external collaborator (see `spec.md`
/// §1); this crate treats versions as an opaque value with parse/compare/
/// to_string/is_prerelease.
pub trait PackageVersion: Clone + fmt::Debug + fmt::Display + Eq + Ord {
    /// Whether this version is a prerelease version (affects nuspec schema
    /// selection, see [`crate::manifest::schema::select_namespace`]).
    fn is_prerelease(&self) -> bool;

    /// The normalized, lowercase rendering used in V3 filesystem paths.
    fn to_normalized_lowercase(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// The identity of a package: an (id, version) pair.
///
/// Identity equality is the tuple identity. Rendered as `"{id}
/// {version}"` in diagnostics and `"{id}.{version}"` in filesystem paths.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PackageIdentity<V> {
    pub id: String,
    pub version: V,
}

impl<V: PackageVersion> PackageIdentity<V> {
    /// Construct a new identity, validating the id grammar.
    pub fn new(id: impl Into<String>, version: V) -> Result<Self> {
        let id = id.into();
        validate_package_id(&id)?;
        Ok(Self { id, version })
    }

    /// Diagnostic rendering: `"{id} {version}"`.
    pub fn to_diagnostic_string(&self) -> String {
        format!("{} {}", self.id, self.version)
    }

    /// Filesystem rendering: `"{id}.{version}"`.
    pub fn to_path_string(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

impl<V: PackageVersion> fmt::Display for PackageIdentity<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic_string())
    }
}
