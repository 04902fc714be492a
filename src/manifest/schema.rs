// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.nuspec` schema namespace selection (`spec.md` §4.B, §6.1).

use crate::identity::PackageVersion;
use crate::manifest::model::{Framework, PackageMetadata};

/// The six permitted `.nuspec` namespaces, oldest to newest.
pub const NAMESPACE_V1: &str = "http://schemas.microsoft.com/packaging/2010/07/nuspec.xsd";
pub const NAMESPACE_V2: &str = "http://schemas.microsoft.com/packaging/2011/08/nuspec.xsd";
pub const NAMESPACE_V3: &str = "http://schemas.microsoft.com/packaging/2011/10/nuspec.xsd";
pub const NAMESPACE_V4: &str = "http://schemas.microsoft.com/packaging/2012/06/nuspec.xsd";
pub const NAMESPACE_V5: &str = "http://schemas.microsoft.com/packaging/2013/01/nuspec.xsd";
pub const NAMESPACE_V6: &str = "http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd";

/// Selects the minimum schema namespace covering the features used, per the
/// dominance rule of `spec.md` §4.B:
///
/// 1. any framework-reference group with a concrete framework → V5
/// 2. any dependency group with a concrete framework → V4
/// 3. version is prerelease → V3
/// 4. otherwise → V6 (newest, default)
pub fn select_namespace<V: PackageVersion, F: Framework>(
    metadata: &PackageMetadata<V, F>,
) -> &'static str {
    if metadata.has_concrete_framework_reference_group() {
        return NAMESPACE_V5;
    }

    if metadata.has_concrete_framework_dependency_group() {
        return NAMESPACE_V4;
    }

    if metadata
        .version
        .as_ref()
        .is_some_and(PackageVersion::is_prerelease)
    {
        return NAMESPACE_V3;
    }

    NAMESPACE_V6
}
