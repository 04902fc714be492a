// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.nuspec` manifest data model, schema selection, and XML codec
//! (`spec.md` §3, §4.B).

pub mod model;
pub mod schema;
pub mod xml;

pub use model::{
    Dependency, DependencyGroup, Framework, FrameworkAssembly, FrameworkReferenceGroup,
    LicenseMetadata, PackageMetadata, PackageType, RepositoryInfo, VersionRange,
};
pub use schema::select_namespace;
pub use xml::{emit_nuspec, parse_nuspec, ParseableFramework, ParseableVersion};
