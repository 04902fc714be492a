// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Path resolvers translating a [`PackageIdentity`] plus an on-disk layout
//! into concrete filesystem paths.
//!
//! Two layouts are supported: the legacy side-by-side "V2" layout and the
//! content-addressed "V3" layout (see `spec.md` §4.A).

use std::path::PathBuf;

use crate::identity::{PackageIdentity, PackageVersion};

/// Common operations every layout resolver provides.
///
/// The Installer (§4.K) is generic over this trait so V2/V3 share the same
/// orchestration code.
pub trait PackagePathResolver<V: PackageVersion> {
    /// Directory the package is (or will be) installed into.
    fn install_path(&self, identity: &PackageIdentity<V>) -> PathBuf;

    /// Path to the `.nuspec` manifest once installed.
    fn manifest_path(&self, identity: &PackageIdentity<V>) -> PathBuf;

    /// Path to the `.nupkg` file once installed.
    fn package_file_path(&self, identity: &PackageIdentity<V>) -> PathBuf;
}

/// V2 (legacy, side-by-side) path resolver.
#[derive(Clone, Copy, Debug)]
pub struct V2PathResolver<'a> {
    pub root: &'a std::path::Path,
    pub side_by_side: bool,
}

impl<'a> V2PathResolver<'a> {
    pub fn new(root: &'a std::path::Path, side_by_side: bool) -> Self {
        Self { root, side_by_side }
    }

    fn package_dir_name<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> String {
        if self.side_by_side {
            identity.to_path_string()
        } else {
            identity.id.clone()
        }
    }

    /// `"{id}.packagedownload.marker"`, used by the protocol layer (not this
    /// crate) to track in-progress downloads.
    pub fn download_marker_path<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.install_path(identity)
            .join(format!("{}.packagedownload.marker", identity.id))
    }
}

impl<'a, V: PackageVersion> PackagePathResolver<V> for V2PathResolver<'a> {
    fn install_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.root.join(self.package_dir_name(identity))
    }

    fn manifest_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        // Original casing of the id is preserved for the manifest filename.
        self.install_path(identity)
            .join(format!("{}.nuspec", identity.id))
    }

    fn package_file_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.install_path(identity)
            .join(format!("{}.nupkg", identity.to_path_string()))
    }
}

/// V3 (content-addressed) path resolver.
#[derive(Clone, Copy, Debug)]
pub struct V3PathResolver<'a> {
    pub root: &'a std::path::Path,
    pub is_lowercase: bool,
}

impl<'a> V3PathResolver<'a> {
    pub fn new(root: &'a std::path::Path, is_lowercase: bool) -> Self {
        Self { root, is_lowercase }
    }

    fn id_segment<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> String {
        if self.is_lowercase {
            identity.id.to_lowercase()
        } else {
            identity.id.clone()
        }
    }

    fn version_segment<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> String {
        if self.is_lowercase {
            identity.version.to_normalized_lowercase()
        } else {
            identity.version.to_string()
        }
    }

    /// `.../{id}.{version}.nupkg.sha512`.
    pub fn hash_path<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> PathBuf {
        let mut p = self.package_file_path(identity).into_os_string();
        p.push(".sha512");
        PathBuf::from(p)
    }

    /// `.../.nupkg.metadata` — the V3 completion marker.
    pub fn metadata_path<V: PackageVersion>(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.install_path(identity).join(".nupkg.metadata")
    }
}

impl<'a, V: PackageVersion> PackagePathResolver<V> for V3PathResolver<'a> {
    fn install_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.root
            .join(self.id_segment(identity))
            .join(self.version_segment(identity))
    }

    fn manifest_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.install_path(identity)
            .join(format!("{}.nuspec", self.id_segment(identity)))
    }

    fn package_file_path(&self, identity: &PackageIdentity<V>) -> PathBuf {
        self.install_path(identity).join(format!(
            "{}.{}.nupkg",
            self.id_segment(identity),
            self.version_segment(identity)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::path::Path;

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

    #[test]
    fn v2_side_by_side_paths() {
        let root = Path::new("/packages");
        let resolver = V2PathResolver::new(root, true);
        let id = PackageIdentity::new("Foo", V("1.0.0")).unwrap();

        assert_eq!(resolver.install_path(&id), root.join("Foo.1.0.0"));
        assert_eq!(
            resolver.manifest_path(&id),
            root.join("Foo.1.0.0").join("Foo.nuspec")
        );
        assert_eq!(
            resolver.package_file_path(&id),
            root.join("Foo.1.0.0").join("Foo.1.0.0.nupkg")
        );
    }

    #[test]
    fn v2_flat_paths() {
        let root = Path::new("/packages");
        let resolver = V2PathResolver::new(root, false);
        let id = PackageIdentity::new("Foo", V("1.0.0")).unwrap();
        assert_eq!(resolver.install_path(&id), root.join("Foo"));
    }

    #[test]
    fn v3_lowercase_paths() {
        let root = Path::new("/global-packages");
        let resolver = V3PathResolver::new(root, true);
        let id = PackageIdentity::new("Foo", V("1.0.0")).unwrap();

        assert_eq!(
            resolver.install_path(&id),
            root.join("foo").join("1.0.0")
        );
        assert_eq!(
            resolver.package_file_path(&id),
            root.join("foo").join("1.0.0").join("foo.1.0.0.nupkg")
        );
        assert_eq!(
            resolver.hash_path(&id),
            root.join("foo")
                .join("1.0.0")
                .join("foo.1.0.0.nupkg.sha512")
        );
        assert_eq!(
            resolver.metadata_path(&id),
            root.join("foo").join("1.0.0").join(".nupkg.metadata")
        );
    }
}
