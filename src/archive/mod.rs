// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `.nupkg` archive view: reading (§4.D) and building (§4.E).

pub mod builder;
pub mod reader;

pub use builder::PackageArchiveBuilder;
pub use reader::PackageArchive;

/// The nine payload folder prefixes a `.nupkg` may carry (`spec.md` §4.D).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderKind {
    Lib,
    Ref,
    Runtimes,
    Content,
    ContentFiles,
    Build,
    BuildTransitive,
    Tools,
    Analyzers,
}

impl FolderKind {
    pub const ALL: [FolderKind; 9] = [
        FolderKind::Lib,
        FolderKind::Ref,
        FolderKind::Runtimes,
        FolderKind::Content,
        FolderKind::ContentFiles,
        FolderKind::Build,
        FolderKind::BuildTransitive,
        FolderKind::Tools,
        FolderKind::Analyzers,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            FolderKind::Lib => "lib/",
            FolderKind::Ref => "ref/",
            FolderKind::Runtimes => "runtimes/",
            FolderKind::Content => "content/",
            FolderKind::ContentFiles => "contentFiles/",
            FolderKind::Build => "build/",
            FolderKind::BuildTransitive => "buildTransitive/",
            FolderKind::Tools => "tools/",
            FolderKind::Analyzers => "analyzers/",
        }
    }

    /// Whether a (POSIX, possibly mixed-case) archive path falls under this
    /// folder.
    pub fn matches(self, path: &str) -> bool {
        let normalized = path.replace('\\', "/").to_lowercase();
        normalized.starts_with(self.prefix().to_lowercase().as_str())
    }

    /// The folder, if any, that `path` falls under.
    pub fn classify(path: &str) -> Option<FolderKind> {
        Self::ALL.into_iter().find(|folder| folder.matches(path))
    }
}

/// Whether `path` names one of the parts the OPC/signature subsystem owns
/// rather than payload (`spec.md` §4.D).
pub fn is_package_metadata(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let lower = normalized.to_lowercase();

    if lower == ".signature.p7s" {
        return true;
    }
    if lower.starts_with("_rels/") {
        return true;
    }
    if lower == "[content_types].xml" {
        return true;
    }
    if lower.starts_with("package/services/metadata/core-properties/") {
        return true;
    }
    if lower.ends_with(".nuspec") && !lower.contains('/') {
        return true;
    }

    false
}
