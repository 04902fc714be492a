// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives for reading, writing, and installing NuGet packages.
//!
//! This crate implements the systems content of a NuGet-compatible package
//! toolchain: the binary `.nupkg` container (ZIP plus Open Packaging
//! Conventions plus a `.nuspec` manifest), the legacy and content-addressed
//! on-disk installer layouts with their atomic install protocol, the
//! extraction policy that decides what gets written to disk, and the
//! two-tier cache used to back package resolution.
//!
//! Version parsing, range algebra, and target-framework parsing are
//! deliberately out of scope; this crate consumes them as opaque types
//! through the [`identity::PackageVersion`] and [`manifest::Framework`]
//! traits, so any caller's own version/framework implementation plugs in
//! directly.
//!
//! # Layout
//!
//! - [`archive`] — reading ([`archive::PackageArchive`]) and building
//!   ([`archive::PackageArchiveBuilder`]) `.nupkg` files.
//! - [`manifest`] — the `.nuspec` data model and its XML (de)serialization.
//! - [`opc`] — Open Packaging Conventions parts (`[Content_Types].xml`,
//!   `_rels/.rels`, core properties) written alongside a `.nuspec`.
//! - [`extraction`] — the save-mode and XML-documentation extraction policy
//!   shared by both installer layouts.
//! - [`install`] — the V2 (side-by-side) and V3 (content-addressed) install
//!   protocols, plus satellite package detection/merge.
//! - [`cache`] — the in-memory, disk, and composed two-tier caches.
//! - [`lock`] — the cross-process advisory file lock the V3 installer uses
//!   to serialize concurrent installs of the same package.
//! - [`identity`], [`path_resolver`], [`paths`], [`file_manifest`] — shared
//!   value types and path-normalization helpers used throughout.
//! - [`signing`] — the signature-verifier interface invoked by `install_v3`.
//! - [`config`] — environment-driven knobs.

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod extraction;
pub mod file_manifest;
pub mod identity;
pub mod install;
pub mod lock;
pub mod manifest;
pub mod opc;
pub mod path_resolver;
pub mod paths;
pub mod signing;

pub use error::{NuGetError, Result};
pub use identity::{PackageIdentity, PackageVersion};
pub use manifest::{Framework, PackageMetadata};
