// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signature verifier interface (`spec.md` §6.4).

use std::fs::File;

use crate::archive::PackageArchive;
use crate::error::Result;

/// Verifies the signature of an opened archive before extraction begins.
/// Implementations must be idempotent and perform no filesystem side
/// effects — verification reasons about bytes already in memory/the open
/// archive, nothing else. Fixed over `File` (rather than generic over
/// `Read + Seek`) so the installer can hold one as `dyn SignatureVerifier`;
/// `install_v3` is the only caller, and it always opens the temp `.nupkg`
/// as a `File`.
pub trait SignatureVerifier {
    fn verify(&self, archive: &mut PackageArchive<File>) -> Result<()>;
}

/// A verifier that accepts anything, for callers that don't need signature
/// enforcement (e.g. local/offline feeds).
pub struct NoopVerifier;

impl SignatureVerifier for NoopVerifier {
    fn verify(&self, _archive: &mut PackageArchive<File>) -> Result<()> {
        Ok(())
    }
}
