// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Installer V2/V3 (`spec.md` §4.K).

pub mod satellite;
pub mod v2;
pub mod v3;

pub use satellite::{merge_into_runtime, satellite_runtime_identity};
pub use v2::{extract_v2, V2ExtractionOptions};
pub use v3::{install_v3, V3InstallOptions};
