// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction Policy Engine (`spec.md` §4.J).

pub mod policy;

pub use policy::{
    classify_entry, is_package_file, is_xml_doc_file, write_compressed_doc, write_if_absent,
    ExtractionAction, PackageSaveMode, XmlDocFileSaveMode,
};
