// SPDX-License-Identifier: GPL-3.0-only

//! Derive macro for the btrfs-subvol binary struct decoder
//!
//! `#[derive(Record)]` turns a struct with named fields into a decodable record:
//! it emits the record's schema table (field name, width, optional absolute
//! offset, extended flag) and a decode routine that reads every field in
//! declaration order from a `ByteSource`.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[derive(Debug, Default, Record)]
//! pub struct RootItem {
//!     #[record(seek = 0xa0)]
//!     pub generation: u64,
//!     pub root_dirid: u64,
//!     #[record(extended)]
//!     pub uuid: Uuid,
//! }
//! ```
//!
//! Field attributes:
//! - `seek = N` repositions the source to absolute byte offset `N` before the read.
//! - `extended` marks a field that only exists in the full on-disk layout. When the
//!   source is shorter than the schema's extent, extended fields take their
//!   `Default` value instead of being read.
//!
//! Every field type must implement `btrfs_subvol::decode::Field`; nested records get
//! that impl from this same derive.

mod emit;
mod parse;
mod transform;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

use transform::collect_fields;

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    match collect_fields(&input) {
        Ok(fields) => emit::emit_record(&input, &fields).into(),
        Err(error) => error.to_compile_error().into(),
    }
}
