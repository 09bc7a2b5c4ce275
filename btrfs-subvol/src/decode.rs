// SPDX-License-Identifier: GPL-3.0-only

//! Schema-driven decoding of kernel byte layouts
//!
//! Every record type carries a static [`Schema`] (generated by
//! `#[derive(Record)]`) listing its fields in declaration order together with
//! their width, an optional absolute offset and whether the field belongs to
//! the extended tail of the layout. Decoding walks that table against a
//! [`ByteSource`]:
//!
//! - integers are unsigned little-endian of width 1, 2, 4 or 8
//! - fixed byte blocks (`[u8; N]`, `Uuid`) are copied raw, no byte swapping
//! - nested records recurse with the same cursor
//! - a field with a seek offset repositions the source first, which fails on
//!   sources that cannot seek
//! - extended fields are only read when the source covers the full schema
//!   extent counted from the record's first byte; on shorter (legacy) items
//!   they take their `Default` value

use std::io::{self, Read};

use thiserror::Error;
use uuid::Uuid;

pub use btrfs_subvol_macros::Record;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, have {available}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("invalid seek to offset {offset} in a {len}-byte buffer")]
    InvalidSeek { offset: usize, len: usize },

    #[error("seek to offset {offset} on a non-seekable source")]
    NotSeekable { offset: usize },

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Shape of a single field
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    Bytes(usize),
    Record(fn() -> &'static Schema),
}

impl FieldKind {
    /// Number of bytes a field of this kind consumes. Nested records report
    /// the extent of their full layout.
    pub fn width(&self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(len) => *len,
            FieldKind::Record(schema) => schema().extent(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub seek: Option<usize>,
    pub extended: bool,
}

/// Ordered field table of a record
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Byte offset just past the furthest field of the full layout.
    pub fn extent(&self) -> usize {
        self.extent_where(|_| true)
    }

    /// Extent of the layout without its extended tail.
    pub fn base_extent(&self) -> usize {
        self.extent_where(|field| !field.extended)
    }

    /// Offset at which `name` is read when decoding the full layout.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut position = 0;
        for field in self.fields {
            position = field.seek.unwrap_or(position);
            if field.name == name {
                return Some(position);
            }
            position += field.kind.width();
        }
        None
    }

    fn extent_where(&self, include: impl Fn(&FieldSpec) -> bool) -> usize {
        let mut position = 0;
        let mut end = 0;
        for field in self.fields.iter().filter(|field| include(field)) {
            position = field.seek.unwrap_or(position) + field.kind.width();
            end = end.max(position);
        }
        end
    }
}

/// A type that can be read as one field of a record
pub trait Field: Sized {
    const KIND: FieldKind;

    fn read<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, DecodeError>;
}

/// A type with a schema; implemented by `#[derive(Record)]`
pub trait Record: Sized {
    fn schema() -> &'static Schema;

    fn decode<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, DecodeError>;
}

pub trait ByteSource {
    /// Fill `buf` from the current position, advancing past it.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), DecodeError>;

    fn position(&self) -> usize;

    fn seek_to(&mut self, offset: usize) -> Result<(), DecodeError> {
        Err(DecodeError::NotSeekable { offset })
    }

    /// Whether the source holds at least `end` bytes from its start. Records
    /// pass their own start position plus their extent, so nested records are
    /// measured from where they begin. Sources of unknown length answer
    /// `true` and fail on the actual read instead.
    fn covers(&self, _end: usize) -> bool {
        true
    }
}

macro_rules! le_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Field for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn read<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, DecodeError> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    source.read_into(&mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )*
    };
}

le_field!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);

impl<const N: usize> Field for [u8; N] {
    const KIND: FieldKind = FieldKind::Bytes(N);

    fn read<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, DecodeError> {
        let mut buf = [0u8; N];
        source.read_into(&mut buf)?;
        Ok(buf)
    }
}

impl Field for Uuid {
    const KIND: FieldKind = FieldKind::Bytes(16);

    fn read<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, DecodeError> {
        <[u8; 16]>::read(source).map(Uuid::from_bytes)
    }
}

/// Bounds-checked, seekable cursor over a byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let Some(end) = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
        else {
            return Err(DecodeError::InsufficientData {
                needed: len,
                offset: self.position,
                available: self.remaining(),
            });
        };
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }
}

impl ByteSource for ByteCursor<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let bytes = self.take(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek_to(&mut self, offset: usize) -> Result<(), DecodeError> {
        if offset > self.data.len() {
            return Err(DecodeError::InvalidSeek {
                offset,
                len: self.data.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    fn covers(&self, end: usize) -> bool {
        end <= self.data.len()
    }
}

/// Forward-only source over any reader; seek offsets are rejected
pub struct StreamSource<R> {
    reader: R,
    position: usize,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(DecodeError::InsufficientData {
                        needed: buf.len(),
                        offset: self.position,
                        available: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled;
        Ok(())
    }

    fn position(&self) -> usize {
        self.position
    }
}

/// Decode a record from an item payload. An empty payload yields the default
/// record, matching items the kernel returns without a body.
pub fn decode_payload<R: Record + Default>(payload: &[u8]) -> Result<R, DecodeError> {
    if payload.is_empty() {
        return Ok(R::default());
    }
    R::decode(&mut ByteCursor::new(payload))
}
