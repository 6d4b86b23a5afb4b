#![allow(missing_docs)]

//! Parse binary data
//!
//! This module provides the basis for all table parsing in this crate. A `ReadScope` is a cheap
//! view onto an immutable byte buffer that remembers its absolute position in that buffer. A
//! `ReadCtxt` is a cursor over a scope: every primitive read advances it by the width of the value
//! read. Offsets ("pointers") stored in a table are resolved against an explicit base scope, which
//! yields a new scope and leaves the reading cursor where it was, apart from the width of the
//! offset field itself.
//!
//! Errors that describe a problem with the data itself (`ParseError::Malformed` and
//! `ParseError::UnsupportedFormat`) carry the absolute position of the data in the buffer the
//! outermost scope was created from.

use crate::binary::{I16Be, U16Be, U24Be, U32Be, Version, VersionEncoding, U8};
use crate::error::ParseError;
use crate::size;
use std::convert::TryFrom;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

/// The data ran out before a read could complete.
#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized; // default = Self

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized; // default = Self

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadFixedSizeDep: ReadBinaryDep {
    /// The number of bytes consumed by `ReadBinaryDep::read_dep` with `args`.
    fn size(args: Self::Args<'_>) -> usize;
}

/// A value with a fixed encoded width that can be decoded without per-byte bounds checks.
pub trait ReadUnchecked {
    type HostType: Sized; // default = Self

    /// The number of bytes consumed by `read_unchecked`.
    const SIZE: usize;

    /// Decode a value, consuming exactly `SIZE` bytes.
    ///
    /// # Safety
    ///
    /// The caller must ensure that at least `SIZE` bytes remain in `ctxt`.
    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> Self::HostType;
}

/// Build a record type from a tuple of fixed width fields.
pub trait ReadFrom {
    type ReadType: ReadUnchecked;
    fn read_from(value: <Self::ReadType as ReadUnchecked>::HostType) -> Self;
}

/// An offset field of a particular width.
///
/// Offsets are unsigned and relative to a base that depends on the field. The value 0 is
/// reserved to mean "absent".
pub trait ReadOffset: ReadUnchecked {
    fn to_offset(value: Self::HostType) -> Result<usize, ParseError>;
}

impl<T> ReadUnchecked for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> T {
        T::read_from(T::ReadType::read_unchecked(ctxt))
    }
}

impl<T> ReadBinary for T
where
    T: ReadUnchecked,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<T::HostType, ParseError> {
        ctxt.check_avail(T::SIZE)?;
        // SAFETY: `check_avail` succeeded for `SIZE` bytes
        Ok(unsafe { T::read_unchecked(ctxt) })
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

impl<T> ReadFixedSizeDep for T
where
    T: ReadUnchecked,
{
    fn size((): ()) -> usize {
        T::SIZE
    }
}

pub trait CheckIndex {
    fn check_index(&self, index: usize) -> Result<(), ParseError>;
}

/// A bounds-checked run of `length` items, each `stride` bytes wide, decoded on access.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixedSizeDep> {
    scope: ReadScope<'a>,
    length: usize,
    stride: usize,
    args: T::Args<'a>,
}

pub struct ReadArrayIter<'a, T: ReadUnchecked> {
    scope: ReadScope<'a>,
    stride: usize,
    indices: Range<usize>,
    phantom: PhantomData<T>,
}

pub struct ReadArrayDepIter<'a, 'b, T: ReadFixedSizeDep> {
    array: &'b ReadArray<'a, T>,
    indices: Range<usize>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { base: 0, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The absolute position of this scope in the buffer it was created from.
    pub fn base(&self) -> usize {
        self.base
    }

    /// The scope starting `offset` bytes in. Offsets past the end give an empty scope so that
    /// the failure surfaces as `BadEof` on the first read.
    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        ReadScope {
            base: self.base + offset,
            data: self.data.get(offset..).unwrap_or(&[]),
        }
    }

    /// The `length` bytes starting `offset` bytes in.
    ///
    /// Fails with `BadOffset` when a non-empty range starts at or past the end of the data, and
    /// with `BadEof` when it starts inside the data but runs off the end.
    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        let base = self.base + offset;
        match self.data.get(offset..) {
            Some(rest) if length <= rest.len() => Ok(ReadScope {
                base,
                data: &rest[..length],
            }),
            _ if length == 0 => Ok(ReadScope { base, data: &[] }),
            Some(rest) if !rest.is_empty() => Err(ParseError::BadEof),
            _ => Err(ParseError::BadOffset),
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt {
            scope: *self,
            offset: 0,
        }
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// Check a consistency condition on data just read.
    ///
    /// Returns `ParseError::Malformed` carrying the absolute position of the cursor if `cond` is
    /// `false`.
    ///
    /// ```
    /// use opentype_codec::binary::read::ReadScope;
    /// use opentype_codec::error::ParseError;
    ///
    /// let data = [0xFF, 0, 3];
    /// let mut ctxt = ReadScope::new(&data).offset(1).ctxt();
    /// let count = ctxt.read_u16be().unwrap();
    /// assert!(ctxt.check(count == 3).is_ok());
    /// assert_eq!(ctxt.check(count == 0), Err(ParseError::Malformed { offset: 3 }));
    /// ```
    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(ParseError::Malformed {
                offset: self.scope.base + self.offset,
            })
        }
    }

    /// Check a condition, returning `ParseError::BadVersion` if `false`.
    ///
    /// Intended for use in checking versions read from data. Example:
    ///
    /// ```
    /// use opentype_codec::binary::read::ReadScope;
    /// use opentype_codec::error::ParseError;
    ///
    /// let scope = ReadScope::new(&[0, 2]);
    /// let mut ctxt = scope.ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    ///
    /// assert!(ctxt.check_version(major_version == 2).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 1), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(ParseError::BadVersion)
        }
    }

    /// The scope that starts at the cursor.
    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    /// The current position of the cursor relative to the start of its scope.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    fn remaining(&self) -> usize {
        self.scope.data.len().saturating_sub(self.offset)
    }

    fn check_avail(&self, length: usize) -> Result<(), ReadEof> {
        if length <= self.remaining() {
            Ok(())
        } else {
            Err(ReadEof {})
        }
    }

    /// Take the next `N` bytes.
    ///
    /// # Safety
    ///
    /// At least `N` bytes must remain.
    unsafe fn take_unchecked<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.scope.data.get_unchecked(self.offset..self.offset + N));
        self.offset += N;
        bytes
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ReadEof> {
        self.check_avail(N)?;
        // SAFETY: `check_avail` succeeded for `N` bytes
        Ok(unsafe { self.take_unchecked::<N>() })
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.take().map(u8::from_be_bytes)
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.take().map(u16::from_be_bytes)
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.take().map(i16::from_be_bytes)
    }

    pub fn read_u24be(&mut self) -> Result<u32, ReadEof> {
        self.take().map(u24_from_be_bytes)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.take().map(u32::from_be_bytes)
    }

    /// Read a 32-bit version field laid out according to `encoding`.
    ///
    /// ```
    /// use opentype_codec::binary::read::ReadScope;
    /// use opentype_codec::binary::{Version, VersionEncoding};
    ///
    /// let scope = ReadScope::new(&[0, 1, 0, 1]);
    /// let version = scope.ctxt().read_version(VersionEncoding::MajorMinor).unwrap();
    /// assert_eq!(version, Version::new(1, 1));
    /// ```
    pub fn read_version(&mut self, encoding: VersionEncoding) -> Result<Version, ParseError> {
        let raw = self.read_u32be()?;
        Ok(Version::from_raw(raw, encoding))
    }

    /// Read an offset field of width `O`, returning `None` for the reserved value 0.
    pub fn read_offset<O: ReadOffset>(&mut self) -> Result<Option<usize>, ParseError> {
        let value = self.read::<O>()?;
        match O::to_offset(value)? {
            0 => Ok(None),
            offset => Ok(Some(offset)),
        }
    }

    /// Read an offset field of width `O` and parse a `T` at `base + offset`.
    ///
    /// The cursor only advances past the offset field. A zero offset yields `None` without
    /// touching the target.
    ///
    /// ```
    /// use opentype_codec::binary::read::ReadScope;
    /// use opentype_codec::binary::U16Be;
    ///
    /// let data = [0, 4, 0, 0, 0x12, 0x34];
    /// let scope = ReadScope::new(&data);
    /// let mut ctxt = scope.ctxt();
    /// assert_eq!(ctxt.read_pointer::<U16Be, U16Be>(scope).unwrap(), Some(0x1234));
    /// assert_eq!(ctxt.read_pointer::<U16Be, U16Be>(scope).unwrap(), None);
    /// ```
    pub fn read_pointer<O: ReadOffset, T: ReadBinaryDep<Args<'a> = ()>>(
        &mut self,
        base: ReadScope<'a>,
    ) -> Result<Option<T::HostType<'a>>, ParseError> {
        self.read_pointer_dep::<O, T>(base, ())
    }

    /// Like `read_pointer` but passes `args` to the target's reader.
    pub fn read_pointer_dep<O: ReadOffset, T: ReadBinaryDep>(
        &mut self,
        base: ReadScope<'a>,
        args: T::Args<'a>,
    ) -> Result<Option<T::HostType<'a>>, ParseError> {
        match self.read_offset::<O>()? {
            Some(offset) => base.offset(offset).read_dep::<T>(args).map(Some),
            None => Ok(None),
        }
    }

    /// Claim the bytes for `length` items of `T` and return them as an array.
    ///
    /// Fails without allocating if the data is shorter than the items claimed.
    pub fn read_array<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        self.read_array_dep::<T>(length, ())
    }

    /// Read up to `length` items, stopping early if the data runs out.
    pub fn read_array_truncated<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let fits = self.remaining() / T::SIZE;
        self.read_array(length.min(fits))
    }

    /// Like `read_array` for items whose width depends on `args`.
    ///
    /// Items that occupy no bytes at all cannot be bounded by the data, so there may be at most
    /// one per remaining byte. More than that is reported as `ParseError::Malformed`.
    pub fn read_array_dep<T: ReadFixedSizeDep>(
        &mut self,
        length: usize,
        args: T::Args<'a>,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let stride = T::size(args);
        if stride == 0 {
            self.check(length <= self.remaining())?;
        }
        let byte_length = length.checked_mul(stride).ok_or(ParseError::BadEof)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            stride,
            args,
        })
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        self.check_avail(length)?;
        let scope = self
            .scope
            .offset_length(self.offset, length)
            .map_err(|_| ReadEof {})?;
        self.offset += length;
        Ok(scope)
    }
}

fn u24_from_be_bytes([b0, b1, b2]: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, b0, b1, b2])
}

impl<'a, T: ReadFixedSizeDep> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType<'a>, ParseError> {
        if index >= self.length {
            return Err(ParseError::BadIndex);
        }
        self.scope
            .offset_length(index * self.stride, self.stride)?
            .read_dep::<T>(self.args)
    }

    pub fn get_item(&self, index: usize) -> Option<<T as ReadUnchecked>::HostType>
    where
        T: ReadUnchecked,
    {
        if index >= self.length {
            return None;
        }
        read_at::<T>(self.scope, index * self.stride)
    }

    pub fn to_vec(&self) -> Vec<<T as ReadUnchecked>::HostType>
    where
        T: ReadUnchecked,
    {
        self.iter().collect()
    }

    /// Decode every item. The first item that fails to decode aborts the read.
    pub fn read_to_vec(&self) -> Result<Vec<T::HostType<'a>>, ParseError> {
        self.iter_res().collect()
    }

    /// Check `valid` against every item.
    ///
    /// The first item that fails is reported as `ParseError::Malformed` with the item's absolute
    /// position.
    pub fn check_items<F>(&self, mut valid: F) -> Result<(), ParseError>
    where
        T: ReadUnchecked,
        F: FnMut(&<T as ReadUnchecked>::HostType) -> bool,
    {
        match self.iter().position(|item| !valid(&item)) {
            Some(index) => Err(ParseError::Malformed {
                offset: self.scope.base() + index * self.stride,
            }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T>
    where
        T: ReadUnchecked,
    {
        ReadArrayIter {
            scope: self.scope,
            stride: self.stride,
            indices: 0..self.length,
            phantom: PhantomData,
        }
    }

    pub fn iter_res<'b>(&'b self) -> ReadArrayDepIter<'a, 'b, T> {
        ReadArrayDepIter {
            array: self,
            indices: 0..self.length,
        }
    }
}

/// Decode the `T` that starts `offset` bytes into `scope`, if the scope holds all of it.
fn read_at<T: ReadUnchecked>(scope: ReadScope<'_>, offset: usize) -> Option<T::HostType> {
    let mut ctxt = scope.offset(offset).ctxt();
    ctxt.check_avail(T::SIZE).ok()?;
    // SAFETY: `check_avail` succeeded for `SIZE` bytes
    Some(unsafe { T::read_unchecked(&mut ctxt) })
}

fn check_index_below(index: usize, length: usize) -> Result<(), ParseError> {
    if index < length {
        Ok(())
    } else {
        Err(ParseError::BadIndex)
    }
}

impl<'a, T: ReadFixedSizeDep> CheckIndex for ReadArray<'a, T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        check_index_below(index, self.length)
    }
}

impl<T> CheckIndex for Vec<T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        check_index_below(index, self.len())
    }
}

impl<'a, 'b, T: ReadUnchecked> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;

    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadUnchecked> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        let index = self.indices.next()?;
        read_at::<T>(self.scope, index * self.stride)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl<'a, T: ReadUnchecked> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl<'a, 'b, T: ReadFixedSizeDep> Iterator for ReadArrayDepIter<'a, 'b, T> {
    type Item = Result<T::HostType<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.indices.next()?;
        Some(self.array.read_item(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl ReadUnchecked for U8 {
    type HostType = u8;

    const SIZE: usize = size::U8;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> u8 {
        u8::from_be_bytes(ctxt.take_unchecked())
    }
}

impl ReadUnchecked for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> u16 {
        u16::from_be_bytes(ctxt.take_unchecked())
    }
}

impl ReadUnchecked for I16Be {
    type HostType = i16;

    const SIZE: usize = size::I16;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> i16 {
        i16::from_be_bytes(ctxt.take_unchecked())
    }
}

impl ReadUnchecked for U24Be {
    type HostType = u32;

    const SIZE: usize = size::U24;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> u32 {
        u24_from_be_bytes(ctxt.take_unchecked())
    }
}

impl ReadUnchecked for U32Be {
    type HostType = u32;

    const SIZE: usize = size::U32;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> u32 {
        u32::from_be_bytes(ctxt.take_unchecked())
    }
}

impl ReadOffset for U16Be {
    fn to_offset(value: u16) -> Result<usize, ParseError> {
        Ok(usize::from(value))
    }
}

impl ReadOffset for U24Be {
    fn to_offset(value: u32) -> Result<usize, ParseError> {
        Ok(usize::try_from(value)?)
    }
}

impl ReadOffset for U32Be {
    fn to_offset(value: u32) -> Result<usize, ParseError> {
        Ok(usize::try_from(value)?)
    }
}

impl<A, B> ReadUnchecked for (A, B)
where
    A: ReadUnchecked,
    B: ReadUnchecked,
{
    type HostType = (A::HostType, B::HostType);

    const SIZE: usize = A::SIZE + B::SIZE;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> Self::HostType {
        let a = A::read_unchecked(ctxt);
        (a, B::read_unchecked(ctxt))
    }
}

impl<A, B, C> ReadUnchecked for (A, B, C)
where
    A: ReadUnchecked,
    B: ReadUnchecked,
    C: ReadUnchecked,
{
    type HostType = (A::HostType, B::HostType, C::HostType);

    const SIZE: usize = A::SIZE + B::SIZE + C::SIZE;

    unsafe fn read_unchecked<'a>(ctxt: &mut ReadCtxt<'a>) -> Self::HostType {
        let a = A::read_unchecked(ctxt);
        let b = B::read_unchecked(ctxt);
        (a, b, C::read_unchecked(ctxt))
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixedSizeDep,
    T::HostType<'a>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.read_to_vec().map_err(|_| fmt::Error)?;
        f.debug_list().entries(items).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u24be() {
        let scope = ReadScope::new(&[1, 2, 3]);
        assert_eq!(scope.read::<U24Be>().unwrap(), 0x10203);
    }

    // Tests that offset_length does not panic when length is 0 but offset is out-of-bounds
    #[test]
    fn test_offset_length_oob() {
        let scope = ReadScope::new(&[1, 2, 3]);
        assert!(scope.offset_length(99, 0).is_ok());
        assert_eq!(scope.offset_length(3, 1), Err(ParseError::BadOffset));
        assert_eq!(scope.offset_length(2, 2), Err(ParseError::BadEof));
        assert_eq!(scope.offset_length(1, 2).unwrap().data(), &[2, 3]);
    }

    #[test]
    fn test_read_past_end() {
        let scope = ReadScope::new(&[1]);
        assert_eq!(scope.read::<U16Be>(), Err(ParseError::BadEof));
    }

    #[test]
    fn test_read_array_count_exceeds_data() {
        // A declared count larger than the data must fail before anything is allocated
        let mut ctxt = ReadScope::new(&[0, 1, 0, 2]).ctxt();
        assert!(ctxt.read_array::<U32Be>(usize::MAX / 2).is_err());
        assert!(ctxt.read_array::<U16Be>(3).is_err());
        assert_eq!(ctxt.read_array::<U16Be>(2).unwrap().to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_read_array_truncated() {
        let mut ctxt = ReadScope::new(&[0, 1, 0, 2, 0]).ctxt();
        let array = ctxt.read_array_truncated::<U16Be>(10).unwrap();
        assert_eq!(array.to_vec(), vec![1, 2]);
        assert_eq!(ctxt.position(), 4);
    }

    #[test]
    fn test_check_items_reports_item_position() {
        let data = [0xAA, 0xAA, 0, 1, 0, 5, 0, 3];
        let mut ctxt = ReadScope::new(&data).offset(2).ctxt();
        let pairs = ctxt.read_array::<(U16Be, U16Be)>(1).unwrap();
        assert!(pairs.check_items(|&(first, last)| first <= last).is_ok());

        let values = ReadScope::new(&data).offset(2).ctxt().read_array::<U16Be>(3).unwrap();
        assert_eq!(
            values.check_items(|&value| value < 4),
            Err(ParseError::Malformed { offset: 4 })
        );
    }

    #[test]
    fn test_pointer_zero_is_absent() {
        // The target of a zero offset is never read, even if reading it would fail
        let scope = ReadScope::new(&[0, 0, 0, 0]);
        let mut ctxt = scope.ctxt();
        assert_eq!(ctxt.read_pointer::<U32Be, U32Be>(scope).unwrap(), None);
        assert_eq!(ctxt.position(), 4);
    }

    #[test]
    fn test_pointer_advances_by_field_width() {
        let data = [0, 0, 5, 0, 0, 0xAB, 0xCD];
        let scope = ReadScope::new(&data);

        let mut ctxt = scope.ctxt();
        let value = ctxt.read_pointer::<U24Be, U16Be>(scope).unwrap();
        assert_eq!(value, Some(0xABCD));
        assert_eq!(ctxt.position(), 3);

        let mut ctxt = scope.offset(1).ctxt();
        let value = ctxt.read_pointer::<U16Be, U16Be>(scope).unwrap();
        assert_eq!(value, Some(0xABCD));
        assert_eq!(ctxt.position(), 2);
    }

    #[test]
    fn test_pointer_out_of_bounds() {
        let scope = ReadScope::new(&[0, 200]);
        let mut ctxt = scope.ctxt();
        assert_eq!(
            ctxt.read_pointer::<U16Be, U16Be>(scope),
            Err(ParseError::BadEof)
        );
    }

    #[test]
    fn test_read_version() {
        let scope = ReadScope::new(&[0x00, 0x00, 0x50, 0x00]);
        let version = scope.ctxt().read_version(VersionEncoding::Fixed).unwrap();
        assert_eq!(version, Version::new(0, 5));

        let scope = ReadScope::new(&[0x00, 0x01, 0x00, 0x00]);
        let version = scope.ctxt().read_version(VersionEncoding::MajorMinor).unwrap();
        assert_eq!(version, Version::new(1, 0));
    }
}
