#![deny(missing_docs)]

//! Write binary data
//!
//! Tables are serialised front to back into a `WriteContext`. Fields whose value is only known
//! once later data has been laid out, such as offsets and lengths, are written as zeroed
//! placeholders first and filled in afterwards.

use std::convert::TryFrom;
use std::marker::PhantomData;

use crate::binary::read::ReadUnchecked;
use crate::binary::{I16Be, U16Be, U24Be, U32Be, U8};
use crate::error::WriteError;

/// An in-memory buffer that implements `WriteContext`.
pub struct WriteBuffer {
    data: Vec<u8>,
}

/// The bytes reserved by a placeholder, being overwritten in place.
struct WriteSlice<'a> {
    offset: usize,
    data: &'a mut [u8],
}

/// Zeroed space reserved for a `T` whose value is written later with
/// `WriteContext::write_placeholder`.
pub struct Placeholder<T, HostType>
where
    T: WriteBinary<HostType>,
{
    offset: usize,
    length: usize,
    marker: PhantomData<T>,
    host: PhantomData<HostType>,
}

/// A type with a binary representation that can be written to a `WriteContext`.
pub trait WriteBinary<HostType = Self> {
    /// What `write` hands back to the caller, usually `()`.
    type Output;

    /// Write the binary representation of `val` to `ctxt`.
    fn write<C: WriteContext>(ctxt: &mut C, val: HostType) -> Result<Self::Output, WriteError>;
}

/// Like `WriteBinary` for types whose layout depends on extra arguments.
pub trait WriteBinaryDep<HostType = Self> {
    /// The arguments that determine the layout.
    type Args;
    /// What `write_dep` hands back to the caller.
    type Output;

    /// Write the binary representation of `val` laid out according to `args`.
    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        val: HostType,
        args: Self::Args,
    ) -> Result<Self::Output, WriteError>;
}

/// A sink for binary data.
pub trait WriteContext {
    /// Write every value produced by `iter` as a `T`.
    fn write_iter<T, HostType>(
        &mut self,
        iter: impl Iterator<Item = HostType>,
    ) -> Result<(), WriteError>
    where
        Self: Sized,
        T: WriteBinary<HostType>,
    {
        iter.map(|val| T::write(self, val).map(drop)).collect()
    }

    /// Append `data`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError>;

    /// Append `count` zero bytes.
    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError>;

    /// The number of bytes written so far.
    fn bytes_written(&self) -> usize;

    /// Reserve zeroed space for a `T` to be filled in later.
    fn placeholder<'a, T, HostType>(&mut self) -> Result<Placeholder<T, HostType>, WriteError>
    where
        T: WriteBinary<HostType> + ReadUnchecked,
    {
        let offset = self.bytes_written();
        self.write_zeros(T::SIZE)?;
        Ok(Placeholder {
            offset,
            length: T::SIZE,
            marker: PhantomData,
            host: PhantomData,
        })
    }

    /// Reserve `count` consecutive placeholders for `T`.
    fn placeholder_array<'a, T, HostType>(
        &mut self,
        count: usize,
    ) -> Result<Vec<Placeholder<T, HostType>>, WriteError>
    where
        T: WriteBinary<HostType> + ReadUnchecked,
    {
        (0..count)
            .map(|_| self.placeholder::<T, HostType>())
            .collect()
    }

    /// Write `val` into the space reserved by `placeholder`.
    ///
    /// Writing more than was reserved fails with `WriteError::PlaceholderMismatch`.
    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>;
}

/// Compute the value of a 16-bit offset field pointing at `target` relative to `base`.
///
/// Both positions are absolute positions in the output. Returns `WriteError::Overflow` if the
/// distance does not fit in 16 bits.
///
/// ```
/// use opentype_codec::binary::write::offset16;
/// use opentype_codec::error::WriteError;
///
/// assert_eq!(offset16(10, 30), Ok(20));
/// assert_eq!(offset16(0, 0x10000), Err(WriteError::Overflow));
/// ```
pub fn offset16(base: usize, target: usize) -> Result<u16, WriteError> {
    let distance = target.checked_sub(base).ok_or(WriteError::BadValue)?;
    u16::try_from(distance).map_err(|_| WriteError::Overflow)
}

/// Compute the value of a 32-bit offset field pointing at `target` relative to `base`.
pub fn offset32(base: usize, target: usize) -> Result<u32, WriteError> {
    let distance = target.checked_sub(base).ok_or(WriteError::BadValue)?;
    u32::try_from(distance).map_err(|_| WriteError::Overflow)
}

impl<T, HostType> WriteBinaryDep<HostType> for T
where
    T: WriteBinary<HostType>,
{
    type Args = ();
    type Output = T::Output;

    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        val: HostType,
        (): Self::Args,
    ) -> Result<Self::Output, WriteError> {
        T::write(ctxt, val)
    }
}

macro_rules! write_big_endian {
    ($($marker:ty => $int:ty),* $(,)?) => {
        $(
            impl<T: Into<$int>> WriteBinary<T> for $marker {
                type Output = ();

                fn write<C: WriteContext>(ctxt: &mut C, val: T) -> Result<(), WriteError> {
                    ctxt.write_bytes(&val.into().to_be_bytes())
                }
            }
        )*
    };
}

write_big_endian! {
    U8 => u8,
    I16Be => i16,
    U16Be => u16,
    U32Be => u32,
}

impl<T: Into<u32>> WriteBinary<T> for U24Be {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: T) -> Result<(), WriteError> {
        match val.into().to_be_bytes() {
            [0, bytes @ ..] => ctxt.write_bytes(&bytes),
            _ => Err(WriteError::BadValue),
        }
    }
}

impl WriteContext for WriteBuffer {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError> {
        self.data.resize(self.data.len() + count, 0);
        Ok(())
    }

    fn bytes_written(&self) -> usize {
        self.data.len()
    }

    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>,
    {
        let reserved = placeholder.offset..placeholder.offset + placeholder.length;
        let data = self
            .data
            .get_mut(reserved)
            .ok_or(WriteError::PlaceholderMismatch)?;
        T::write(&mut WriteSlice { offset: 0, data }, val)
    }
}

impl<'a> WriteSlice<'a> {
    fn claim(&mut self, count: usize) -> Result<&mut [u8], WriteError> {
        let start = self.offset;
        let claimed = self
            .data
            .get_mut(start..start + count)
            .ok_or(WriteError::PlaceholderMismatch)?;
        self.offset += count;
        Ok(claimed)
    }
}

impl<'a> WriteContext for WriteSlice<'a> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.claim(data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError> {
        self.claim(count)?.fill(0);
        Ok(())
    }

    fn bytes_written(&self) -> usize {
        self.offset
    }

    fn write_placeholder<T, HostType>(
        &mut self,
        _placeholder: Placeholder<T, HostType>,
        _val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>,
    {
        Err(WriteError::NotImplemented)
    }
}

impl WriteBuffer {
    /// Create a new, empty `WriteBuffer`
    pub fn new() -> Self {
        WriteBuffer { data: Vec::new() }
    }

    /// The bytes written so far
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the bytes written
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        WriteBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;

    struct TagRecord {
        tag: u32,
        offset: u16,
    }

    impl WriteBinary<&Self> for TagRecord {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, record: &Self) -> Result<(), WriteError> {
            U32Be::write(ctxt, record.tag)?;
            U16Be::write(ctxt, record.offset)
        }
    }

    #[test]
    fn test_basic() {
        let mut ctxt = WriteBuffer::new();
        let records = [
            TagRecord {
                tag: tag::CMAP,
                offset: 1,
            },
            TagRecord {
                tag: tag::GPOS,
                offset: 0x203,
            },
        ];
        ctxt.write_iter::<TagRecord, _>(records.iter()).unwrap();
        assert_eq!(ctxt.bytes(), b"cmap\0\x01GPOS\x02\x03")
    }

    #[test]
    fn test_write_u24be() {
        let mut ctxt = WriteBuffer::new();
        U24Be::write(&mut ctxt, 0x10203u32).unwrap();
        assert_eq!(ctxt.bytes(), &[1, 2, 3]);

        // Check out of range value
        assert_eq!(U24Be::write(&mut ctxt, 0x100_0000u32), Err(WriteError::BadValue));
        assert_eq!(ctxt.bytes_written(), 3);
    }

    #[test]
    fn test_write_placeholder() {
        let mut ctxt = WriteBuffer::new();
        U8::write(&mut ctxt, 1).unwrap();
        let placeholder = ctxt.placeholder::<U16Be, u16>().unwrap();
        U8::write(&mut ctxt, 3).unwrap();
        ctxt.write_placeholder(placeholder, 2).unwrap();
        assert_eq!(ctxt.bytes(), &[1, 0, 2, 3]);
    }

    #[test]
    fn test_write_placeholder_overflow() {
        // A placeholder only accepts as many bytes as it reserved
        let mut reserved = [0xFF; 4];
        let mut slice = WriteSlice {
            offset: 0,
            data: &mut reserved,
        };
        let record = TagRecord {
            tag: tag::CMAP,
            offset: 9,
        };
        assert_eq!(
            TagRecord::write(&mut slice, &record),
            Err(WriteError::PlaceholderMismatch)
        );
        assert_eq!(slice.bytes_written(), 4);
        assert_eq!(slice.write_zeros(1), Err(WriteError::PlaceholderMismatch));
        assert_eq!(reserved, *b"cmap");
    }

    #[test]
    fn test_offset_widths() {
        assert_eq!(offset16(4, 4), Ok(0));
        assert_eq!(offset16(8, 4), Err(WriteError::BadValue));
        assert_eq!(offset32(0, 0x1_0000), Ok(0x1_0000));
    }
}
