// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Bounded views over contiguous memory: either aliases of engine-owned pages,
//! valid only while the owning transaction's epoch stands still, or locally
//! allocated staging buffers that can grow.

use std::{
    cell::Cell,
    rc::Rc,
    slice,
    str,
};

use byteorder::{
    BigEndian,
    ByteOrder,
};
use log::trace;
use paste::paste;

use crate::error::{
    Error,
    Result,
};

/// A per-transaction counter advanced by every event that can invalidate
/// engine memory aliases: cursor navigation, writes, reset, renew, and the
/// end of the transaction itself.
#[derive(Clone, Debug, Default)]
pub(crate) struct Epoch {
    cell: Rc<Cell<u64>>,
}

impl Epoch {
    pub(crate) fn advance(&self) {
        self.cell.set(self.cell.get().wrapping_add(1));
    }

    pub(crate) fn lease(&self) -> Lease {
        Lease {
            epoch: self.clone(),
            stamp: self.cell.get(),
        }
    }
}

/// A recorded epoch snapshot. A borrowed span refuses access once the epoch
/// it was minted under has moved on.
#[derive(Clone, Debug)]
pub(crate) struct Lease {
    epoch: Epoch,
    stamp: u64,
}

impl Lease {
    pub(crate) fn is_current(&self) -> bool {
        self.epoch.cell.get() == self.stamp
    }
}

#[derive(Clone, Debug)]
enum Repr {
    Borrowed {
        data: *const u8,
        len: usize,
        lease: Lease,
    },
    Owned {
        buf: Vec<u8>,
        growable: bool,
    },
}

/// An address+length view over a contiguous region of memory.
///
/// Borrowed spans alias memory owned by the engine and stay readable only
/// until the next cursor navigation, write, or transaction state change;
/// accessing one after that fails with [`Error::StaleSpan`] rather than
/// touching a superseded address. Owned spans are local allocations, writable
/// and (unless fixed) growable.
///
/// Multi-byte accessors default to big-endian, the only fixed-width integer
/// encoding that sorts numerically under the engine's byte-wise key
/// comparison; each has an `_order` variant taking an explicit [`ByteOrder`].
#[derive(Clone, Debug)]
pub struct RawSpan {
    repr: Repr,
}

fn grow(buf: &mut Vec<u8>, required: usize) {
    let mut capacity = buf.len().max(1);
    while capacity < required {
        capacity *= 2;
    }
    trace!("growing owned span from {} to {} bytes", buf.len(), capacity);
    buf.resize(capacity, 0);
}

macro_rules! scalar_accessors {
    ($(($name:ident, $ty:ty, $size:expr, $read:ident, $write:ident),)+) => {
        $(
            paste! {
                #[doc = concat!("Reads a big-endian `", stringify!($ty), "` at `offset`.")]
                pub fn [<get_ $name>](&self, offset: usize) -> Result<$ty> {
                    self.[<get_ $name _order>]::<BigEndian>(offset)
                }

                #[doc = concat!("Reads a `", stringify!($ty), "` at `offset` in the order `O`.")]
                pub fn [<get_ $name _order>]<O: ByteOrder>(&self, offset: usize) -> Result<$ty> {
                    Ok(O::$read(self.read_exact(offset, $size)?))
                }

                #[doc = concat!("Writes a big-endian `", stringify!($ty), "` at `offset`.")]
                pub fn [<put_ $name>](&mut self, offset: usize, value: $ty) -> Result<()> {
                    self.[<put_ $name _order>]::<BigEndian>(offset, value)
                }

                #[doc = concat!("Writes a `", stringify!($ty), "` at `offset` in the order `O`.")]
                pub fn [<put_ $name _order>]<O: ByteOrder>(&mut self, offset: usize, value: $ty) -> Result<()> {
                    O::$write(self.write_slot(offset, $size)?, value);
                    Ok(())
                }
            }
        )+
    };
}

impl RawSpan {
    /// Allocates an owned, growable span of `capacity` zeroed bytes.
    pub fn owned(capacity: usize) -> RawSpan {
        RawSpan {
            repr: Repr::Owned {
                buf: vec![0; capacity],
                growable: true,
            },
        }
    }

    /// Allocates an owned span whose capacity is a hard ceiling; writes past
    /// it fail instead of growing.
    pub fn owned_fixed(capacity: usize) -> RawSpan {
        RawSpan {
            repr: Repr::Owned {
                buf: vec![0; capacity],
                growable: false,
            },
        }
    }

    pub(crate) fn borrowed(data: *const u8, len: usize, lease: Lease) -> RawSpan {
        RawSpan {
            repr: Repr::Borrowed {
                data,
                len,
                lease,
            },
        }
    }

    /// The span's length in bytes. This is metadata; it remains queryable
    /// even on a stale borrowed span.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Borrowed {
                len, ..
            } => *len,
            Repr::Owned {
                buf, ..
            } => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.repr, Repr::Borrowed { .. })
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.repr, Repr::Owned { .. })
    }

    fn oob(&self, offset: usize, requested: usize) -> Error {
        Error::OutOfBounds {
            offset,
            requested,
            len: self.len(),
        }
    }

    fn read_exact(&self, offset: usize, size: usize) -> Result<&[u8]> {
        let end = offset.checked_add(size).ok_or_else(|| self.oob(offset, size))?;
        match &self.repr {
            Repr::Owned {
                buf, ..
            } => {
                if end > buf.len() {
                    return Err(self.oob(offset, size));
                }
                Ok(&buf[offset..end])
            },
            Repr::Borrowed {
                data,
                len,
                lease,
            } => {
                if !lease.is_current() {
                    return Err(Error::StaleSpan);
                }
                if end > *len {
                    return Err(self.oob(offset, size));
                }
                // The lease was verified above and nothing on this thread can
                // advance the epoch before the caller consumes the bytes.
                Ok(unsafe { slice::from_raw_parts(data.add(offset), size) })
            },
        }
    }

    fn write_slot(&mut self, offset: usize, size: usize) -> Result<&mut [u8]> {
        let len = self.len();
        let end = offset.checked_add(size).ok_or(Error::OutOfBounds {
            offset,
            requested: size,
            len,
        })?;
        match &mut self.repr {
            Repr::Borrowed {
                ..
            } => Err(Error::BorrowedSpan),
            Repr::Owned {
                buf,
                growable,
            } => {
                if end > buf.len() {
                    if !*growable {
                        return Err(Error::OutOfBounds {
                            offset,
                            requested: size,
                            len,
                        });
                    }
                    grow(buf, end);
                }
                Ok(&mut buf[offset..end])
            },
        }
    }

    /// Reads a single byte at `offset` as a boolean (non-zero is true).
    pub fn get_bool(&self, offset: usize) -> Result<bool> {
        Ok(self.read_exact(offset, 1)?[0] != 0)
    }

    /// Writes a boolean at `offset` as a single byte.
    pub fn put_bool(&mut self, offset: usize, value: bool) -> Result<()> {
        self.put_u8(offset, value as u8)
    }

    /// Reads the byte at `offset`.
    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.read_exact(offset, 1)?[0])
    }

    /// Writes a byte at `offset`.
    pub fn put_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.write_slot(offset, 1)?[0] = value;
        Ok(())
    }

    scalar_accessors! {
        (u16, u16, 2, read_u16, write_u16),
        (i16, i16, 2, read_i16, write_i16),
        (u32, u32, 4, read_u32, write_u32),
        (i32, i32, 4, read_i32, write_i32),
        (u64, u64, 8, read_u64, write_u64),
        (i64, i64, 8, read_i64, write_i64),
        (f32, f32, 4, read_f32, write_f32),
        (f64, f64, 8, read_f64, write_f64),
    }

    /// Copies `len` bytes starting at `offset` out of the span.
    pub fn get_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(self.read_exact(offset, len)?.to_vec())
    }

    /// Writes `bytes` at `offset`.
    pub fn put_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.write_slot(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Reads the NUL-terminated UTF-8 string starting at `offset`. Fails with
    /// a bounds error if no terminator occurs before the end of the span.
    pub fn get_utf8(&self, offset: usize) -> Result<String> {
        let len = self.len();
        if offset > len {
            return Err(self.oob(offset, 1));
        }
        let tail = self.read_exact(offset, len - offset)?;
        match tail.iter().position(|&b| b == 0) {
            Some(nul) => Ok(str::from_utf8(&tail[..nul])?.to_owned()),
            None => Err(self.oob(offset, len - offset + 1)),
        }
    }

    /// Writes `value` at `offset` as UTF-8 bytes followed by a NUL terminator.
    pub fn put_utf8(&mut self, offset: usize, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let slot = self.write_slot(offset, bytes.len() + 1)?;
        slot[..bytes.len()].copy_from_slice(bytes);
        slot[bytes.len()] = 0;
        Ok(())
    }

    /// Copies the whole span out into a vector.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.get_bytes(0, self.len())
    }

    /// The first `len` bytes of an owned span's backing store.
    pub(crate) fn owned_prefix(&self, len: usize) -> Result<&[u8]> {
        match &self.repr {
            Repr::Owned {
                buf, ..
            } => Ok(&buf[..len]),
            Repr::Borrowed {
                ..
            } => Err(Error::BorrowedSpan),
        }
    }

    /// The raw address and length of the viewed region, lease-checked for
    /// borrowed spans.
    pub(crate) fn raw_parts(&self) -> Result<(*const u8, usize)> {
        match &self.repr {
            Repr::Owned {
                buf, ..
            } => Ok((buf.as_ptr(), buf.len())),
            Repr::Borrowed {
                data,
                len,
                lease,
            } => {
                if !lease.is_current() {
                    return Err(Error::StaleSpan);
                }
                Ok((*data, *len))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use byteorder::LittleEndian;

    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut span = RawSpan::owned(64);
        span.put_bool(0, true).expect("wrote");
        span.put_u8(1, 0xab).expect("wrote");
        span.put_i16(2, -2).expect("wrote");
        span.put_u32(4, 0xdead_beef).expect("wrote");
        span.put_i64(8, i64::MIN).expect("wrote");
        span.put_f32(16, 1.5).expect("wrote");
        span.put_f64(20, -2.25).expect("wrote");

        assert!(span.get_bool(0).expect("read"));
        assert_eq!(span.get_u8(1).expect("read"), 0xab);
        assert_eq!(span.get_i16(2).expect("read"), -2);
        assert_eq!(span.get_u32(4).expect("read"), 0xdead_beef);
        assert_eq!(span.get_i64(8).expect("read"), i64::MIN);
        assert_eq!(span.get_f32(16).expect("read"), 1.5);
        assert_eq!(span.get_f64(20).expect("read"), -2.25);
    }

    #[test]
    fn test_big_endian_is_default() {
        let mut span = RawSpan::owned(8);
        span.put_u64(0, 1).expect("wrote");
        assert_eq!(span.to_vec().expect("read"), vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_order_override() {
        let mut span = RawSpan::owned(4);
        span.put_u32_order::<LittleEndian>(0, 0x0102_0304).expect("wrote");
        assert_eq!(span.to_vec().expect("read"), vec![4, 3, 2, 1]);
        assert_eq!(span.get_u32_order::<LittleEndian>(0).expect("read"), 0x0102_0304);
        assert_eq!(span.get_u32(0).expect("read"), 0x0403_0201);
    }

    #[test]
    fn test_out_of_bounds_read() {
        let span = RawSpan::owned(8);
        match span.get_u64(1) {
            Err(Error::OutOfBounds {
                offset,
                requested,
                len,
            }) => {
                assert_eq!(offset, 1);
                assert_eq!(requested, 8);
                assert_eq!(len, 8);
            },
            other => panic!("expected out of bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_growth_doubles_from_minimum() {
        let mut span = RawSpan::owned(1);
        let payload: Vec<u8> = (0..100).collect();
        span.put_bytes(0, &payload).expect("wrote");
        assert_eq!(span.len(), 128);
        assert_eq!(span.get_bytes(0, 100).expect("read"), payload);
    }

    #[test]
    fn test_growth_preserves_existing_bytes() {
        let mut span = RawSpan::owned(2);
        span.put_u8(0, 7).expect("wrote");
        span.put_u8(1, 9).expect("wrote");
        span.put_u64(2, u64::MAX).expect("wrote");
        assert_eq!(span.len(), 16);
        assert_eq!(span.get_u8(0).expect("read"), 7);
        assert_eq!(span.get_u8(1).expect("read"), 9);
        assert_eq!(span.get_u64(2).expect("read"), u64::MAX);
    }

    #[test]
    fn test_fixed_capacity_rejects_growth() {
        let mut span = RawSpan::owned_fixed(8);
        span.put_u64(0, 42).expect("wrote");
        assert!(matches!(span.put_u8(8, 1), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_utf8_round_trip() {
        let mut span = RawSpan::owned(16);
        span.put_utf8(2, "abc").expect("wrote");
        assert_eq!(span.get_utf8(2).expect("read"), "abc");
        assert_eq!(span.get_u8(5).expect("read"), 0);
    }

    #[test]
    fn test_utf8_requires_terminator() {
        let mut span = RawSpan::owned_fixed(3);
        span.put_bytes(0, b"abc").expect("wrote");
        assert!(matches!(span.get_utf8(0), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_borrowed_rejects_writes() {
        let backing = vec![1u8, 2, 3, 4];
        let epoch = Epoch::default();
        let mut span = RawSpan::borrowed(backing.as_ptr(), backing.len(), epoch.lease());
        assert_eq!(span.get_u8(0).expect("read"), 1);
        assert!(matches!(span.put_u8(0, 9), Err(Error::BorrowedSpan)));
    }

    #[test]
    fn test_borrowed_goes_stale_when_epoch_advances() {
        let backing = vec![1u8, 2, 3, 4];
        let epoch = Epoch::default();
        let span = RawSpan::borrowed(backing.as_ptr(), backing.len(), epoch.lease());
        assert_eq!(span.get_u32(0).expect("read"), 0x0102_0304);
        epoch.advance();
        assert!(matches!(span.get_u32(0), Err(Error::StaleSpan)));
        assert!(matches!(span.to_vec(), Err(Error::StaleSpan)));
        // Length is metadata and stays queryable.
        assert_eq!(span.len(), 4);
    }
}
