// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The zero-copy cursor protocol.
//!
//! A [`BufferCursor`] reads and writes keys and values by addressing engine
//! memory directly instead of copying every entry through intermediate byte
//! arrays. Navigation binds the cursor's key and value views to leased spans
//! over engine-owned pages, and field accessors decode scalars straight out
//! of those pages. Writes go the other way: the first field writer after a
//! position change rewinds the affected side onto an owned staging buffer,
//! further writers append at a tracked offset, and [`BufferCursor::put`],
//! [`BufferCursor::overwrite`], or [`BufferCursor::append`] transmit exactly
//! the staged prefix to the engine.
//!
//! Position state is a three-valued machine: unpositioned (nothing bound;
//! length queries report 0 and every accessor fails), positioned (bound to an
//! engine entry), and staged (local writes pending). A navigation that finds
//! no entry always lands in unpositioned, and a successful submission does
//! too, until the next navigation. Deleting is the deliberate exception: the
//! bound views keep showing the just-deleted bytes until the cursor moves
//! again, so delete-then-inspect patterns work.
//!
//! All multi-byte accessors use big-endian order, the one fixed-width integer
//! encoding whose byte-wise comparison matches numeric order under the
//! engine's default key comparator. Order-parameterized reads are available
//! through [`BufferCursor::key_span`]/[`BufferCursor::val_span`].

use std::slice;

use paste::paste;

use crate::{
    cursor::{
        Cursor,
        NavOp,
        SeekOp,
    },
    error::{
        Error,
        Result,
    },
    flags::WriteFlags,
    span::RawSpan,
};

/// Initial value staging capacity for [`crate::Database::buffer_cursor`].
pub const DEFAULT_STAGING_CAPACITY: usize = 4096;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    Unpositioned,
    Positioned,
    Staged,
}

#[derive(Debug)]
enum Binding {
    /// Nothing bound; accessors fail.
    Unbound,
    /// Aliasing the engine entry the cursor is positioned on.
    Engine(RawSpan),
    /// Local writes pending in the staging buffer.
    Staged,
}

macro_rules! side_accessors {
    ($side:ident, $label:literal, $(($name:ident, $ty:ty, $size:expr)),+ $(,)?) => {
        paste! {
            fn [<$side _view>](&self) -> Result<&RawSpan> {
                if self.state == Position::Unpositioned {
                    return Err(Error::Unpositioned);
                }
                match &self.[<$side _binding>] {
                    Binding::Unbound => Err(Error::Unpositioned),
                    Binding::Engine(span) => Ok(span),
                    Binding::Staged => Ok(&self.[<$side _staging>]),
                }
            }

            #[doc = concat!("The length in bytes of the bound ", $label, ": the engine entry's \
                length while positioned, the staged byte count while staging, 0 while \
                unpositioned.")]
            pub fn [<$side _len>](&self) -> usize {
                if self.state == Position::Unpositioned {
                    return 0;
                }
                match &self.[<$side _binding>] {
                    Binding::Unbound => 0,
                    Binding::Engine(span) => span.len(),
                    Binding::Staged => self.[<$side _write>],
                }
            }

            #[doc = concat!("The number of ", $label, " bytes staged since the write offset \
                last reset.")]
            pub fn [<$side _write_index>](&self) -> usize {
                self.[<$side _write>]
            }

            /// Rewinds this side onto its owned staging buffer if it is not
            /// already there, and hands back the append offset.
            fn [<$side _stage>](&mut self) -> Result<usize> {
                self.cursor.txn().ensure_writable()?;
                if !matches!(self.[<$side _binding>], Binding::Staged) {
                    self.[<$side _binding>] = Binding::Staged;
                    self.[<$side _write>] = 0;
                }
                self.state = Position::Staged;
                Ok(self.[<$side _write>])
            }

            $(
                #[doc = concat!("Reads a big-endian `", stringify!($ty), "` from the bound ",
                    $label, " at `offset`.")]
                pub fn [<$side _ $name>](&self, offset: usize) -> Result<$ty> {
                    self.[<$side _view>]()?.[<get_ $name>](offset)
                }
            )+

            #[doc = concat!("Copies `len` bytes out of the bound ", $label, " starting at \
                `offset`.")]
            pub fn [<$side _bytes>](&self, offset: usize, len: usize) -> Result<Vec<u8>> {
                self.[<$side _view>]()?.get_bytes(offset, len)
            }

            #[doc = concat!("Reads the NUL-terminated UTF-8 string in the bound ", $label,
                " starting at `offset`.")]
            pub fn [<$side _utf8>](&self, offset: usize) -> Result<String> {
                self.[<$side _view>]()?.get_utf8(offset)
            }

            #[doc = concat!("A span over the bound ", $label, ": another leased alias while \
                positioned on engine memory, a snapshot of the whole staging buffer while \
                staging.")]
            pub fn [<$side _span>](&self) -> Result<RawSpan> {
                Ok(self.[<$side _view>]()?.clone())
            }

            $(
                #[doc = concat!("Appends a big-endian `", stringify!($ty), "` to the staged ",
                    $label, ".")]
                pub fn [<$side _write_ $name>](&mut self, value: $ty) -> Result<()> {
                    let offset = self.[<$side _stage>]()?;
                    self.[<$side _staging>].[<put_ $name>](offset, value)?;
                    self.[<$side _write>] = offset + $size;
                    Ok(())
                }
            )+

            #[doc = concat!("Appends raw bytes to the staged ", $label, ".")]
            pub fn [<$side _write_bytes>](&mut self, bytes: &[u8]) -> Result<()> {
                let offset = self.[<$side _stage>]()?;
                self.[<$side _staging>].put_bytes(offset, bytes)?;
                self.[<$side _write>] = offset + bytes.len();
                Ok(())
            }

            #[doc = concat!("Appends `value` as UTF-8 bytes plus a NUL terminator to the \
                staged ", $label, ".")]
            pub fn [<$side _write_utf8>](&mut self, value: &str) -> Result<()> {
                let offset = self.[<$side _stage>]()?;
                self.[<$side _staging>].put_utf8(offset, value)?;
                self.[<$side _write>] = offset + value.len() + 1;
                Ok(())
            }
        }
    };
}

/// A buffer-oriented cursor over one database within one transaction.
///
/// Obtained from [`crate::Database::buffer_cursor`]. Dropping it closes the
/// underlying cursor handle; the owning transaction is untouched.
#[derive(Debug)]
pub struct BufferCursor<'txn> {
    cursor: Cursor<'txn>,
    state: Position,
    key_binding: Binding,
    val_binding: Binding,
    key_staging: RawSpan,
    val_staging: RawSpan,
    key_write: usize,
    val_write: usize,
}

impl<'txn> BufferCursor<'txn> {
    pub(crate) fn new(cursor: Cursor<'txn>, value_capacity: usize) -> BufferCursor<'txn> {
        // Keys cannot grow past the engine's hard ceiling, so the key side is
        // a fixed allocation; the value side starts at the requested capacity
        // and doubles on demand.
        let max_key_size = cursor.txn().env().max_key_size();
        BufferCursor {
            key_staging: RawSpan::owned_fixed(max_key_size),
            val_staging: RawSpan::owned(value_capacity),
            cursor,
            state: Position::Unpositioned,
            key_binding: Binding::Unbound,
            val_binding: Binding::Unbound,
            key_write: 0,
            val_write: 0,
        }
    }

    fn rebind(&mut self, key: RawSpan, val: RawSpan) {
        self.state = Position::Positioned;
        self.key_binding = Binding::Engine(key);
        self.val_binding = Binding::Engine(val);
        self.key_write = 0;
        self.val_write = 0;
    }

    fn unbind(&mut self) {
        self.state = Position::Unpositioned;
        self.key_binding = Binding::Unbound;
        self.val_binding = Binding::Unbound;
        self.key_write = 0;
        self.val_write = 0;
    }

    fn navigate(&mut self, op: NavOp) -> Result<bool> {
        match self.cursor.navigate(op)? {
            Some((key, val)) => {
                self.rebind(key, val);
                Ok(true)
            },
            None => {
                self.unbind();
                Ok(false)
            },
        }
    }

    fn seek(&mut self, op: SeekOp, key: &[u8]) -> Result<bool> {
        match self.cursor.seek(op, key)? {
            Some((key, val)) => {
                self.rebind(key, val);
                Ok(true)
            },
            None => {
                self.unbind();
                Ok(false)
            },
        }
    }

    /// Whether the cursor is bound to an entry or to staged writes.
    pub fn is_positioned(&self) -> bool {
        self.state != Position::Unpositioned
    }

    /// Moves to the first entry in the database.
    pub fn first(&mut self) -> Result<bool> {
        self.navigate(NavOp::First)
    }

    /// Moves to the last entry in the database.
    pub fn last(&mut self) -> Result<bool> {
        self.navigate(NavOp::Last)
    }

    /// Moves to the next entry; `false` past the end of the key space.
    pub fn next(&mut self) -> Result<bool> {
        self.navigate(NavOp::Next)
    }

    /// Moves to the previous entry; `false` before the start.
    pub fn prev(&mut self) -> Result<bool> {
        self.navigate(NavOp::Prev)
    }

    /// Moves to the first duplicate value of the current key.
    pub fn first_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::FirstDup)
    }

    /// Moves to the last duplicate value of the current key.
    pub fn last_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::LastDup)
    }

    /// Moves to the next duplicate value of the current key; `false` once the
    /// key's duplicates are exhausted.
    pub fn next_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::NextDup)
    }

    /// Moves to the previous duplicate value of the current key.
    pub fn prev_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::PrevDup)
    }

    /// Moves to the first duplicate of the next distinct key.
    pub fn next_no_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::NextNoDup)
    }

    /// Moves to the last duplicate of the previous distinct key.
    pub fn prev_no_dup(&mut self) -> Result<bool> {
        self.navigate(NavOp::PrevNoDup)
    }

    /// Positions at the entry whose key is byte-identical to `key`; `false`
    /// (and unpositioned) if no such entry exists.
    pub fn seek_exact(&mut self, key: &[u8]) -> Result<bool> {
        self.seek(SeekOp::Exact, key)
    }

    /// Positions at the first entry whose key is greater than or equal to
    /// `key` under the active comparator; `false` if none exists.
    pub fn seek_range(&mut self, key: &[u8]) -> Result<bool> {
        self.seek(SeekOp::Range, key)
    }

    side_accessors!(
        key,
        "key",
        (bool, bool, 1),
        (u8, u8, 1),
        (i16, i16, 2),
        (u16, u16, 2),
        (i32, i32, 4),
        (u32, u32, 4),
        (i64, i64, 8),
        (u64, u64, 8),
        (f32, f32, 4),
        (f64, f64, 8),
    );

    side_accessors!(
        val,
        "value",
        (bool, bool, 1),
        (u8, u8, 1),
        (i16, i16, 2),
        (u16, u16, 2),
        (i32, i32, 4),
        (u32, u32, 4),
        (i64, i64, 8),
        (u64, u64, 8),
        (f32, f32, 4),
        (f64, f64, 8),
    );

    /// Resolves one side to the bytes a submission transmits: the staged
    /// prefix, the engine entry a positioned side still aliases, or nothing.
    fn submit_bytes<'a>(
        binding: &'a Binding,
        staging: &'a RawSpan,
        write: usize,
    ) -> Result<&'a [u8]> {
        match binding {
            Binding::Staged => staging.owned_prefix(write),
            Binding::Engine(span) => {
                let (data, len) = span.raw_parts()?;
                // The lease was checked in raw_parts and nothing on this
                // thread advances the epoch before the engine call consumes
                // the bytes.
                Ok(unsafe { slice::from_raw_parts(data, len) })
            },
            Binding::Unbound => Ok(&[]),
        }
    }

    fn submit(&mut self, flags: WriteFlags) -> Result<bool> {
        self.cursor.txn().ensure_writable()?;
        let key = Self::submit_bytes(&self.key_binding, &self.key_staging, self.key_write)?;
        let val = Self::submit_bytes(&self.val_binding, &self.val_staging, self.val_write)?;
        let stored = self.cursor.put(key, val, flags)?;
        // Success and KEY_EXISTS both consume the staged bytes; the cursor is
        // unpositioned until the next navigation.
        self.unbind();
        Ok(stored)
    }

    /// Inserts the staged key/value only if the key is absent. Returns
    /// `false`, not an error, when the key already exists; the stored value
    /// is left untouched in that case.
    ///
    /// Whatever the outcome, both write offsets reset and the cursor is
    /// unpositioned until the next navigation.
    pub fn put(&mut self) -> Result<bool> {
        self.submit(WriteFlags::NO_OVERWRITE)
    }

    /// Inserts or replaces the entry for the staged key. On a database with
    /// duplicate keys enabled this adds another duplicate instead of
    /// replacing.
    ///
    /// A side that was never written after the last navigation is transmitted
    /// as the bytes it is still bound to, so overwriting just the value of
    /// the current entry needs no key staging.
    pub fn overwrite(&mut self) -> Result<bool> {
        self.submit(WriteFlags::empty())
    }

    /// Stores the staged key/value at the tail of the database, skipping the
    /// tree descent. The caller must supply keys in ascending order; this
    /// layer does not validate the obligation, and an out-of-order key
    /// surfaces as [`Error::KeyExist`].
    pub fn append(&mut self) -> Result<()> {
        if self.submit(WriteFlags::APPEND)? {
            Ok(())
        } else {
            Err(Error::KeyExist)
        }
    }

    /// Deletes the entry at the current position. Calling this while
    /// unpositioned is a programming error and fails with
    /// [`Error::Unpositioned`].
    ///
    /// The bound views are left alone: the just-deleted key and value stay
    /// legible until the next navigation call.
    pub fn delete(&mut self) -> Result<()> {
        self.cursor.txn().ensure_writable()?;
        if self.state == Position::Unpositioned {
            return Err(Error::Unpositioned);
        }
        self.cursor.del(WriteFlags::empty())
    }

    /// Re-arms the cursor after the owning read-only transaction has been
    /// renewed. The cursor comes back unpositioned.
    pub fn renew(&mut self) -> Result<()> {
        self.cursor.renew()?;
        self.unbind();
        Ok(())
    }
}
