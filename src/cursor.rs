// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    os::raw::{
        c_uint,
        c_void,
    },
    ptr,
};

use lmdb_sys as ffi;

use crate::{
    error::{
        lmdb_result,
        Error,
        Result,
    },
    flags::WriteFlags,
    span::RawSpan,
    transaction::Transaction,
};

/// Positioning operations that take no key argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NavOp {
    First,
    FirstDup,
    GetCurrent,
    Last,
    LastDup,
    Next,
    NextDup,
    NextNoDup,
    Prev,
    PrevDup,
    PrevNoDup,
}

impl NavOp {
    fn ffi_op(self) -> c_uint {
        match self {
            NavOp::First => ffi::MDB_FIRST,
            NavOp::FirstDup => ffi::MDB_FIRST_DUP,
            NavOp::GetCurrent => ffi::MDB_GET_CURRENT,
            NavOp::Last => ffi::MDB_LAST,
            NavOp::LastDup => ffi::MDB_LAST_DUP,
            NavOp::Next => ffi::MDB_NEXT,
            NavOp::NextDup => ffi::MDB_NEXT_DUP,
            NavOp::NextNoDup => ffi::MDB_NEXT_NODUP,
            NavOp::Prev => ffi::MDB_PREV,
            NavOp::PrevDup => ffi::MDB_PREV_DUP,
            NavOp::PrevNoDup => ffi::MDB_PREV_NODUP,
        }
    }
}

/// Positioning operations that search for a caller-supplied key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekOp {
    /// Position at the entry whose key is byte-identical to the given key.
    Exact,
    /// Position at the first entry whose key is greater than or equal to the
    /// given key under the active comparator.
    Range,
}

impl SeekOp {
    fn ffi_op(self) -> c_uint {
        match self {
            SeekOp::Exact => ffi::MDB_SET_KEY,
            SeekOp::Range => ffi::MDB_SET_RANGE,
        }
    }
}

pub(crate) fn mdb_val(bytes: &[u8]) -> ffi::MDB_val {
    ffi::MDB_val {
        mv_size: bytes.len(),
        mv_data: bytes.as_ptr() as *mut c_void,
    }
}

pub(crate) fn out_val() -> ffi::MDB_val {
    ffi::MDB_val {
        mv_size: 0,
        mv_data: ptr::null_mut(),
    }
}

/// A raw cursor over one database within one transaction.
///
/// This is a marshaling shim: positioning calls hand back leased [`RawSpan`]
/// pairs aliasing engine memory, and a reported NOTFOUND is the normal
/// boundary signal (`None`), never an error. [`crate::BufferCursor`] is the
/// main consumer; the handle is public for callers that want the raw protocol.
#[derive(Debug)]
pub struct Cursor<'txn> {
    cursor: *mut ffi::MDB_cursor,
    txn: &'txn Transaction<'txn>,
}

impl<'txn> Cursor<'txn> {
    pub(crate) fn new(txn: &'txn Transaction<'txn>, dbi: ffi::MDB_dbi) -> Result<Cursor<'txn>> {
        txn.ensure_active()?;
        let mut cursor: *mut ffi::MDB_cursor = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_cursor_open(txn.raw(), dbi, &mut cursor))?;
        }
        Ok(Cursor {
            cursor,
            txn,
        })
    }

    pub(crate) fn txn(&self) -> &'txn Transaction<'txn> {
        self.txn
    }

    fn bind_pair(&self, key: &ffi::MDB_val, data: &ffi::MDB_val) -> (RawSpan, RawSpan) {
        (
            RawSpan::borrowed(key.mv_data as *const u8, key.mv_size, self.txn.lease()),
            RawSpan::borrowed(data.mv_data as *const u8, data.mv_size, self.txn.lease()),
        )
    }

    /// Moves the cursor per `op` and returns spans over the entry it lands
    /// on, or `None` when the engine reports no such entry.
    ///
    /// Every call advances the transaction's validity epoch, so spans handed
    /// out by earlier calls go stale.
    pub fn navigate(&mut self, op: NavOp) -> Result<Option<(RawSpan, RawSpan)>> {
        self.txn.ensure_active()?;
        self.txn.advance_epoch();
        let mut key = out_val();
        let mut data = out_val();
        let rc = unsafe { ffi::mdb_cursor_get(self.cursor, &mut key, &mut data, op.ffi_op()) };
        match rc {
            ffi::MDB_SUCCESS => Ok(Some(self.bind_pair(&key, &data))),
            ffi::MDB_NOTFOUND => Ok(None),
            err => Err(Error::from_err_code(err)),
        }
    }

    /// Positions the cursor at `key` per `op`; `None` when no entry matches.
    pub fn seek(&mut self, op: SeekOp, key: &[u8]) -> Result<Option<(RawSpan, RawSpan)>> {
        self.txn.ensure_active()?;
        self.txn.advance_epoch();
        let mut key_val = mdb_val(key);
        let mut data_val = out_val();
        let rc = unsafe { ffi::mdb_cursor_get(self.cursor, &mut key_val, &mut data_val, op.ffi_op()) };
        match rc {
            ffi::MDB_SUCCESS => Ok(Some(self.bind_pair(&key_val, &data_val))),
            ffi::MDB_NOTFOUND => Ok(None),
            err => Err(Error::from_err_code(err)),
        }
    }

    /// Stores `value` under `key` at the cursor, returning `false` when the
    /// engine reports KEY_EXISTS (the expected outcome for `NO_OVERWRITE`
    /// puts of present keys and exact duplicate pairs) and `true` on success.
    pub fn put(&mut self, key: &[u8], value: &[u8], flags: WriteFlags) -> Result<bool> {
        self.txn.ensure_active()?;
        self.txn.ensure_writable()?;
        let mut key_val = mdb_val(key);
        let mut data_val = mdb_val(value);
        let rc =
            unsafe { ffi::mdb_cursor_put(self.cursor, &mut key_val, &mut data_val, flags.bits()) };
        // A write can rebalance pages, so aliases minted before it are void.
        self.txn.advance_epoch();
        match rc {
            ffi::MDB_SUCCESS => Ok(true),
            ffi::MDB_KEYEXIST => Ok(false),
            err => Err(Error::from_err_code(err)),
        }
    }

    /// Deletes the entry at the current position. With
    /// [`WriteFlags::NO_DUP_DATA`] on a DUP_SORT database, deletes all
    /// duplicates of the current key.
    ///
    /// The epoch is left alone: spans bound to the deleted entry stay legible
    /// until the next navigation.
    pub fn del(&mut self, flags: WriteFlags) -> Result<()> {
        self.txn.ensure_active()?;
        self.txn.ensure_writable()?;
        unsafe { lmdb_result(ffi::mdb_cursor_del(self.cursor, flags.bits())) }
    }

    /// The number of duplicate values for the current key. Valid only on
    /// databases opened with [`crate::DatabaseFlags::DUP_SORT`].
    pub fn count_duplicates(&self) -> Result<u64> {
        self.txn.ensure_active()?;
        let mut count: usize = 0;
        unsafe {
            lmdb_result(ffi::mdb_cursor_count(self.cursor, &mut count))?;
        }
        Ok(count as u64)
    }

    /// Rebinds the cursor handle after the owning read-only transaction has
    /// been renewed, without reallocating it.
    pub fn renew(&mut self) -> Result<()> {
        self.txn.ensure_active()?;
        unsafe { lmdb_result(ffi::mdb_cursor_renew(self.txn.raw(), self.cursor)) }
    }
}

impl<'txn> Drop for Cursor<'txn> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.cursor) }
    }
}
