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
    cell::Cell,
    ptr,
};

use lmdb_sys as ffi;
use log::trace;

use crate::{
    cursor::{
        mdb_val,
        out_val,
    },
    database::Database,
    env::Environment,
    error::{
        lmdb_result,
        Error,
        Result,
    },
    flags::WriteFlags,
    span::{
        Epoch,
        Lease,
        RawSpan,
    },
};

/// A transaction on an environment, read-only or read-write.
///
/// The read-only flag is consulted by every write-side operation in this
/// layer, which rejects illegal writes before they reach the engine. Cursors
/// borrow the transaction, so the borrow checker keeps `commit`/`abort` (which
/// take the transaction by value) from running while any cursor is live.
///
/// Dropping an uncommitted transaction aborts it.
#[derive(Debug)]
pub struct Transaction<'env> {
    txn: *mut ffi::MDB_txn,
    env: &'env Environment,
    read_only: bool,
    active: Cell<bool>,
    epoch: Epoch,
}

impl<'env> Transaction<'env> {
    pub(crate) fn begin(env: &'env Environment, read_only: bool) -> Result<Transaction<'env>> {
        let flags = if read_only {
            ffi::MDB_RDONLY
        } else {
            0
        };
        let mut txn: *mut ffi::MDB_txn = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_txn_begin(env.raw(), ptr::null_mut(), flags, &mut txn))?;
        }
        trace!("began {} transaction", if read_only { "read-only" } else { "read-write" });
        Ok(Transaction {
            txn,
            env,
            read_only,
            active: Cell::new(true),
            epoch: Epoch::default(),
        })
    }

    pub(crate) fn raw(&self) -> *mut ffi::MDB_txn {
        self.txn
    }

    pub(crate) fn env(&self) -> &'env Environment {
        self.env
    }

    pub(crate) fn lease(&self) -> Lease {
        self.epoch.lease()
    }

    pub(crate) fn advance_epoch(&self) {
        self.epoch.advance();
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.active.get() {
            Ok(())
        } else {
            Err(Error::BadTxn)
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Commits the transaction. The handle is consumed whether or not the
    /// commit succeeds.
    pub fn commit(mut self) -> Result<()> {
        self.epoch.advance();
        let rc = unsafe { ffi::mdb_txn_commit(self.txn) };
        // The engine frees the handle even on failure.
        self.txn = ptr::null_mut();
        trace!("committed transaction");
        lmdb_result(rc)
    }

    /// Aborts the transaction, discarding its writes.
    pub fn abort(self) {
        // The drop glue does the work.
    }

    /// Releases a read-only transaction's snapshot while keeping the handle
    /// allocated. All spans and cursors bound to the transaction fail until
    /// [`Transaction::renew`] re-arms it. On a read-write transaction this is
    /// a no-op, mirroring the engine.
    pub fn reset(&self) {
        if !self.read_only {
            return;
        }
        unsafe { ffi::mdb_txn_reset(self.txn) };
        self.active.set(false);
        self.epoch.advance();
        trace!("reset read-only transaction");
    }

    /// Takes a fresh snapshot on a reset read-only transaction without
    /// reallocating the handle. Cursor handles must be re-armed separately
    /// via their own `renew`.
    pub fn renew(&self) -> Result<()> {
        unsafe {
            lmdb_result(ffi::mdb_txn_renew(self.txn))?;
        }
        self.active.set(true);
        self.epoch.advance();
        trace!("renewed read-only transaction");
        Ok(())
    }

    /// Looks up `key` in `db`, returning a leased span over the stored value
    /// or `None` when the key is absent.
    pub fn get(&self, db: Database, key: &[u8]) -> Result<Option<RawSpan>> {
        self.ensure_active()?;
        let mut key_val = mdb_val(key);
        let mut data_val = out_val();
        let rc = unsafe { ffi::mdb_get(self.txn, db.dbi(), &mut key_val, &mut data_val) };
        match rc {
            ffi::MDB_SUCCESS => Ok(Some(RawSpan::borrowed(
                data_val.mv_data as *const u8,
                data_val.mv_size,
                self.lease(),
            ))),
            ffi::MDB_NOTFOUND => Ok(None),
            err => Err(Error::from_err_code(err)),
        }
    }

    /// Stores `value` under `key` in `db`. A `NO_OVERWRITE` put of a present
    /// key surfaces [`Error::KeyExist`]; the boolean rendering of that
    /// outcome belongs to the cursor protocol.
    pub fn put(&mut self, db: Database, key: &[u8], value: &[u8], flags: WriteFlags) -> Result<()> {
        self.ensure_active()?;
        self.ensure_writable()?;
        let mut key_val = mdb_val(key);
        let mut data_val = mdb_val(value);
        let rc =
            unsafe { ffi::mdb_put(self.txn, db.dbi(), &mut key_val, &mut data_val, flags.bits()) };
        self.epoch.advance();
        lmdb_result(rc)
    }

    /// Deletes `key` from `db`, or with `value` on a DUP_SORT database the
    /// exact key/value pair. Returns `false` when nothing matched.
    pub fn del(&mut self, db: Database, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
        self.ensure_active()?;
        self.ensure_writable()?;
        let mut key_val = mdb_val(key);
        let rc = match value {
            Some(value) => {
                let mut data_val = mdb_val(value);
                unsafe { ffi::mdb_del(self.txn, db.dbi(), &mut key_val, &mut data_val) }
            },
            None => unsafe { ffi::mdb_del(self.txn, db.dbi(), &mut key_val, ptr::null_mut()) },
        };
        self.epoch.advance();
        match rc {
            ffi::MDB_SUCCESS => Ok(true),
            ffi::MDB_NOTFOUND => Ok(false),
            err => Err(Error::from_err_code(err)),
        }
    }
}

impl<'env> Drop for Transaction<'env> {
    fn drop(&mut self) {
        self.epoch.advance();
        if !self.txn.is_null() {
            trace!("aborting transaction");
            unsafe { ffi::mdb_txn_abort(self.txn) };
        }
    }
}
