// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use lmdb_sys as ffi;

use crate::{
    buffer_cursor::{
        BufferCursor,
        DEFAULT_STAGING_CAPACITY,
    },
    cursor::Cursor,
    error::Result,
    iter::EntryIter,
    transaction::Transaction,
};

/// A handle to one database inside an environment.
///
/// The handle itself is a plain identifier; all access goes through a
/// transaction. It is also the factory for cursors and iterators, which
/// borrow the transaction they run under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Database {
    dbi: ffi::MDB_dbi,
}

impl Database {
    pub(crate) fn new(dbi: ffi::MDB_dbi) -> Database {
        Database {
            dbi,
        }
    }

    pub(crate) fn dbi(&self) -> ffi::MDB_dbi {
        self.dbi
    }

    /// Opens a raw cursor over this database.
    pub fn open_cursor<'txn>(&self, txn: &'txn Transaction) -> Result<Cursor<'txn>> {
        Cursor::new(txn, self.dbi)
    }

    /// Opens a buffer cursor with the default value staging capacity.
    pub fn buffer_cursor<'txn>(&self, txn: &'txn Transaction) -> Result<BufferCursor<'txn>> {
        self.buffer_cursor_with_capacity(txn, DEFAULT_STAGING_CAPACITY)
    }

    /// Opens a buffer cursor whose value staging buffer starts at
    /// `value_capacity` bytes. The buffer grows geometrically on demand, so a
    /// small initial capacity only costs the copies taken while growing.
    pub fn buffer_cursor_with_capacity<'txn>(
        &self,
        txn: &'txn Transaction,
        value_capacity: usize,
    ) -> Result<BufferCursor<'txn>> {
        Ok(BufferCursor::new(Cursor::new(txn, self.dbi)?, value_capacity))
    }

    /// Iterates the database from the first entry forward.
    pub fn iter<'txn>(&self, txn: &'txn Transaction) -> Result<EntryIter<'txn>> {
        Ok(EntryIter::forward(Cursor::new(txn, self.dbi)?))
    }

    /// Iterates the database from the last entry backward.
    pub fn iter_backward<'txn>(&self, txn: &'txn Transaction) -> Result<EntryIter<'txn>> {
        Ok(EntryIter::backward(Cursor::new(txn, self.dbi)?))
    }

    /// Iterates forward starting at the first entry whose key is greater
    /// than or equal to `key`.
    pub fn iter_from<'txn>(&self, txn: &'txn Transaction, key: &[u8]) -> Result<EntryIter<'txn>> {
        Ok(EntryIter::from(Cursor::new(txn, self.dbi)?, key))
    }
}
