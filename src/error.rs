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
    ffi::NulError,
    io,
    os::raw::c_int,
    path::PathBuf,
    str::Utf8Error,
};

use lmdb_sys as ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// POSIX EACCES, which the engine reports for writes inside a read-only
// transaction or environment.
const EACCES: c_int = 13;

/// Errors surfaced by this layer and by the engine underneath it.
///
/// Not-found and key-exists conditions on the cursor protocol are reported as
/// booleans or `Option`s, never through this type; the variants here cover
/// engine failures and caller programming errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key/data pair already exists")]
    KeyExist,

    #[error("no matching key/data pair found")]
    NotFound,

    #[error("requested page not found")]
    PageNotFound,

    #[error("located page was of the wrong type")]
    Corrupted,

    #[error("update of meta page failed or environment had a fatal error")]
    Panic,

    #[error("environment version mismatch")]
    VersionMismatch,

    #[error("file is not a valid LMDB file")]
    Invalid,

    #[error("environment map size limit reached")]
    MapFull,

    #[error("environment maximum database count reached")]
    DbsFull,

    #[error("environment maximum reader count reached")]
    ReadersFull,

    #[error("thread-local storage keys exhausted")]
    TlsFull,

    #[error("transaction has too many dirty pages")]
    TxnFull,

    #[error("internal cursor stack limit reached")]
    CursorFull,

    #[error("internal page has no more space")]
    PageFull,

    #[error("environment map was resized by another process")]
    MapResized,

    #[error("operation and database incompatible")]
    Incompatible,

    #[error("invalid reuse of reader locktable slot")]
    BadRslot,

    #[error("transaction must abort, has a child, or is invalid")]
    BadTxn,

    #[error("unsupported size of key, or wrong DUPFIXED data size")]
    BadValSize,

    #[error("the specified database handle changed unexpectedly")]
    BadDbi,

    #[error("write attempted on a read-only transaction")]
    ReadOnly,

    #[error("cursor is in an unpositioned state")]
    Unpositioned,

    #[error("access of {requested} bytes at offset {offset} exceeds span of {len} bytes")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },

    #[error("span refers to memory from a superseded cursor position or transaction state")]
    StaleSpan,

    #[error("span aliases engine-owned memory and cannot be modified")]
    BorrowedSpan,

    #[error("directory does not exist or is not a directory: {0}")]
    DirectoryDoesNotExist(PathBuf),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] NulError),

    #[error("string field is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected engine error code {0}")]
    Other(c_int),
}

impl Error {
    pub fn from_err_code(err_code: c_int) -> Error {
        match err_code {
            ffi::MDB_KEYEXIST => Error::KeyExist,
            ffi::MDB_NOTFOUND => Error::NotFound,
            ffi::MDB_PAGE_NOTFOUND => Error::PageNotFound,
            ffi::MDB_CORRUPTED => Error::Corrupted,
            ffi::MDB_PANIC => Error::Panic,
            ffi::MDB_VERSION_MISMATCH => Error::VersionMismatch,
            ffi::MDB_INVALID => Error::Invalid,
            ffi::MDB_MAP_FULL => Error::MapFull,
            ffi::MDB_DBS_FULL => Error::DbsFull,
            ffi::MDB_READERS_FULL => Error::ReadersFull,
            ffi::MDB_TLS_FULL => Error::TlsFull,
            ffi::MDB_TXN_FULL => Error::TxnFull,
            ffi::MDB_CURSOR_FULL => Error::CursorFull,
            ffi::MDB_PAGE_FULL => Error::PageFull,
            ffi::MDB_MAP_RESIZED => Error::MapResized,
            ffi::MDB_INCOMPATIBLE => Error::Incompatible,
            ffi::MDB_BAD_RSLOT => Error::BadRslot,
            ffi::MDB_BAD_TXN => Error::BadTxn,
            ffi::MDB_BAD_VALSIZE => Error::BadValSize,
            ffi::MDB_BAD_DBI => Error::BadDbi,
            EACCES => Error::ReadOnly,
            other => Error::Other(other),
        }
    }
}

/// Converts an engine return code into a `Result`, reserving `Ok` for
/// `MDB_SUCCESS`.
pub(crate) fn lmdb_result(err_code: c_int) -> Result<()> {
    if err_code == ffi::MDB_SUCCESS {
        Ok(())
    } else {
        Err(Error::from_err_code(err_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_code_mapping() {
        assert!(matches!(Error::from_err_code(ffi::MDB_NOTFOUND), Error::NotFound));
        assert!(matches!(Error::from_err_code(ffi::MDB_KEYEXIST), Error::KeyExist));
        assert!(matches!(Error::from_err_code(ffi::MDB_MAP_FULL), Error::MapFull));
        assert!(matches!(Error::from_err_code(EACCES), Error::ReadOnly));
        assert!(matches!(Error::from_err_code(-1), Error::Other(-1)));
    }

    #[test]
    fn test_unpositioned_message() {
        assert_eq!(
            Error::Unpositioned.to_string(),
            "cursor is in an unpositioned state"
        );
    }
}
