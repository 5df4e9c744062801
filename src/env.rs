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
    ffi::CString,
    io,
    os::raw::{
        c_int,
        c_uint,
    },
    path::Path,
    ptr,
};

use lmdb_sys as ffi;
use log::{
    debug,
    info,
};

use crate::{
    database::Database,
    error::{
        lmdb_result,
        Error,
        Result,
    },
    flags::{
        DatabaseFlags,
        EnvironmentFlags,
    },
    transaction::Transaction,
};

/// Configuration for opening an [`Environment`].
#[derive(Clone, Debug, Default)]
pub struct EnvironmentBuilder {
    flags: EnvironmentFlags,
    max_readers: Option<c_uint>,
    max_dbs: Option<c_uint>,
    map_size: Option<usize>,
}

impl EnvironmentBuilder {
    pub fn set_flags(&mut self, flags: EnvironmentFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    pub fn set_max_readers(&mut self, max_readers: c_uint) -> &mut Self {
        self.max_readers = Some(max_readers);
        self
    }

    /// Sets the number of named databases the environment may hold. Without
    /// this, only the default unnamed database can be opened.
    pub fn set_max_dbs(&mut self, max_dbs: c_uint) -> &mut Self {
        self.max_dbs = Some(max_dbs);
        self
    }

    pub fn set_map_size(&mut self, map_size: usize) -> &mut Self {
        self.map_size = Some(map_size);
        self
    }

    /// Opens the environment at `path`, which must be an existing directory
    /// unless [`EnvironmentFlags::NO_SUB_DIR`] is set.
    pub fn open(&self, path: &Path) -> Result<Environment> {
        if !self.flags.contains(EnvironmentFlags::NO_SUB_DIR) && !path.is_dir() {
            return Err(Error::DirectoryDoesNotExist(path.to_path_buf()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "path is not valid unicode"))
        })?;
        let c_path = CString::new(path_str)?;

        let mut env: *mut ffi::MDB_env = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_env_create(&mut env))?;
        }
        let configure = || -> Result<()> {
            unsafe {
                if let Some(max_readers) = self.max_readers {
                    lmdb_result(ffi::mdb_env_set_maxreaders(env, max_readers))?;
                }
                if let Some(max_dbs) = self.max_dbs {
                    lmdb_result(ffi::mdb_env_set_maxdbs(env, max_dbs))?;
                }
                if let Some(map_size) = self.map_size {
                    lmdb_result(ffi::mdb_env_set_mapsize(env, map_size))?;
                }
                lmdb_result(ffi::mdb_env_open(env, c_path.as_ptr(), self.flags.bits(), 0o600))
            }
        };
        match configure() {
            Ok(()) => {
                info!("opened environment at {}", path.display());
                Ok(Environment {
                    env,
                })
            },
            Err(err) => {
                unsafe { ffi::mdb_env_close(env) };
                // The engine reports a bare ENOENT for a missing path; name
                // the path in the error instead.
                Err(match err {
                    Error::Other(2) => Error::DirectoryDoesNotExist(path.to_path_buf()),
                    err => err,
                })
            },
        }
    }
}

/// A handle to an engine environment: one memory-mapped file holding one or
/// more databases.
#[derive(Debug)]
pub struct Environment {
    env: *mut ffi::MDB_env,
}

impl Environment {
    /// Returns a builder for configuring and opening an environment.
    pub fn new() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    pub(crate) fn raw(&self) -> *mut ffi::MDB_env {
        self.env
    }

    /// Begins a read-only transaction.
    pub fn begin_ro_txn(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self, true)
    }

    /// Begins a read-write transaction. The engine serializes writers; this
    /// call blocks while another write transaction is live.
    pub fn begin_rw_txn(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self, false)
    }

    fn open_dbi(&self, name: Option<&str>, flags: c_uint, read_only: bool) -> Result<Database> {
        let name_cstr = match name {
            Some(name) => Some(CString::new(name)?),
            None => None,
        };
        let txn = Transaction::begin(self, read_only)?;
        let name_ptr = name_cstr.as_ref().map_or(ptr::null(), |cstr| cstr.as_ptr());
        let mut dbi: ffi::MDB_dbi = 0;
        unsafe {
            lmdb_result(ffi::mdb_dbi_open(txn.raw(), name_ptr, flags, &mut dbi))?;
        }
        // The handle stays private to the transaction until it commits.
        txn.commit()?;
        Ok(Database::new(dbi))
    }

    /// Opens an existing database. `None` selects the default unnamed one.
    pub fn open_db(&self, name: Option<&str>) -> Result<Database> {
        self.open_dbi(name, 0, true)
    }

    /// Opens a database, creating it with `flags` if it does not exist.
    pub fn create_db(&self, name: Option<&str>, flags: DatabaseFlags) -> Result<Database> {
        debug!("creating database {:?}", name);
        self.open_dbi(name, flags.bits() | ffi::MDB_CREATE, false)
    }

    /// Flushes buffered writes to disk; with `force`, synchronously even when
    /// the environment was opened with [`EnvironmentFlags::NO_SYNC`].
    pub fn sync(&self, force: bool) -> Result<()> {
        unsafe { lmdb_result(ffi::mdb_env_sync(self.env, force as c_int)) }
    }

    /// The engine's hard ceiling on key length in bytes (511 in the stock
    /// engine). Key staging buffers are sized to this.
    pub fn max_key_size(&self) -> usize {
        unsafe { ffi::mdb_env_get_maxkeysize(self.env) as usize }
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        debug!("closing environment");
        unsafe { ffi::mdb_env_close(self.env) }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::Builder;

    use super::*;

    #[test]
    fn test_open_fails() {
        let root = Builder::new().prefix("test_open_fails").tempdir().expect("tempdir");
        let nope = root.path().join("nope/");
        match Environment::new().open(&nope) {
            Err(Error::DirectoryDoesNotExist(path)) => assert_eq!(path, nope),
            other => panic!("expected missing-directory error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_key_size() {
        let root = Builder::new().prefix("test_max_key_size").tempdir().expect("tempdir");
        let env = Environment::new().open(root.path()).expect("opened");
        assert_eq!(env.max_key_size(), 511);
    }

    #[test]
    fn test_create_and_reopen_db() {
        let root = Builder::new().prefix("test_create_and_reopen").tempdir().expect("tempdir");
        let mut builder = Environment::new();
        builder.set_max_dbs(2);
        let env = builder.open(root.path()).expect("opened");
        env.create_db(Some("demo"), DatabaseFlags::empty()).expect("created");
        env.open_db(Some("demo")).expect("reopened");
        assert!(matches!(env.open_db(Some("missing")), Err(Error::NotFound)));
    }
}
