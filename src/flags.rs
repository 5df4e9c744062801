// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::os::raw::c_uint;

use bitflags::bitflags;
use lmdb_sys as ffi;

bitflags! {
    /// Environment open flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct EnvironmentFlags: c_uint {
        /// Use a fixed address for the memory map.
        const FIXED_MAP = ffi::MDB_FIXEDMAP;
        /// Treat the environment path as a file name, not a directory.
        const NO_SUB_DIR = ffi::MDB_NOSUBDIR;
        /// Use a writeable memory map unless the environment is read-only.
        const WRITE_MAP = ffi::MDB_WRITEMAP;
        /// Open the environment read-only.
        const READ_ONLY = ffi::MDB_RDONLY;
        /// Flush system buffers to disk only once per transaction.
        const NO_META_SYNC = ffi::MDB_NOMETASYNC;
        /// Don't flush system buffers to disk when committing.
        const NO_SYNC = ffi::MDB_NOSYNC;
        /// Flush asynchronously when using a writeable memory map.
        const MAP_ASYNC = ffi::MDB_MAPASYNC;
        /// Tie reader locktable slots to transaction objects instead of threads.
        const NO_TLS = ffi::MDB_NOTLS;
        /// Don't do any locking; caller manages concurrency.
        const NO_LOCK = ffi::MDB_NOLOCK;
        /// Don't advise the OS to read ahead in the memory map.
        const NO_READAHEAD = ffi::MDB_NORDAHEAD;
        /// Don't zero-initialize malloc'd memory before writing to the map.
        const NO_MEM_INIT = ffi::MDB_NOMEMINIT;
    }
}

bitflags! {
    /// Database open flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct DatabaseFlags: c_uint {
        /// Compare keys in reverse byte order.
        const REVERSE_KEY = ffi::MDB_REVERSEKEY;
        /// Allow multiple sorted values per key (duplicates).
        const DUP_SORT = ffi::MDB_DUPSORT;
        /// Keys are binary integers in native byte order.
        const INTEGER_KEY = ffi::MDB_INTEGERKEY;
        /// With `DUP_SORT`, duplicate values are all the same size.
        const DUP_FIXED = ffi::MDB_DUPFIXED;
        /// With `DUP_SORT`, duplicate values are binary integers.
        const INTEGER_DUP = ffi::MDB_INTEGERDUP;
        /// With `DUP_SORT`, compare duplicate values in reverse byte order.
        const REVERSE_DUP = ffi::MDB_REVERSEDUP;
    }
}

bitflags! {
    /// Write operation flags for put and delete calls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct WriteFlags: c_uint {
        /// Don't replace the value if the key already exists; the engine
        /// reports KEY_EXISTS instead.
        const NO_OVERWRITE = ffi::MDB_NOOVERWRITE;
        /// With `DUP_SORT`, don't add the pair if the exact key/value pair is
        /// already present.
        const NO_DUP_DATA = ffi::MDB_NODUPDATA;
        /// Replace the value at the cursor's current position.
        const CURRENT = ffi::MDB_CURRENT;
        /// Append the pair to the end of the database without comparing keys.
        /// The caller must supply keys in ascending order.
        const APPEND = ffi::MDB_APPEND;
        /// As `APPEND`, for sorted duplicate values of a single key.
        const APPEND_DUP = ffi::MDB_APPENDDUP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_match_engine_constants() {
        assert_eq!(DatabaseFlags::DUP_SORT.bits(), ffi::MDB_DUPSORT);
        assert_eq!(WriteFlags::NO_OVERWRITE.bits(), ffi::MDB_NOOVERWRITE);
        assert_eq!(
            (EnvironmentFlags::NO_SYNC | EnvironmentFlags::READ_ONLY).bits(),
            ffi::MDB_NOSYNC | ffi::MDB_RDONLY
        );
    }
}
