// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! A zero-copy buffer cursor layer over LMDB.
//!
//! The crate wraps the raw engine in a small set of safe handles. An
//! [`Environment`] maps one database file; [`Transaction`]s give snapshot
//! reads and serialized writes; a [`Database`] names one keyspace inside the
//! environment. On top of those sits the part that matters: the
//! [`BufferCursor`] protocol, which decodes fields straight out of
//! engine-owned pages and stages writes field by field in reusable buffers,
//! so a hot loop touches no intermediate allocations at all.
//!
//! Spans handed out by cursors and [`Transaction::get`] are leases, not
//! copies. Any operation that can move engine pages (navigation, a write, a
//! transaction boundary) voids the aliases minted before it, and a voided
//! span fails with [`Error::StaleSpan`] instead of reading freed memory.
//!
//! Multi-byte fields default to big-endian, so encoded keys sort numerically
//! under the engine's byte-wise comparator.
//!
//! ```
//! use tempfile::Builder;
//! use zkv::{
//!     DatabaseFlags,
//!     Environment,
//! };
//!
//! # fn main() -> Result<(), zkv::Error> {
//! let root = Builder::new().prefix("zkv-doc").tempdir().unwrap();
//! let env = Environment::new().set_max_dbs(2).open(root.path())?;
//! let db = env.create_db(Some("people"), DatabaseFlags::empty())?;
//!
//! let txn = env.begin_rw_txn()?;
//! {
//!     let mut cursor = db.buffer_cursor(&txn)?;
//!     cursor.key_write_u64(1)?;
//!     cursor.val_write_utf8("Ada")?;
//!     cursor.val_write_u32(36)?;
//!     assert!(cursor.put()?);
//!
//!     assert!(cursor.first()?);
//!     assert_eq!(cursor.key_u64(0)?, 1);
//!     assert_eq!(cursor.val_utf8(0)?, "Ada");
//!     assert_eq!(cursor.val_u32(4)?, 36);
//! }
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```

mod buffer_cursor;
mod cursor;
mod database;
mod env;
mod error;
mod flags;
mod iter;
mod span;
mod transaction;

pub use buffer_cursor::{
    BufferCursor,
    DEFAULT_STAGING_CAPACITY,
};
pub use cursor::{
    Cursor,
    NavOp,
    SeekOp,
};
pub use database::Database;
pub use env::{
    Environment,
    EnvironmentBuilder,
};
pub use error::{
    Error,
    Result,
};
pub use flags::{
    DatabaseFlags,
    EnvironmentFlags,
    WriteFlags,
};
pub use iter::{
    Entry,
    EntryIter,
};
pub use span::RawSpan;
pub use transaction::Transaction;

// Field accessors are byte-order generic; re-export the order types so
// callers need not depend on byteorder directly.
pub use byteorder::{
    BigEndian,
    ByteOrder,
    LittleEndian,
};
