// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Whole-database iteration.
//!
//! Every cursor navigation invalidates the spans minted before it, so an
//! iterator cannot hand out aliases into engine memory. Entries are copied
//! out as they are yielded instead. For zero-copy traversal, drive a
//! [`crate::BufferCursor`] by hand.

use crate::{
    cursor::{
        Cursor,
        NavOp,
        SeekOp,
    },
    error::Result,
    span::RawSpan,
};

/// One key/value pair copied out of the database.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

fn read_entry(key: &RawSpan, val: &RawSpan) -> Result<Entry> {
    Ok(Entry {
        key: key.to_vec()?,
        value: val.to_vec()?,
    })
}

enum Start {
    First,
    Last,
    Range(Vec<u8>),
}

/// An iterator over a database's entries in key order. On a database with
/// duplicate keys enabled, every duplicate is visited.
///
/// The iterator is fused: after the end of the range, or after an error, it
/// yields `None` forever.
pub struct EntryIter<'txn> {
    cursor: Cursor<'txn>,
    start: Option<Start>,
    step: NavOp,
    done: bool,
}

impl<'txn> EntryIter<'txn> {
    pub(crate) fn forward(cursor: Cursor<'txn>) -> EntryIter<'txn> {
        EntryIter {
            cursor,
            start: Some(Start::First),
            step: NavOp::Next,
            done: false,
        }
    }

    pub(crate) fn backward(cursor: Cursor<'txn>) -> EntryIter<'txn> {
        EntryIter {
            cursor,
            start: Some(Start::Last),
            step: NavOp::Prev,
            done: false,
        }
    }

    pub(crate) fn from(cursor: Cursor<'txn>, key: &[u8]) -> EntryIter<'txn> {
        EntryIter {
            cursor,
            start: Some(Start::Range(key.to_vec())),
            step: NavOp::Next,
            done: false,
        }
    }
}

impl<'txn> Iterator for EntryIter<'txn> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Result<Entry>> {
        if self.done {
            return None;
        }
        let bound = match self.start.take() {
            Some(Start::First) => self.cursor.navigate(NavOp::First),
            Some(Start::Last) => self.cursor.navigate(NavOp::Last),
            Some(Start::Range(key)) => self.cursor.seek(SeekOp::Range, &key),
            None => self.cursor.navigate(self.step),
        };
        match bound {
            Ok(Some((key, val))) => {
                let entry = read_entry(&key, &val);
                if entry.is_err() {
                    self.done = true;
                }
                Some(entry)
            },
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}
