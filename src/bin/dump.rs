// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

extern crate zkv;

use std::{
    env::args,
    path::Path,
};

use zkv::Environment;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn main() {
    let mut args = args();
    let mut database = None;
    let mut path = None;

    // The first arg is the name of the program, which we can ignore.
    args.next();

    while let Some(arg) = args.next() {
        if &arg[0..1] == "-" {
            match &arg[1..] {
                "s" => {
                    database = match args.next() {
                        None => panic!("-s must be followed by database arg"),
                        Some(str) => Some(str),
                    };
                },
                str => panic!("arg -{} not recognized", str),
            }
        } else {
            if path.is_some() {
                panic!("must provide only one path to the LMDB environment");
            }
            path = Some(arg);
        }
    }

    if path.is_none() {
        panic!("must provide a path to the LMDB environment");
    }
    let path = path.unwrap();

    let env = Environment::new().set_max_dbs(2).open(Path::new(&path)).expect("opened");
    let db = env.open_db(database.as_ref().map(|name| name.as_str())).expect("db");
    let txn = env.begin_ro_txn().expect("reader");

    for entry in db.iter(&txn).expect("iter") {
        let entry = entry.expect("entry");
        println!("{} => {}", hex(&entry.key), hex(&entry.value));
    }
}
