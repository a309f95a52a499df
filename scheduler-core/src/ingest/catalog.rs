// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! In-process stand-ins for the Strike (continuous) and Scan (one-shot)
//! ingest process catalogs. Durable storage of these definitions is someone
//! else's job; these types exist so the rollup and dedup logic have something
//! concrete to group and filter against.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Strike {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub description: String,
    pub configuration: String,
}

/// A one-shot ingest process. `dry_run` records operator intent; scan
/// execution itself happens elsewhere, so nothing here branches on it.
#[derive(Debug, Clone)]
pub struct Scan {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub description: String,
    pub configuration: String,
    pub dry_run: bool,
}

/// An in-memory registry standing in for the `StrikeManager`/`ScanManager`
/// CRUD tables. Not thread-safe on its own; callers that need to share one
/// across threads wrap it behind a mutex, same as every other manager here.
#[derive(Debug, Default)]
pub struct ProcessCatalog {
    strikes: HashMap<i64, Strike>,
    scans: HashMap<i64, Scan>,
    next_id: i64,
}

impl ProcessCatalog {
    pub fn new() -> Self {
        ProcessCatalog::default()
    }

    pub fn create_strike(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        configuration: impl Into<String>,
    ) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.strikes.insert(
            id,
            Strike {
                id,
                name: name.into(),
                title: title.into(),
                description: description.into(),
                configuration: configuration.into(),
            },
        );
        id
    }

    pub fn create_scan(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        configuration: impl Into<String>,
        dry_run: bool,
    ) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.scans.insert(
            id,
            Scan {
                id,
                name: name.into(),
                title: title.into(),
                description: description.into(),
                configuration: configuration.into(),
                dry_run,
            },
        );
        id
    }

    pub fn get_strikes(&self) -> Vec<&Strike> {
        self.strikes.values().collect()
    }

    pub fn get_scans(&self) -> Vec<&Scan> {
        self.scans.values().collect()
    }

    pub fn strike_ids(&self) -> Vec<i64> {
        self.strikes.keys().copied().collect()
    }
}
