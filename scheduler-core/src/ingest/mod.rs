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

//! Ingest record and data-type tag handling: just enough of the shape of an
//! ingest task for the rest of the crate to group, dedup and roll up status
//! against. The durable catalog behind it is out of scope.

pub mod catalog;
pub mod rollup;

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Transferring,
    Transferred,
    Deferred,
    Queued,
    Ingesting,
    Ingested,
    Errored,
    Duplicate,
}

/// An ingest is created by exactly one of a Strike (continuous) or Scan
/// (one-shot) process, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Strike(i64),
    Scan(i64),
}

impl IngestSource {
    pub fn strike_id(&self) -> Option<i64> {
        match self {
            IngestSource::Strike(id) => Some(*id),
            IngestSource::Scan(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspacePath {
    pub workspace: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Ingest {
    pub file_name: String,
    pub source: IngestSource,
    pub status: IngestStatus,

    pub transfer_started: Option<DateTime<Utc>>,
    pub transfer_ended: Option<DateTime<Utc>>,
    pub ingest_started: Option<DateTime<Utc>>,
    pub ingest_ended: Option<DateTime<Utc>>,
    pub data_started: Option<DateTime<Utc>>,
    pub data_ended: Option<DateTime<Utc>>,

    pub file_size: i64,
    pub media_type: String,
    /// Comma-joined tag string. Use `data_type_tags`/`add_data_type_tag`
    /// rather than touching this field.
    data_type: String,

    pub source_path: WorkspacePath,
    pub dest_path: Option<WorkspacePath>,
}

/// A tag is valid iff it is non-empty and every character is alphanumeric,
/// `_` or a space.
fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

impl Ingest {
    pub fn new(
        file_name: impl Into<String>,
        source: IngestSource,
        source_path: WorkspacePath,
    ) -> Self {
        Ingest {
            file_name: file_name.into(),
            source,
            status: IngestStatus::Transferring,
            transfer_started: None,
            transfer_ended: None,
            ingest_started: None,
            ingest_ended: None,
            data_started: None,
            data_ended: None,
            file_size: 0,
            media_type: String::new(),
            data_type: String::new(),
            source_path,
            dest_path: None,
        }
    }

    /// Adds a new data type tag. A valid tag contains only alphanumeric
    /// characters, underscores and spaces.
    pub fn add_data_type_tag(&mut self, tag: &str) -> Result<()> {
        if !is_valid_tag(tag) {
            log::warn!("rejected data type tag {:?} for {}", tag, self.file_name);
            return Err(SchedulerError::InvalidDataTypeTag(tag.to_string()));
        }
        let mut tags = self.data_type_tags();
        tags.insert(tag.to_string());
        self.set_data_type_tags(tags);
        Ok(())
    }

    pub fn data_type_tags(&self) -> HashSet<String> {
        if self.data_type.is_empty() {
            return HashSet::new();
        }
        self.data_type.split(',').map(|s| s.to_string()).collect()
    }

    fn set_data_type_tags(&mut self, tags: HashSet<String>) {
        let mut tags: Vec<String> = tags.into_iter().collect();
        tags.sort();
        self.data_type = tags.join(",");
    }
}

/// Deduplicates an ingest batch by `file_name` within a scan: exact-name
/// duplicates inside `batch` are collapsed to the first occurrence, and any
/// file name already present in `previously_seen` is dropped entirely.
/// Idempotent: `dedup(dedup(batch, seen), seen) == dedup(batch, seen)`.
pub fn dedup_ingest_batch(batch: Vec<Ingest>, previously_seen: &HashSet<String>) -> Vec<Ingest> {
    let mut seen_in_batch: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(batch.len());
    let mut dropped = 0usize;
    for ingest in batch {
        if previously_seen.contains(&ingest.file_name) || !seen_in_batch.insert(ingest.file_name.clone()) {
            dropped += 1;
            continue;
        }
        result.push(ingest);
    }
    if dropped > 0 {
        log::debug!("dropped {} duplicate ingest(s) from batch", dropped);
    }
    result
}
