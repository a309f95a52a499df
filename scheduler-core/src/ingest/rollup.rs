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

//! Ingest status rollup: ingested files grouped by strike process, then by
//! hourly UTC bucket, zero-filled over the requested range.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::collections::HashMap;

use super::{Ingest, IngestStatus};

/// Counts for a single hourly bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestCounts {
    pub time: DateTime<Utc>,
    pub files: i64,
    pub size: i64,
}

impl IngestCounts {
    fn empty(time: DateTime<Utc>) -> Self {
        IngestCounts {
            time,
            files: 0,
            size: 0,
        }
    }
}

/// Rollup for a single strike process over the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeIngestStatus {
    pub strike_id: i64,
    pub most_recent: Option<DateTime<Utc>>,
    pub files: i64,
    pub size: i64,
    pub values: Vec<IngestCounts>,
}

fn floor_to_hour(dated: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(dated.year(), dated.month(), dated.day(), dated.hour(), 0, 0)
        .single()
        .expect("valid calendar date")
}

/// Returns ingest status rollups for every strike in `strike_ids`, grouped by
/// hourly bucket, restricted to `[started, ended]` and zero-filled across the
/// whole range. Only `Ingested` entries contribute to the counts.
pub fn group_by_time(
    ingests: &[Ingest],
    strike_ids: &[i64],
    use_ingest_time: bool,
    started: DateTime<Utc>,
    ended: DateTime<Utc>,
) -> Vec<StrikeIngestStatus> {
    let mut slot_map: HashMap<i64, HashMap<DateTime<Utc>, IngestCounts>> = HashMap::new();
    let mut most_recent: HashMap<i64, DateTime<Utc>> = HashMap::new();
    let mut totals: HashMap<i64, (i64, i64)> = HashMap::new();
    for &id in strike_ids {
        slot_map.insert(id, HashMap::new());
        totals.insert(id, (0, 0));
    }

    for ingest in ingests {
        if ingest.status != IngestStatus::Ingested {
            continue;
        }
        let strike_id = match ingest.source.strike_id() {
            Some(id) => id,
            None => continue,
        };
        if !slot_map.contains_key(&strike_id) {
            continue;
        }

        let dated = if use_ingest_time {
            ingest.ingest_ended
        } else {
            ingest.data_started
        };
        let dated = match dated {
            Some(d) => d,
            None => continue,
        };

        let time_slot = floor_to_hour(dated);
        let slots = slot_map.get_mut(&strike_id).unwrap();
        let entry = slots
            .entry(time_slot)
            .or_insert_with(|| IngestCounts::empty(time_slot));
        entry.files += 1;
        entry.size += ingest.file_size;

        let (files, size) = totals.get_mut(&strike_id).unwrap();
        *files += 1;
        *size += ingest.file_size;

        let recent = most_recent.entry(strike_id).or_insert(dated);
        if dated > *recent {
            *recent = dated;
        }
    }

    strike_ids
        .iter()
        .map(|&strike_id| {
            let slots = slot_map.remove(&strike_id).unwrap_or_default();
            let (files, size) = totals.remove(&strike_id).unwrap_or((0, 0));
            StrikeIngestStatus {
                strike_id,
                most_recent: most_recent.get(&strike_id).copied(),
                files,
                size,
                values: fill_status(&slots, started, ended),
            }
        })
        .collect()
}

/// Builds the full list of hourly counts across `[started, ended]`, inclusive,
/// expanded day by day, substituting a zero-valued bucket wherever `slots`
/// has no entry.
fn fill_status(
    slots: &HashMap<DateTime<Utc>, IngestCounts>,
    started: DateTime<Utc>,
    ended: DateTime<Utc>,
) -> Vec<IngestCounts> {
    let days = (ended.date_naive() - started.date_naive()).num_days();
    let mut values = Vec::with_capacity(((days + 1) * 24) as usize);
    for day in 0..=days {
        let dated = started + Duration::days(day);
        for hour in 0..24u32 {
            let time_slot = Utc
                .with_ymd_and_hms(dated.year(), dated.month(), dated.day(), hour, 0, 0)
                .single()
                .expect("valid calendar date");
            let counts = slots
                .get(&time_slot)
                .copied()
                .unwrap_or_else(|| IngestCounts::empty(time_slot));
            values.push(counts);
        }
    }
    values
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ingest::{IngestSource, WorkspacePath};

    fn ingested(strike_id: i64, dated: DateTime<Utc>, size: i64) -> Ingest {
        let mut ingest = Ingest::new(
            "f.txt",
            IngestSource::Strike(strike_id),
            WorkspacePath {
                workspace: "ws".to_string(),
                path: "f.txt".to_string(),
            },
        );
        ingest.status = IngestStatus::Ingested;
        ingest.data_started = Some(dated);
        ingest.ingest_ended = Some(dated);
        ingest.file_size = size;
        ingest
    }

    #[test]
    fn zero_fills_full_day_range() {
        let started = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ended = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        let result = group_by_time(&[], &[1], false, started, ended);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].values.len(), 24 * 2);
    }

    #[test]
    fn non_ingested_status_does_not_contribute() {
        let started = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ended = Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap();
        let mut ingest = ingested(1, started, 100);
        ingest.status = IngestStatus::Errored;
        let result = group_by_time(&[ingest], &[1], false, started, ended);
        assert_eq!(result[0].files, 0);
        assert_eq!(result[0].size, 0);
    }

    #[test]
    fn counts_are_bucketed_by_hour() {
        let started = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ended = Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap();
        let a = ingested(1, Utc.with_ymd_and_hms(2026, 1, 1, 5, 13, 0).unwrap(), 10);
        let b = ingested(1, Utc.with_ymd_and_hms(2026, 1, 1, 5, 45, 0).unwrap(), 20);
        let result = group_by_time(&[a, b], &[1], false, started, ended);
        let bucket = result[0]
            .values
            .iter()
            .find(|v| v.time.hour() == 5)
            .unwrap();
        assert_eq!(bucket.files, 2);
        assert_eq!(bucket.size, 30);
        assert_eq!(result[0].files, 2);
        assert_eq!(result[0].size, 30);
    }
}
