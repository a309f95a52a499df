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

//! Scheduling tunables. The `scheduler` binary loads these from a
//! `configure_me`-generated config (file + env + CLI); everything else in
//! this crate just takes a `SchedulingTunables` value, so tests can build one
//! directly without going through config file parsing.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingTunables {
    /// How long the loop sleeps between rounds when a round launched nothing.
    pub delay: Duration,
    /// Hard per-round ceiling on queued-execution admissions.
    pub max_new_job_exes: usize,
    /// A whole round exceeding this duration logs a warning.
    pub schedule_loop_warn_threshold: Duration,
    /// A `schedule_job_executions` call exceeding this duration logs a warning.
    pub schedule_query_warn_threshold: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff delay for the given zero-indexed attempt number,
    /// clamped to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1 << attempt.min(16));
        scaled.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_tries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl Default for SchedulingTunables {
    fn default() -> Self {
        SchedulingTunables {
            delay: Duration::from_secs(5),
            max_new_job_exes: 500,
            schedule_loop_warn_threshold: Duration::from_secs(1),
            schedule_query_warn_threshold: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_grows_then_clamps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(5000));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_millis(5000));
    }
}
