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

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A resource bag carried by offers, job executions and tasks alike.
///
/// Values are allowed to be fractional for cpus (Mesos-style), integral for
/// memory/disk in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Resources {
    pub cpus: f64,
    pub mem_mb: f64,
    pub disk_mb: f64,
}

impl Resources {
    pub fn new(cpus: f64, mem_mb: f64, disk_mb: f64) -> Self {
        Resources {
            cpus,
            mem_mb,
            disk_mb,
        }
    }

    pub fn zero() -> Self {
        Resources::default()
    }

    /// True iff every component of `self` is >= the corresponding component of `other`.
    pub fn fits(&self, other: &Resources) -> bool {
        self.cpus >= other.cpus && self.mem_mb >= other.mem_mb && self.disk_mb >= other.disk_mb
    }

    /// Slack remaining after subtracting `other`, used to rank candidate nodes.
    /// Callers must have already checked `self.fits(other)`.
    pub fn slack_after(&self, other: &Resources) -> Resources {
        *self - *other
    }

    pub fn is_non_negative(&self) -> bool {
        self.cpus >= 0.0 && self.mem_mb >= 0.0 && self.disk_mb >= 0.0
    }
}

impl Add for Resources {
    type Output = Resources;

    fn add(self, rhs: Resources) -> Resources {
        Resources {
            cpus: self.cpus + rhs.cpus,
            mem_mb: self.mem_mb + rhs.mem_mb,
            disk_mb: self.disk_mb + rhs.disk_mb,
        }
    }
}

impl Sub for Resources {
    type Output = Resources;

    fn sub(self, rhs: Resources) -> Resources {
        Resources {
            cpus: self.cpus - rhs.cpus,
            mem_mb: self.mem_mb - rhs.mem_mb,
            disk_mb: self.disk_mb - rhs.disk_mb,
        }
    }
}
