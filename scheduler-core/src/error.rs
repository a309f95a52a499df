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

use std::fmt;
use std::fmt::{Debug, Display, Formatter};

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// The single error type shared by every component of the scheduler core.
///
/// Callers match on the variant to decide policy (retry, drop, propagate) rather
/// than inspecting a message string; see the error handling table the variants
/// are drawn from.
#[derive(Debug, Clone)]
pub enum SchedulerError {
    /// The persistence layer was unavailable or timed out. Retryable.
    TransientPersistence(String),
    /// A call into the resource broker driver (launch/decline) failed.
    DriverUnavailable(String),
    /// A callback referenced an agent id the node registry doesn't know about.
    UnknownAgent(String),
    /// A scan/strike configuration failed validation.
    InvalidConfiguration(String),
    /// A data type tag failed the tag pattern.
    InvalidDataTypeTag(String),
    /// A programming invariant was violated; the loop should stop and be restarted
    /// by a supervisor rather than continue with corrupted state.
    Fatal(String),
    /// Catch-all for errors that don't fit the policy table above.
    Internal(String),
}

impl SchedulerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::TransientPersistence(_))
    }
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SchedulerError::TransientPersistence(msg) => {
                write!(f, "transient persistence error: {}", msg)
            }
            SchedulerError::DriverUnavailable(msg) => write!(f, "driver unavailable: {}", msg),
            SchedulerError::UnknownAgent(msg) => write!(f, "unknown agent: {}", msg),
            SchedulerError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
            SchedulerError::InvalidDataTypeTag(msg) => write!(f, "invalid data type tag: {}", msg),
            SchedulerError::Fatal(msg) => write!(f, "fatal scheduler error: {}", msg),
            SchedulerError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for SchedulerError {}
