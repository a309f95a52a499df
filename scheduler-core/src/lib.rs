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

//! Shared data model, error type, configuration and external-collaborator
//! traits for the cluster job scheduler. The scheduling loop and its
//! managers live in the `scheduler` crate; this crate has no knowledge of
//! them.

pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod resources;
pub mod traits;
pub mod volume;

pub use error::{Result, SchedulerError};
